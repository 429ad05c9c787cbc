//! State persistence and PNG export.
//!
//! The session lives in the OS data directory as three files:
//!   `canvas.png` — the grid as a lossless RGB PNG (bit-exact channels);
//!   `order.bin`  — the recency order, bincode with a magic header;
//!   `prefs.bin`  — picked color and brush size, bincode with a magic header.
//!
//! Loading validates everything (dimensions, magic, full permutation);
//! any violation is a recoverable [`StateError`] — callers log it and
//! reinitialize the canonical pattern instead of crashing.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, ImageEncoder, RgbImage};
use serde::{Deserialize, Serialize};

use crate::engine::{Engine, EngineConfig, PixelGrid, RecencyOrder};

const STATE_IMAGE: &str = "canvas.png";
const STATE_ORDER: &str = "order.bin";
const STATE_PREFS: &str = "prefs.bin";

/// Magic header for the recency-order file.
const ORDER_MAGIC: &str = "CVO1";
/// Magic header for the preferences file.
const PREFS_MAGIC: &str = "CVP1";

/// Serializable recency-order file.
#[derive(Serialize, Deserialize)]
struct OrderFileV1 {
    magic: String,
    /// Front-to-back cell indices; must be a permutation of `0..W·H`.
    order: Vec<u32>,
}

/// Serializable preferences file.
#[derive(Serialize, Deserialize)]
struct PrefsFileV1 {
    magic: String,
    color: [u8; 3],
    brush_radius: u32,
}

/// UI preferences that survive restarts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prefs {
    pub color: [u8; 3],
    pub brush_radius: u32,
}

impl Default for Prefs {
    fn default() -> Self {
        Self { color: [0, 0, 0], brush_radius: 3 }
    }
}

/// Error type for state file operations.
#[derive(Debug)]
pub enum StateError {
    Io(std::io::Error),
    Codec(String),
    Mismatch(String),
}

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateError::Io(e) => write!(f, "I/O error: {}", e),
            StateError::Codec(e) => write!(f, "Encode/decode error: {}", e),
            StateError::Mismatch(e) => write!(f, "State mismatch: {}", e),
        }
    }
}

impl std::error::Error for StateError {}

impl From<std::io::Error> for StateError {
    fn from(e: std::io::Error) -> Self {
        StateError::Io(e)
    }
}

impl From<image::ImageError> for StateError {
    fn from(e: image::ImageError) -> Self {
        StateError::Codec(e.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for StateError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        StateError::Codec(e.to_string())
    }
}

/// Platform data directory (without the app sub-folder).
pub fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
        }
    }
    // Linux / fallback
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    // Last resort: current working directory
    PathBuf::from(".")
}

/// Where the session state lives unless overridden.
pub fn default_state_dir() -> PathBuf {
    data_dir().join("Conservation")
}

/// True when both state files are present (decodability is checked by
/// [`load_state`]).
pub fn has_state(dir: &Path) -> bool {
    dir.join(STATE_IMAGE).exists() && dir.join(STATE_ORDER).exists()
}

/// Owned copy of everything the state files need. Built on the main
/// thread (cheap — one small image plus an index list), then handed to a
/// background thread so serialization never delays a stroke.
pub struct StateSnapshot {
    image: RgbImage,
    order: Vec<u32>,
}

pub fn snapshot_state(engine: &Engine) -> StateSnapshot {
    StateSnapshot {
        image: engine.grid().to_image(),
        order: engine.order().snapshot(),
    }
}

/// Serialize + write a snapshot. Safe to call on a background thread.
pub fn write_state(snapshot: &StateSnapshot, dir: &Path) -> Result<(), StateError> {
    fs::create_dir_all(dir)?;

    let file = File::create(dir.join(STATE_IMAGE))?;
    let writer = BufWriter::new(file);
    PngEncoder::new(writer).write_image(
        snapshot.image.as_raw(),
        snapshot.image.width(),
        snapshot.image.height(),
        ColorType::Rgb8,
    )?;

    let file = File::create(dir.join(STATE_ORDER))?;
    let writer = BufWriter::new(file);
    let order_file = OrderFileV1 {
        magic: ORDER_MAGIC.to_string(),
        order: snapshot.order.clone(),
    };
    bincode::serialize_into(writer, &order_file)?;
    Ok(())
}

/// Snapshot + write in one synchronous call (exit path, CLI).
pub fn save_state(engine: &Engine, dir: &Path) -> Result<(), StateError> {
    write_state(&snapshot_state(engine), dir)
}

/// Restore a session. Both files must decode and agree with the
/// configured dimensions; the order must be a full permutation of the
/// grid's cells. Anything else is an error and the caller starts fresh.
pub fn load_state(dir: &Path, config: &EngineConfig) -> Result<Engine, StateError> {
    let img = image::open(dir.join(STATE_IMAGE))?.to_rgb8();
    if img.width() != config.width || img.height() != config.height {
        return Err(StateError::Mismatch(format!(
            "saved canvas is {}x{}, engine expects {}x{}",
            img.width(),
            img.height(),
            config.width,
            config.height
        )));
    }
    let cells = img.pixels().copied().collect();
    let grid = PixelGrid::from_cells(config.width, config.height, cells)
        .map_err(StateError::Mismatch)?;

    let raw = fs::read(dir.join(STATE_ORDER))?;
    let order_file: OrderFileV1 = bincode::deserialize(&raw)?;
    if order_file.magic != ORDER_MAGIC {
        return Err(StateError::Mismatch(format!(
            "unknown order file magic '{}'",
            order_file.magic
        )));
    }
    let order = RecencyOrder::from_snapshot(&order_file.order).map_err(StateError::Mismatch)?;

    Engine::from_parts(grid, order, config.max_radius).map_err(StateError::Mismatch)
}

pub fn save_prefs(prefs: &Prefs, dir: &Path) -> Result<(), StateError> {
    fs::create_dir_all(dir)?;
    let file = File::create(dir.join(STATE_PREFS))?;
    let prefs_file = PrefsFileV1 {
        magic: PREFS_MAGIC.to_string(),
        color: prefs.color,
        brush_radius: prefs.brush_radius,
    };
    bincode::serialize_into(BufWriter::new(file), &prefs_file)?;
    Ok(())
}

pub fn load_prefs(dir: &Path) -> Result<Prefs, StateError> {
    let raw = fs::read(dir.join(STATE_PREFS))?;
    let prefs_file: PrefsFileV1 = bincode::deserialize(&raw)?;
    if prefs_file.magic != PREFS_MAGIC {
        return Err(StateError::Mismatch(format!(
            "unknown prefs file magic '{}'",
            prefs_file.magic
        )));
    }
    Ok(Prefs {
        color: prefs_file.color,
        brush_radius: prefs_file.brush_radius,
    })
}

/// Write the grid as a PNG upscaled by `scale` with nearest-neighbor
/// sampling, so every cell becomes a crisp `scale`×`scale` block.
pub fn export_png(grid: &PixelGrid, path: &Path, scale: u32) -> Result<(), StateError> {
    let scale = scale.max(1);
    let img = grid.to_image();
    let scaled = imageops::resize(
        &img,
        grid.width() * scale,
        grid.height() * scale,
        FilterType::Nearest,
    );
    let file = File::create(path)?;
    PngEncoder::new(BufWriter::new(file)).write_image(
        scaled.as_raw(),
        scaled.width(),
        scaled.height(),
        ColorType::Rgb8,
    )?;
    Ok(())
}

/// Default export file name, matching the app's download naming.
pub fn export_file_name() -> String {
    let unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("conservation-{}.png", unix)
}
