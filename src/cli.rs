// ============================================================================
// Conservation CLI — headless strokes and export via command-line arguments
// ============================================================================
//
// Usage examples:
//   conservation --stroke 32,20,3,#ff0000 --export out.png
//   conservation -s 10,10,5,#000000 -s 50,50,5,#ffffff
//   conservation --reset --export fresh.png --scale 4
//   conservation --state-dir /tmp/demo -s 0,0,7,#00ff00 --verbose
//
// No window is opened in CLI mode. Strokes are applied in argument order
// against the saved session (or a fresh canonical grid), the session is
// saved back, and an optional upscaled PNG is written.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use image::Rgb;

use crate::engine::{Engine, EngineConfig, Stroke, StrokeError};
use crate::io;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Conservation headless painter.
///
/// Apply brush strokes to the conserved canvas and export it — no GUI required.
#[derive(Parser, Debug)]
#[command(
    name = "conservation",
    about = "Conservation headless painter and exporter",
    long_about = "Apply brush strokes against the saved canvas state and export the\n\
                  result as an upscaled PNG without opening a window. The sum of each\n\
                  color channel over the whole grid is preserved by every stroke.\n\n\
                  Example:\n  \
                  conservation --stroke 32,20,3,#ff0000 --export out.png\n  \
                  conservation --reset -s 0,0,7,#00ff00 -s 63,63,7,#0000ff"
)]
pub struct CliArgs {
    /// Brush stroke to apply, as "x,y,radius,#rrggbb". Repeatable;
    /// strokes are applied in the order given.
    #[arg(short, long, value_name = "X,Y,R,#RRGGBB")]
    pub stroke: Vec<String>,

    /// Write the (post-stroke) grid to this PNG file.
    #[arg(short, long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Nearest-neighbor upscale factor for --export.
    #[arg(long, default_value_t = 8, value_name = "N")]
    pub scale: u32,

    /// Directory holding canvas.png / order.bin.
    /// Defaults to the OS data directory.
    #[arg(long, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Discard any saved session and start from the canonical
    /// half-black / half-white pattern.
    #[arg(long)]
    pub reset: bool,

    /// Print per-stroke deltas and timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real
    /// process arguments. Used by `main()` to route before creating a
    /// window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| {
            matches!(
                a.as_str(),
                "--stroke" | "-s" | "--export" | "-e" | "--reset"
            )
        })
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = success with full conservation, `1` = bad arguments, I/O
/// failure, or any stroke that exhausted its compensation headroom.
pub fn run(args: CliArgs) -> ExitCode {
    let dir = args
        .state_dir
        .clone()
        .unwrap_or_else(io::default_state_dir);
    let config = EngineConfig::default();

    let mut engine = if !args.reset && io::has_state(&dir) {
        match io::load_state(&dir, &config) {
            Ok(engine) => engine,
            Err(e) => {
                eprintln!("warning: saved state rejected ({}), starting fresh.", e);
                Engine::new(&config)
            }
        }
    } else {
        Engine::new(&config)
    };

    let mut lapsed = false;
    for spec in &args.stroke {
        let stroke = match parse_stroke(spec) {
            Ok(stroke) => stroke,
            Err(e) => {
                eprintln!("error: bad stroke '{}': {}", spec, e);
                return ExitCode::FAILURE;
            }
        };
        let start = Instant::now();
        match engine.apply(&stroke) {
            Ok(report) => {
                if args.verbose {
                    println!(
                        "stroke {:>3},{:>3} r{} -> {} cells, delta ({}, {}, {}) repaid in {:?}",
                        stroke.x,
                        stroke.y,
                        stroke.radius,
                        report.cells_touched,
                        report.delta[0],
                        report.delta[1],
                        report.delta[2],
                        start.elapsed()
                    );
                }
            }
            Err(StrokeError::HeadroomExhausted { residual }) => {
                eprintln!(
                    "warning: stroke '{}' could not be conserved, sums drifted by ({}, {}, {})",
                    spec, residual[0], residual[1], residual[2]
                );
                lapsed = true;
            }
        }
    }

    if let Err(e) = io::save_state(&engine, &dir) {
        eprintln!("error: failed to save state to {}: {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    if let Some(path) = &args.export {
        let start = Instant::now();
        if let Err(e) = io::export_png(engine.grid(), path, args.scale) {
            eprintln!("error: failed to export {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
        if args.verbose {
            println!(
                "exported {} at {}x in {:?}",
                path.display(),
                args.scale.max(1),
                start.elapsed()
            );
        }
    }

    if lapsed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

// ============================================================================
// Argument parsing helpers
// ============================================================================

/// Parse "x,y,radius,#rrggbb" into a [`Stroke`].
pub fn parse_stroke(spec: &str) -> Result<Stroke, String> {
    let parts: Vec<&str> = spec.split(',').collect();
    if parts.len() != 4 {
        return Err("expected four comma-separated fields: x,y,radius,#rrggbb".to_string());
    }
    let x: i32 = parts[0]
        .trim()
        .parse()
        .map_err(|_| format!("invalid x coordinate '{}'", parts[0]))?;
    let y: i32 = parts[1]
        .trim()
        .parse()
        .map_err(|_| format!("invalid y coordinate '{}'", parts[1]))?;
    let radius: u32 = parts[2]
        .trim()
        .parse()
        .map_err(|_| format!("invalid radius '{}'", parts[2]))?;
    let color = parse_hex_color(parts[3].trim())?;
    Ok(Stroke { x, y, radius, color })
}

/// Parse "#rrggbb" (leading '#' optional) into an RGB color.
pub fn parse_hex_color(s: &str) -> Result<Rgb<u8>, String> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("invalid color '{}', expected #rrggbb", s));
    }
    let r = u8::from_str_radix(&hex[0..2], 16).unwrap();
    let g = u8::from_str_radix(&hex[2..4], 16).unwrap();
    let b = u8::from_str_radix(&hex[4..6], 16).unwrap();
    Ok(Rgb([r, g, b]))
}
