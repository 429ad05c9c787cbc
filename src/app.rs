//! Desktop UI: a zoomable paint surface over the conservation engine,
//! plus palette, RGB sliders, brush preview, size slider, zoom controls
//! and a minimap. Strokes are serialized one per pointer event; the
//! engine itself never sees the UI.

use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use eframe::egui;
use egui::{
    Color32, ColorImage, Pos2, Rect, RichText, Sense, TextureHandle, TextureOptions, Vec2,
};
use image::Rgb;

use crate::camera::Camera;
use crate::engine::{Engine, EngineConfig, PixelGrid, Stroke};
use crate::io::{self, Prefs};
use crate::{log_err, log_info, log_warn};

/// One grid cell is this many screen pixels at 1× zoom; exports use the
/// same factor.
pub const DISPLAY_SCALE: u32 = 8;

/// Idle time after the last edit before state is written out.
const SAVE_DEBOUNCE: Duration = Duration::from_millis(500);

/// Side length of the brush preview image (fits the maximum radius).
const PREVIEW_CELLS: u32 = 17;

const BG: Color32 = Color32::from_rgb(23, 23, 23);
const PANEL_BORDER: Color32 = Color32::from_rgb(82, 82, 82);

const PALETTE: [[u8; 3]; 8] = [
    [0, 0, 0],
    [255, 255, 255],
    [255, 0, 0],
    [0, 255, 0],
    [0, 0, 255],
    [255, 255, 0],
    [255, 0, 255],
    [0, 255, 255],
];

/// Drag direction locked in while Shift is held.
#[derive(Clone, Copy, PartialEq)]
enum AxisLock {
    Horizontal,
    Vertical,
}

pub struct ConservationApp {
    engine: Engine,
    state_dir: PathBuf,
    camera: Camera,
    color: Rgb<u8>,
    brush_radius: u32,
    show_info: bool,

    canvas_texture: Option<TextureHandle>,
    canvas_generation: u64,
    preview_texture: Option<TextureHandle>,
    preview_key: (Rgb<u8>, u32),

    state_dirty_since: Option<Instant>,
    prefs_dirty_since: Option<Instant>,
    last_cell: Option<(i32, i32)>,
    axis_lock: Option<AxisLock>,
    rng: u64,
}

impl ConservationApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        let state_dir = io::default_state_dir();
        let config = EngineConfig::default();
        let engine = if io::has_state(&state_dir) {
            match io::load_state(&state_dir, &config) {
                Ok(engine) => {
                    log_info!("restored session from {}", state_dir.display());
                    engine
                }
                Err(e) => {
                    log_warn!("saved state rejected ({}), reinitializing", e);
                    Engine::new(&config)
                }
            }
        } else {
            Engine::new(&config)
        };
        let prefs = io::load_prefs(&state_dir).unwrap_or_default();

        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos() as u64 ^ d.as_secs())
            .unwrap_or(0x9e37_79b9);

        Self {
            engine,
            state_dir,
            camera: Camera::default(),
            color: Rgb(prefs.color),
            brush_radius: prefs.brush_radius.min(config.max_radius),
            show_info: false,
            canvas_texture: None,
            canvas_generation: 0,
            preview_texture: None,
            preview_key: (Rgb(prefs.color), u32::MAX),
            state_dirty_since: None,
            prefs_dirty_since: None,
            last_cell: None,
            axis_lock: None,
            rng: seed | 1,
        }
    }

    // ---- painting -----------------------------------------------------------

    fn apply_stroke(&mut self, (x, y): (i32, i32)) {
        let stroke = Stroke {
            x,
            y,
            radius: self.brush_radius,
            color: self.color,
        };
        if let Err(e) = self.engine.apply(&stroke) {
            // Stroke committed anyway; keep painting but leave a trace.
            log_warn!("stroke at {},{}: {}", x, y, e);
        }
        self.state_dirty_since = Some(Instant::now());
    }

    fn paint_canvas(&mut self, ui: &mut egui::Ui) {
        let w = self.engine.grid().width() as f32;
        let h = self.engine.grid().height() as f32;
        let size = Vec2::new(w, h) * DISPLAY_SCALE as f32;
        let (rect, response) = ui.allocate_exact_size(size, Sense::drag());

        // -- pointer → grid cell → stroke --
        if response.drag_released() {
            self.last_cell = None;
            self.axis_lock = None;
        }
        if response.drag_started() || response.dragged() {
            if let Some(pos) = response.interact_pointer_pos() {
                let rel = pos - rect.min;
                let scale = self.camera.z * DISPLAY_SCALE as f32;
                let gx = (rel.x / scale).floor() - self.camera.x;
                let gy = (rel.y / scale).floor() - self.camera.y;
                let mut cell = (gx as i32, gy as i32);

                if ui.input(|i| i.modifiers.shift) {
                    if let Some(last) = self.last_cell {
                        if self.axis_lock.is_none() {
                            let dx = (cell.0 - last.0).abs();
                            let dy = (cell.1 - last.1).abs();
                            if dx > dy {
                                self.axis_lock = Some(AxisLock::Horizontal);
                            } else if dy > dx {
                                self.axis_lock = Some(AxisLock::Vertical);
                            }
                        }
                        match self.axis_lock {
                            Some(AxisLock::Horizontal) => cell.1 = last.1,
                            Some(AxisLock::Vertical) => cell.0 = last.0,
                            None => {}
                        }
                    }
                } else {
                    self.axis_lock = None;
                }

                if response.drag_started() || self.last_cell != Some(cell) {
                    self.apply_stroke(cell);
                }
                self.last_cell = Some(cell);
            }
        }

        // -- draw the visible viewport --
        self.refresh_canvas_texture(ui.ctx());
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, BG);
        if let Some(tex) = &self.canvas_texture {
            let cam = self.camera;
            let u0 = -cam.x / w;
            let v0 = -cam.y / h;
            let uv = Rect::from_min_max(
                Pos2::new(u0, v0),
                Pos2::new(u0 + 1.0 / cam.z, v0 + 1.0 / cam.z),
            );
            painter.image(tex.id(), rect, uv, Color32::WHITE);
        }
    }

    fn refresh_canvas_texture(&mut self, ctx: &egui::Context) {
        if self.canvas_texture.is_some() && self.canvas_generation == self.engine.generation() {
            return;
        }
        let img = color_image(self.engine.grid());
        match &mut self.canvas_texture {
            Some(tex) => tex.set(img, TextureOptions::NEAREST),
            None => {
                self.canvas_texture = Some(ctx.load_texture("canvas", img, TextureOptions::NEAREST))
            }
        }
        self.canvas_generation = self.engine.generation();
    }

    // ---- chrome -------------------------------------------------------------

    fn title_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(RichText::new("CONSERVATION").strong());
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("⬇").on_hover_text("Download as PNG").clicked() {
                    self.export_dialog();
                }
                if ui.selectable_label(self.show_info, "?").clicked() {
                    self.show_info = !self.show_info;
                }
            });
        });
        ui.separator();
    }

    fn export_dialog(&self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("PNG image", &["png"])
            .set_file_name(&io::export_file_name())
            .save_file()
        else {
            return;
        };
        match io::export_png(self.engine.grid(), &path, DISPLAY_SCALE) {
            Ok(()) => log_info!("exported {}", path.display()),
            Err(e) => log_err!("export to {} failed: {}", path.display(), e),
        }
    }

    fn info_panel(&self, ui: &mut egui::Ui) {
        let sums = self.engine.grid().channel_sums();
        ui.horizontal_wrapped(|ui| {
            ui.label(format!(
                "An experimental drawing app where all the initial RGB values \
                 ({} red, {} green, {} blue) are preserved: every stroke \
                 redistributes exactly what it changed onto the rest of the \
                 canvas. More at",
                sums[0], sums[1], sums[2]
            ));
            ui.hyperlink_to("constraint.systems", "https://constraint.systems");
        });
        ui.separator();
    }

    fn palette_row(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            for rgb in PALETTE {
                let fill = Color32::from_rgb(rgb[0], rgb[1], rgb[2]);
                let selected = self.color == Rgb(rgb);
                let stroke = if selected {
                    egui::Stroke::new(1.0, Color32::WHITE)
                } else {
                    egui::Stroke::new(1.0, PANEL_BORDER)
                };
                let button = egui::Button::new("")
                    .fill(fill)
                    .stroke(stroke)
                    .min_size(Vec2::splat(24.0));
                if ui.add(button).clicked() {
                    self.set_color(Rgb(rgb));
                }
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("RANDOM").clicked() {
                    let r = self.next_random();
                    self.set_color(Rgb([r as u8, (r >> 8) as u8, (r >> 16) as u8]));
                }
                let inverted = Rgb([
                    255 - self.color.0[0],
                    255 - self.color.0[1],
                    255 - self.color.0[2],
                ]);
                let invert_fill =
                    Color32::from_rgb(inverted.0[0], inverted.0[1], inverted.0[2]);
                let invert_text = RichText::new("INVERT").color(Color32::from_rgb(
                    self.color.0[0],
                    self.color.0[1],
                    self.color.0[2],
                ));
                if ui
                    .add(egui::Button::new(invert_text).fill(invert_fill))
                    .clicked()
                {
                    self.set_color(inverted);
                }
            });
        });
    }

    fn slider_block(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.vertical(|ui| {
                for c in 0..3 {
                    ui.horizontal(|ui| {
                        ui.monospace(["R", "G", "B"][c]);
                        let mut value = self.color.0[c];
                        if ui.add(egui::Slider::new(&mut value, 0..=255)).changed() {
                            let mut color = self.color;
                            color.0[c] = value;
                            self.set_color(color);
                        }
                    });
                }
            });
            self.brush_preview(ui);
        });
    }

    /// Small nearest-neighbor view of the disc the current brush stamps.
    fn brush_preview(&mut self, ui: &mut egui::Ui) {
        let key = (self.color, self.brush_radius);
        if self.preview_texture.is_none() || self.preview_key != key {
            let n = PREVIEW_CELLS;
            let center = (n / 2) as f64;
            let tint = Color32::from_rgb(self.color.0[0], self.color.0[1], self.color.0[2]);
            let mut pixels = vec![BG; (n * n) as usize];
            for y in 0..n {
                for x in 0..n {
                    let dx = x as f64 - center;
                    let dy = y as f64 - center;
                    if (dx * dx + dy * dy).sqrt().round() <= self.brush_radius as f64 {
                        pixels[(y * n + x) as usize] = tint;
                    }
                }
            }
            let img = ColorImage {
                size: [n as usize, n as usize],
                pixels,
            };
            match &mut self.preview_texture {
                Some(tex) => tex.set(img, TextureOptions::NEAREST),
                None => {
                    self.preview_texture =
                        Some(ui.ctx().load_texture("brush", img, TextureOptions::NEAREST))
                }
            }
            self.preview_key = key;
        }

        let (rect, _) = ui.allocate_exact_size(Vec2::splat(112.0), Sense::hover());
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, BG);
        if let Some(tex) = &self.preview_texture {
            let uv = Rect::from_min_max(Pos2::new(0.0, 0.0), Pos2::new(1.0, 1.0));
            painter.image(tex.id(), rect, uv, Color32::WHITE);
        }
    }

    fn size_and_zoom_row(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.vertical(|ui| {
                ui.label("Size");
                ui.horizontal(|ui| {
                    let mut radius = self.brush_radius;
                    if ui
                        .add(egui::Slider::new(&mut radius, 0..=7).show_value(false))
                        .changed()
                    {
                        self.brush_radius = radius;
                        self.prefs_dirty_since = Some(Instant::now());
                    }
                    ui.label(format!("{}", self.brush_radius + 1));
                });
            });

            ui.separator();

            ui.vertical(|ui| {
                ui.label("Zoom");
                ui.horizontal(|ui| {
                    let grid = self.engine.grid();
                    let (w, h) = (grid.width() as f32, grid.height() as f32);
                    let pivot = (w / 2.0, h / 2.0);
                    if ui.button("−").clicked() && self.camera.z > Camera::MIN_ZOOM {
                        self.camera =
                            self.camera.zoom_to(pivot, self.camera.z / 2.0).clamped(w, h);
                    }
                    if ui.button("+").clicked() && self.camera.z < Camera::MAX_ZOOM {
                        self.camera =
                            self.camera.zoom_to(pivot, self.camera.z * 2.0).clamped(w, h);
                    }
                    ui.label(format!("{}%", (self.camera.z * 100.0) as i32));
                });
            });

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                self.minimap(ui);
            });
        });
    }

    /// Whole-grid overview with the visible viewport outlined; dragging
    /// recenters the view when zoomed in.
    fn minimap(&mut self, ui: &mut egui::Ui) {
        let (w, h) = (
            self.engine.grid().width() as f32,
            self.engine.grid().height() as f32,
        );
        let (rect, response) = ui.allocate_exact_size(Vec2::new(w, h), Sense::drag());

        if (response.drag_started() || response.dragged()) && self.camera.z > Camera::MIN_ZOOM {
            if let Some(pos) = response.interact_pointer_pos() {
                let rel = pos - rect.min;
                let x = rel.x.floor() - w / self.camera.z / 2.0;
                let y = rel.y.floor() - h / self.camera.z / 2.0;
                self.camera = Camera {
                    x: -x,
                    y: -y,
                    z: self.camera.z,
                }
                .clamped(w, h);
            }
        }

        self.refresh_canvas_texture(ui.ctx());
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, BG);
        if let Some(tex) = &self.canvas_texture {
            let uv = Rect::from_min_max(Pos2::new(0.0, 0.0), Pos2::new(1.0, 1.0));
            painter.image(tex.id(), rect, uv, Color32::WHITE);
        }
        // Viewport box: black outer line, white inner line.
        let view = Rect::from_min_size(
            rect.min + Vec2::new(-self.camera.x, -self.camera.y),
            Vec2::new(w / self.camera.z, h / self.camera.z),
        );
        painter.rect_stroke(view, 0.0, egui::Stroke::new(2.0, Color32::BLACK));
        painter.rect_stroke(view.shrink(0.5), 0.0, egui::Stroke::new(1.0, Color32::WHITE));
    }

    // ---- persistence --------------------------------------------------------

    fn set_color(&mut self, color: Rgb<u8>) {
        self.color = color;
        self.prefs_dirty_since = Some(Instant::now());
    }

    /// Debounced saves: state serialization runs on a background thread
    /// so it never delays the next stroke.
    fn maybe_save(&mut self) {
        if let Some(t) = self.state_dirty_since
            && t.elapsed() >= SAVE_DEBOUNCE
        {
            self.state_dirty_since = None;
            let snapshot = io::snapshot_state(&self.engine);
            let dir = self.state_dir.clone();
            std::thread::spawn(move || {
                if let Err(e) = io::write_state(&snapshot, &dir) {
                    log_err!("background save failed: {}", e);
                }
            });
        }
        if let Some(t) = self.prefs_dirty_since
            && t.elapsed() >= SAVE_DEBOUNCE
        {
            self.prefs_dirty_since = None;
            let prefs = Prefs {
                color: self.color.0,
                brush_radius: self.brush_radius,
            };
            if let Err(e) = io::save_prefs(&prefs, &self.state_dir) {
                log_err!("saving prefs failed: {}", e);
            }
        }
    }

    fn next_random(&mut self) -> u64 {
        // xorshift64 — palette randomization needs no real entropy.
        self.rng ^= self.rng << 13;
        self.rng ^= self.rng >> 7;
        self.rng ^= self.rng << 17;
        self.rng
    }
}

impl eframe::App for ConservationApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.maybe_save();

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(BG).inner_margin(8.0))
            .show(ctx, |ui| {
                self.title_bar(ui);
                if self.show_info {
                    self.info_panel(ui);
                }
                self.paint_canvas(ui);
                ui.separator();
                self.palette_row(ui);
                self.slider_block(ui);
                ui.separator();
                self.size_and_zoom_row(ui);
            });

        // Keep ticking while a debounced save is pending.
        if self.state_dirty_since.is_some() || self.prefs_dirty_since.is_some() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Err(e) = io::save_state(&self.engine, &self.state_dir) {
            log_err!("final save failed: {}", e);
        }
        let prefs = Prefs {
            color: self.color.0,
            brush_radius: self.brush_radius,
        };
        if let Err(e) = io::save_prefs(&prefs, &self.state_dir) {
            log_err!("final prefs save failed: {}", e);
        }
    }
}

/// Grid → egui image, one texel per cell.
fn color_image(grid: &PixelGrid) -> ColorImage {
    ColorImage {
        size: [grid.width() as usize, grid.height() as usize],
        pixels: grid
            .cells()
            .iter()
            .map(|px| Color32::from_rgb(px.0[0], px.0[1], px.0[2]))
            .collect(),
    }
}
