//! The conservation-painting engine.
//!
//! Owns the pixel grid and the recency order, and processes strokes one
//! at a time: deposit the brush color into the disc, then redistribute
//! the exact per-channel change across exterior cells so that every
//! channel's grid-wide total is unchanged by the stroke.

mod grid;
mod order;
mod selector;
mod stroke;

pub use grid::{FillPattern, PixelGrid};
pub use order::RecencyOrder;
pub use stroke::{Stroke, StrokeReport};

use stroke::StrokeExecutor;

/// Construction-time constants. Never renegotiated at runtime.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    pub width: u32,
    pub height: u32,
    /// Stroke radii are clamped to this before processing.
    pub max_radius: u32,
    pub pattern: FillPattern,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            max_radius: 7,
            pattern: FillPattern::default(),
        }
    }
}

/// A stroke that could not be fully conserved.
#[derive(Debug, PartialEq)]
pub enum StrokeError {
    /// The exterior candidates ran out of headroom before one or more
    /// channels balanced. The stroke is committed; `residual` is the
    /// post-stroke minus pre-stroke total per channel.
    HeadroomExhausted { residual: [i64; 3] },
}

impl std::fmt::Display for StrokeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrokeError::HeadroomExhausted { residual } => write!(
                f,
                "insufficient exterior headroom, channel sums drifted by ({}, {}, {})",
                residual[0], residual[1], residual[2]
            ),
        }
    }
}

impl std::error::Error for StrokeError {}

/// One painting session: grid + recency order behind a single writer.
pub struct Engine {
    grid: PixelGrid,
    order: RecencyOrder,
    max_radius: u32,
    generation: u64,
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Self {
        let grid = PixelGrid::new(config.width, config.height, &config.pattern);
        let order = RecencyOrder::new(grid.len());
        Self {
            grid,
            order,
            max_radius: config.max_radius,
            generation: 0,
        }
    }

    /// Assemble an engine from restored state. The order must cover
    /// exactly the grid's cells.
    pub fn from_parts(
        grid: PixelGrid,
        order: RecencyOrder,
        max_radius: u32,
    ) -> Result<Self, String> {
        if order.len() != grid.len() {
            return Err(format!(
                "recency order covers {} cells, grid has {}",
                order.len(),
                grid.len()
            ));
        }
        Ok(Self { grid, order, max_radius, generation: 0 })
    }

    /// Process one stroke to completion. The radius is clamped to the
    /// configured maximum.
    ///
    /// Conservation is verified by comparing the grid's channel totals
    /// before and after (O(1) against the running sums). On a headroom
    /// exhaustion the stroke stays committed and the drift is returned as
    /// an error — the caller chooses how to react.
    pub fn apply(&mut self, stroke: &Stroke) -> Result<StrokeReport, StrokeError> {
        let stroke = Stroke {
            radius: stroke.radius.min(self.max_radius),
            ..*stroke
        };
        let before = self.grid.channel_sums();
        let report = StrokeExecutor::new(&mut self.grid, &mut self.order).run(&stroke);
        self.generation += 1;
        let after = self.grid.channel_sums();
        if after != before {
            let mut residual = [0i64; 3];
            for c in 0..3 {
                residual[c] = after[c] as i64 - before[c] as i64;
            }
            return Err(StrokeError::HeadroomExhausted { residual });
        }
        Ok(report)
    }

    pub fn grid(&self) -> &PixelGrid {
        &self.grid
    }

    pub fn order(&self) -> &RecencyOrder {
        &self.order
    }

    pub fn max_radius(&self) -> u32 {
        self.max_radius
    }

    /// Bumped once per processed stroke; observers use it to skip
    /// texture re-uploads when nothing changed.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
