use image::Rgb;

use super::grid::PixelGrid;
use super::order::RecencyOrder;
use super::selector::{CandidateSelector, in_disc};

/// One paint event: a disc of `radius` around integer grid coordinates,
/// filled with `color`. Centers may lie outside the grid; out-of-bounds
/// disc cells are silently skipped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stroke {
    pub x: i32,
    pub y: i32,
    pub radius: u32,
    pub color: Rgb<u8>,
}

/// What one committed stroke did to the grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeReport {
    /// In-bounds disc cells (all moved to the recency front, repainted
    /// or not).
    pub cells_touched: u32,
    /// Net per-channel change introduced by the deposit step — the exact
    /// amount redistribution repaid.
    pub delta: [i64; 3],
}

/// Runs one stroke: Deposit → Redistribute → Done. Both steps always
/// execute; the accumulator is dropped at the end.
pub(crate) struct StrokeExecutor<'a> {
    grid: &'a mut PixelGrid,
    order: &'a mut RecencyOrder,
}

impl<'a> StrokeExecutor<'a> {
    pub fn new(grid: &'a mut PixelGrid, order: &'a mut RecencyOrder) -> Self {
        Self { grid, order }
    }

    pub fn run(&mut self, stroke: &Stroke) -> StrokeReport {
        let (cells_touched, delta) = self.deposit(stroke);
        self.redistribute(stroke, delta);
        StrokeReport { cells_touched, delta }
    }

    /// Overwrite every in-bounds disc cell with the target color and
    /// accumulate the signed per-channel change. Every disc cell is moved
    /// to the recency front even when its color is already the target.
    /// Scans column by column (x outer, y inner), so recency ties inside
    /// one disc are deterministic.
    fn deposit(&mut self, stroke: &Stroke) -> (u32, [i64; 3]) {
        let r = stroke.radius as i64;
        let cx = stroke.x as i64;
        let cy = stroke.y as i64;
        let mut delta = [0i64; 3];
        let mut cells_touched = 0u32;
        for x in (cx - r)..=(cx + r) {
            for y in (cy - r)..=(cy + r) {
                let dx = x - cx;
                let dy = y - cy;
                if !in_disc((dx * dx + dy * dy) as u64, stroke.radius) {
                    continue;
                }
                if !self.grid.contains(x, y) {
                    continue;
                }
                let index = self.grid.index_of(x as u32, y as u32);
                self.order.touch(index);
                cells_touched += 1;
                let px = self.grid.pixel_at(index);
                if px == stroke.color {
                    continue;
                }
                for c in 0..3 {
                    delta[c] += stroke.color.0[c] as i64 - px.0[c] as i64;
                }
                self.grid.put_pixel_at(index, stroke.color);
            }
        }
        (cells_touched, delta)
    }

    /// Walk the candidate sequence once, repaying all three channel debts
    /// from the same pass. `placed` tracks the signed amount already
    /// repaid per channel and moves from 0 toward `delta`; a channel
    /// whose debt is settled never modifies another cell. Stops as soon
    /// as every channel balances — or when the candidates run out, in
    /// which case the caller detects the residual from the grid totals.
    fn redistribute(&mut self, stroke: &Stroke, delta: [i64; 3]) {
        let mut selector =
            CandidateSelector::new(self.grid, (stroke.x, stroke.y), stroke.radius, stroke.color);
        let mut placed = [0i64; 3];
        while placed != delta {
            let Some(index) = selector.next_candidate(self.grid, self.order) else {
                break;
            };
            let mut px = self.grid.pixel_at(index);
            for c in 0..3 {
                if placed[c] == delta[c] {
                    continue;
                }
                let v = px.0[c] as i64;
                if delta[c] < 0 {
                    // Sum decreased: add back, ceiling at 255.
                    let need = placed[c] - delta[c];
                    let headroom = 255 - v;
                    if need > headroom {
                        px.0[c] = 255;
                        placed[c] -= headroom;
                    } else {
                        px.0[c] = (v + need) as u8;
                        placed[c] -= need;
                    }
                } else {
                    // Sum increased: subtract, floor at 0.
                    let need = delta[c] - placed[c];
                    if v <= need {
                        px.0[c] = 0;
                        placed[c] += v;
                    } else {
                        px.0[c] = (v - need) as u8;
                        placed[c] += need;
                    }
                }
            }
            self.grid.put_pixel_at(index, px);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::grid::FillPattern;

    fn run(grid: &mut PixelGrid, order: &mut RecencyOrder, stroke: Stroke) -> StrokeReport {
        StrokeExecutor::new(grid, order).run(&stroke)
    }

    #[test]
    fn deposit_reports_exact_delta() {
        let mut grid = PixelGrid::new(4, 4, &FillPattern::Solid(Rgb([100, 100, 100])));
        let mut order = RecencyOrder::new(16);
        let report = run(
            &mut grid,
            &mut order,
            Stroke { x: 1, y: 1, radius: 0, color: Rgb([140, 90, 100]) },
        );
        assert_eq!(report.cells_touched, 1);
        assert_eq!(report.delta, [40, -10, 0]);
        assert_eq!(grid.get_pixel(1, 1), Rgb([140, 90, 100]));
    }

    #[test]
    fn repainting_same_color_is_idempotent_but_touches() {
        let mut grid = PixelGrid::new(4, 4, &FillPattern::default());
        let mut order = RecencyOrder::new(16);
        let stroke = Stroke { x: 3, y: 2, radius: 1, color: Rgb([255, 255, 255]) };
        run(&mut grid, &mut order, stroke);
        let cells = grid.cells().to_vec();
        let report = run(&mut grid, &mut order, stroke);
        assert_eq!(report.delta, [0, 0, 0]);
        assert!(report.cells_touched > 0);
        assert_eq!(grid.cells(), &cells[..]);
        // The disc still went to the recency front.
        assert!(order.rank_of(grid.index_of(3, 2)) < report.cells_touched as usize);
    }

    #[test]
    fn saturation_spills_to_later_candidates() {
        // One row, all dark: brightening the leftmost cell must be repaid
        // by darkening neighbors, but each holds at most its own value.
        let mut grid = PixelGrid::new(4, 1, &FillPattern::Solid(Rgb([6, 0, 0])));
        let mut order = RecencyOrder::new(4);
        let before = grid.channel_sums();
        run(
            &mut grid,
            &mut order,
            Stroke { x: 0, y: 0, radius: 0, color: Rgb([20, 0, 0]) },
        );
        // Delta +14: cell 1 floors (6), cell 2 floors (6), cell 3 gives 2.
        assert_eq!(grid.get_pixel(1, 0), Rgb([0, 0, 0]));
        assert_eq!(grid.get_pixel(2, 0), Rgb([0, 0, 0]));
        assert_eq!(grid.get_pixel(3, 0), Rgb([4, 0, 0]));
        assert_eq!(grid.channel_sums(), before);
    }

    #[test]
    fn channels_balance_independently() {
        let mut grid = PixelGrid::new(3, 1, &FillPattern::Solid(Rgb([100, 200, 0])));
        let mut order = RecencyOrder::new(3);
        let before = grid.channel_sums();
        run(
            &mut grid,
            &mut order,
            Stroke { x: 0, y: 0, radius: 0, color: Rgb([150, 150, 0]) },
        );
        // R debt −50 on exterior, G credit +50, B untouched.
        assert_eq!(grid.channel_sums(), before);
        assert_eq!(grid.get_pixel(1, 0), Rgb([50, 250, 0]));
        assert_eq!(grid.get_pixel(2, 0), Rgb([100, 200, 0]));
    }
}
