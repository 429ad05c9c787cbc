use std::cmp::Reverse;
use std::collections::BinaryHeap;

use image::Rgb;

use super::grid::PixelGrid;
use super::order::RecencyOrder;

/// Priority key for exterior cells that do not already match the brush
/// color: nearest first, then most recently touched, then lowest index.
/// Distances compare as exact integer squares, so ordering never depends
/// on float rounding.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct NearKey {
    dist_sq: u64,
    recency: Reverse<u64>,
    index: u32,
}

/// Lazy producer of compensation candidates for one stroke.
///
/// Contract (identical to sorting every exterior cell up front):
/// 1. cells whose color differs from the target, by ascending Euclidean
///    distance to the stroke center, ties broken by recency (most recent
///    first) then raw index;
/// 2. only once group 1 is exhausted, cells already matching the target,
///    least recently touched first.
///
/// Instead of sorting the whole grid per stroke, Chebyshev rings around
/// the center are scanned outward on demand and feed a min-heap. A heap
/// entry is only emitted once its distance is ≤ the last scanned ring
/// radius — every unscanned cell is then provably farther — so strokes
/// that balance after a handful of candidates never pay for a full-grid
/// sort. Classification reads each cell's color when its ring is scanned,
/// which happens strictly before the cell can be emitted (and therefore
/// before redistribution may write to it), so grouping matches the
/// post-deposit grid state.
pub(crate) struct CandidateSelector {
    cx: i64,
    cy: i64,
    radius: u32,
    target: Rgb<u8>,
    /// Last Chebyshev ring fully scanned; -1 before the first scan.
    ring: i64,
    /// Ring that reaches the farthest in-bounds cell.
    max_ring: i64,
    near: BinaryHeap<Reverse<NearKey>>,
    /// Deprioritized (already matching) cells as (stamp, index).
    matched: Vec<(u64, u32)>,
    matched_sorted: bool,
    matched_next: usize,
}

impl CandidateSelector {
    pub fn new(grid: &PixelGrid, center: (i32, i32), radius: u32, target: Rgb<u8>) -> Self {
        let (cx, cy) = (center.0 as i64, center.1 as i64);
        let w = grid.width() as i64;
        let h = grid.height() as i64;
        let max_ring = cx
            .abs()
            .max((w - 1 - cx).abs())
            .max(cy.abs())
            .max((h - 1 - cy).abs());
        Self {
            cx,
            cy,
            radius,
            target,
            ring: -1,
            max_ring,
            near: BinaryHeap::new(),
            matched: Vec::new(),
            matched_sorted: false,
            matched_next: 0,
        }
    }

    /// Next candidate index in contract order, or `None` when every
    /// exterior cell has been produced.
    ///
    /// `grid` is borrowed per call rather than held, so the caller may
    /// mutate already-emitted cells between calls.
    pub fn next_candidate(&mut self, grid: &PixelGrid, order: &RecencyOrder) -> Option<u32> {
        loop {
            if let Some(Reverse(key)) = self.near.peek() {
                let safe = self.ring >= self.max_ring
                    || (self.ring >= 0 && key.dist_sq <= (self.ring as u64).pow(2));
                if safe {
                    let Reverse(key) = self.near.pop().unwrap();
                    return Some(key.index);
                }
            }
            if self.ring < self.max_ring {
                self.ring += 1;
                self.scan_ring(self.ring, grid, order);
                continue;
            }
            // Group 1 exhausted — fall back to the deprioritized cells.
            if !self.matched_sorted {
                self.matched.sort_unstable();
                self.matched_sorted = true;
            }
            if self.matched_next < self.matched.len() {
                let (_, index) = self.matched[self.matched_next];
                self.matched_next += 1;
                return Some(index);
            }
            return None;
        }
    }

    /// Scan every in-bounds cell whose Chebyshev distance to the center
    /// is exactly `k`.
    fn scan_ring(&mut self, k: i64, grid: &PixelGrid, order: &RecencyOrder) {
        if k == 0 {
            self.consider(self.cx, self.cy, grid, order);
            return;
        }
        let w = grid.width() as i64;
        let h = grid.height() as i64;
        let x0 = (self.cx - k).max(0);
        let x1 = (self.cx + k).min(w - 1);
        for y in [self.cy - k, self.cy + k] {
            if y >= 0 && y < h {
                for x in x0..=x1 {
                    self.consider(x, y, grid, order);
                }
            }
        }
        let y0 = (self.cy - k + 1).max(0);
        let y1 = (self.cy + k - 1).min(h - 1);
        for x in [self.cx - k, self.cx + k] {
            if x >= 0 && x < w {
                for y in y0..=y1 {
                    self.consider(x, y, grid, order);
                }
            }
        }
    }

    fn consider(&mut self, x: i64, y: i64, grid: &PixelGrid, order: &RecencyOrder) {
        if !grid.contains(x, y) {
            return;
        }
        let dx = x - self.cx;
        let dy = y - self.cy;
        let dist_sq = (dx * dx + dy * dy) as u64;
        if in_disc(dist_sq, self.radius) {
            return;
        }
        let index = grid.index_of(x as u32, y as u32);
        let stamp = order.last_touch(index);
        if grid.pixel_at(index) == self.target {
            self.matched.push((stamp, index));
        } else {
            self.near.push(Reverse(NearKey {
                dist_sq,
                recency: Reverse(stamp),
                index,
            }));
        }
    }
}

/// Disc membership: rounded Euclidean distance ≤ radius, matching the
/// deposit step's rasterization exactly.
#[inline]
pub(crate) fn in_disc(dist_sq: u64, radius: u32) -> bool {
    (dist_sq as f64).sqrt().round() <= radius as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::grid::FillPattern;

    /// Reference implementation: classify and sort every exterior cell.
    fn naive_candidates(
        grid: &PixelGrid,
        order: &RecencyOrder,
        center: (i32, i32),
        radius: u32,
        target: Rgb<u8>,
    ) -> Vec<u32> {
        let mut near = Vec::new();
        let mut matched = Vec::new();
        for index in 0..grid.len() {
            let (x, y) = grid.coords_of(index);
            let dx = x as i64 - center.0 as i64;
            let dy = y as i64 - center.1 as i64;
            let dist_sq = (dx * dx + dy * dy) as u64;
            if in_disc(dist_sq, radius) {
                continue;
            }
            let stamp = order.last_touch(index);
            if grid.pixel_at(index) == target {
                matched.push((stamp, index));
            } else {
                near.push((dist_sq, Reverse(stamp), index));
            }
        }
        near.sort_unstable();
        matched.sort_unstable();
        near.iter()
            .map(|&(_, _, i)| i)
            .chain(matched.iter().map(|&(_, i)| i))
            .collect()
    }

    fn drain(
        grid: &PixelGrid,
        order: &RecencyOrder,
        center: (i32, i32),
        radius: u32,
        target: Rgb<u8>,
    ) -> Vec<u32> {
        let mut sel = CandidateSelector::new(grid, center, radius, target);
        let mut out = Vec::new();
        while let Some(i) = sel.next_candidate(grid, order) {
            out.push(i);
        }
        out
    }

    fn scrambled_fixture(w: u32, h: u32) -> (PixelGrid, RecencyOrder) {
        let mut grid = PixelGrid::new(w, h, &FillPattern::default());
        let mut order = RecencyOrder::new(w * h);
        // Deterministic scramble of colors and recency.
        let mut x = 0x2545_f491_4f6c_dd1du64;
        for index in 0..grid.len() {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            if x % 3 == 0 {
                grid.put_pixel_at(index, Rgb([(x >> 8) as u8, (x >> 16) as u8, (x >> 24) as u8]));
            }
            order.touch((x % grid.len() as u64) as u32);
        }
        (grid, order)
    }

    #[test]
    fn matches_naive_full_sort() {
        let (grid, order) = scrambled_fixture(7, 6);
        for &(center, radius) in &[((3, 3), 1), ((0, 0), 2), ((6, 5), 0), ((3, 2), 4)] {
            let target = Rgb([0, 0, 0]);
            assert_eq!(
                drain(&grid, &order, center, radius, target),
                naive_candidates(&grid, &order, center, radius, target),
                "center {:?} radius {}",
                center,
                radius
            );
        }
    }

    #[test]
    fn off_grid_center_matches_naive() {
        let (grid, order) = scrambled_fixture(5, 5);
        let target = Rgb([255, 255, 255]);
        for &center in &[(-3, 2), (7, 7), (2, -1)] {
            assert_eq!(
                drain(&grid, &order, center, 1, target),
                naive_candidates(&grid, &order, center, 1, target)
            );
        }
    }

    #[test]
    fn disc_cells_are_never_candidates() {
        let (grid, order) = scrambled_fixture(6, 6);
        let out = drain(&grid, &order, (2, 2), 2, Rgb([1, 2, 3]));
        for &index in &out {
            let (x, y) = grid.coords_of(index);
            let dx = x as i64 - 2;
            let dy = y as i64 - 2;
            assert!(!in_disc((dx * dx + dy * dy) as u64, 2));
        }
        // Exactly the exterior cells appear, each once.
        let mut sorted = out.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), out.len());
    }

    #[test]
    fn matching_cells_come_last_in_staleness_order() {
        let mut grid = PixelGrid::new(4, 1, &FillPattern::Solid(Rgb([9, 9, 9])));
        grid.put_pixel(1, 0, Rgb([0, 0, 0]));
        let mut order = RecencyOrder::new(4);
        order.touch(3); // 3 most recent, then 0, 1, 2 in initial order
        // Cell 0 is the disc; cells 2 and 3 match the target, cell 1 differs.
        let out = drain(&grid, &order, (0, 0), 0, Rgb([9, 9, 9]));
        // Group 1: cell 1. Group 2 stale-first: 2 (stamp 2) before 3 (just touched).
        assert_eq!(out, vec![1, 2, 3]);
    }
}
