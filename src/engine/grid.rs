use image::{Rgb, RgbImage};

/// Initial fill applied at engine construction. Fixes the three conserved
/// channel totals for the whole session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FillPattern {
    /// Left half of the columns gets `left`, the rest gets `right`.
    /// For odd widths the left half is `width / 2` columns.
    SplitHalves { left: Rgb<u8>, right: Rgb<u8> },
    /// Every cell gets the same color.
    Solid(Rgb<u8>),
}

impl Default for FillPattern {
    fn default() -> Self {
        FillPattern::SplitHalves {
            left: Rgb([0, 0, 0]),
            right: Rgb([255, 255, 255]),
        }
    }
}

impl FillPattern {
    fn color_at(&self, x: u32, _y: u32, width: u32) -> Rgb<u8> {
        match *self {
            FillPattern::SplitHalves { left, right } => {
                if x < width / 2 { left } else { right }
            }
            FillPattern::Solid(color) => color,
        }
    }
}

/// Fixed-size row-major RGB grid with running per-channel totals.
///
/// Totals are maintained incrementally on every write, so `channel_sum`
/// is O(1) and the per-stroke conservation check never scans the grid.
#[derive(Clone, PartialEq)]
pub struct PixelGrid {
    width: u32,
    height: u32,
    cells: Vec<Rgb<u8>>,
    sums: [u64; 3],
}

impl PixelGrid {
    pub fn new(width: u32, height: u32, pattern: &FillPattern) -> Self {
        assert!(width > 0 && height > 0, "grid dimensions must be nonzero");
        let mut cells = Vec::with_capacity((width * height) as usize);
        let mut sums = [0u64; 3];
        for y in 0..height {
            for x in 0..width {
                let px = pattern.color_at(x, y, width);
                for c in 0..3 {
                    sums[c] += px.0[c] as u64;
                }
                cells.push(px);
            }
        }
        Self { width, height, cells, sums }
    }

    /// Build a grid from pre-existing row-major cells (e.g. a decoded
    /// state image). Fails if the cell count does not match the dimensions.
    pub fn from_cells(width: u32, height: u32, cells: Vec<Rgb<u8>>) -> Result<Self, String> {
        let expected = (width as usize) * (height as usize);
        if width == 0 || height == 0 || cells.len() != expected {
            return Err(format!(
                "cell count {} does not match {}x{} grid",
                cells.len(),
                width,
                height
            ));
        }
        let mut sums = [0u64; 3];
        for px in &cells {
            for c in 0..3 {
                sums[c] += px.0[c] as u64;
            }
        }
        Ok(Self { width, height, cells, sums })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of cells (W·H).
    pub fn len(&self) -> u32 {
        self.width * self.height
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }

    /// Row-major index of an in-bounds coordinate.
    #[inline]
    pub fn index_of(&self, x: u32, y: u32) -> u32 {
        debug_assert!(x < self.width && y < self.height);
        y * self.width + x
    }

    /// Coordinate of a row-major index.
    #[inline]
    pub fn coords_of(&self, index: u32) -> (u32, u32) {
        debug_assert!(index < self.len());
        (index % self.width, index / self.width)
    }

    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> Rgb<u8> {
        self.cells[self.index_of(x, y) as usize]
    }

    #[inline]
    pub fn pixel_at(&self, index: u32) -> Rgb<u8> {
        self.cells[index as usize]
    }

    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, px: Rgb<u8>) {
        let index = self.index_of(x, y);
        self.put_pixel_at(index, px);
    }

    #[inline]
    pub fn put_pixel_at(&mut self, index: u32, px: Rgb<u8>) {
        let old = self.cells[index as usize];
        for c in 0..3 {
            self.sums[c] -= old.0[c] as u64;
            self.sums[c] += px.0[c] as u64;
        }
        self.cells[index as usize] = px;
    }

    /// Current total of one channel over the whole grid. O(1).
    pub fn channel_sum(&self, channel: usize) -> u64 {
        self.sums[channel]
    }

    /// All three channel totals, R/G/B order. O(1).
    pub fn channel_sums(&self) -> [u64; 3] {
        self.sums
    }

    /// Row-major cell slice (read-only observers: rendering, persistence).
    pub fn cells(&self) -> &[Rgb<u8>] {
        &self.cells
    }

    /// Flatten into an owned `RgbImage` for texture upload or encoding.
    pub fn to_image(&self) -> RgbImage {
        let mut raw = Vec::with_capacity(self.cells.len() * 3);
        for px in &self.cells {
            raw.extend_from_slice(&px.0);
        }
        RgbImage::from_raw(self.width, self.height, raw)
            .expect("cell buffer matches grid dimensions")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pattern_sums() {
        // 64×64 split grid: each channel conserves 255 * (64*64/2) = 522 240.
        let grid = PixelGrid::new(64, 64, &FillPattern::default());
        for c in 0..3 {
            assert_eq!(grid.channel_sum(c), 522_240);
        }
    }

    #[test]
    fn split_pattern_layout() {
        let grid = PixelGrid::new(4, 2, &FillPattern::default());
        assert_eq!(grid.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(grid.get_pixel(1, 1), Rgb([0, 0, 0]));
        assert_eq!(grid.get_pixel(2, 0), Rgb([255, 255, 255]));
        assert_eq!(grid.get_pixel(3, 1), Rgb([255, 255, 255]));
    }

    #[test]
    fn put_pixel_tracks_sums() {
        let mut grid = PixelGrid::new(3, 3, &FillPattern::Solid(Rgb([10, 20, 30])));
        assert_eq!(grid.channel_sums(), [90, 180, 270]);
        grid.put_pixel(1, 2, Rgb([0, 255, 30]));
        assert_eq!(grid.channel_sums(), [80, 415, 270]);
        // Re-writing the same value is a no-op for the totals.
        grid.put_pixel(1, 2, Rgb([0, 255, 30]));
        assert_eq!(grid.channel_sums(), [80, 415, 270]);
    }

    #[test]
    fn from_cells_rejects_mismatch() {
        assert!(PixelGrid::from_cells(2, 2, vec![Rgb([0, 0, 0]); 3]).is_err());
        assert!(PixelGrid::from_cells(2, 2, vec![Rgb([0, 0, 0]); 4]).is_ok());
    }

    #[test]
    fn image_round_trip() {
        let grid = PixelGrid::new(5, 3, &FillPattern::default());
        let img = grid.to_image();
        assert_eq!((img.width(), img.height()), (5, 3));
        for (x, y, px) in img.enumerate_pixels() {
            assert_eq!(*px, grid.get_pixel(x, y));
        }
    }
}
