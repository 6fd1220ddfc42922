//! geometry - Output cell layout derived from a target cell count
//! Rebuilt lazily when a layout-affecting parameter changes.

use heapless::Vec;

use crate::config::{SimConfig, MAX_GRID_CELLS, SCREEN_HEIGHT, SCREEN_WIDTH};

/// Normalized center of one output cell.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct GridCell {
    pub x: f32,
    pub y: f32,
}

pub struct GridGeometry {
    cells: Vec<GridCell, MAX_GRID_CELLS>,
    cols: u8,
    rows: u8,
    cell_width: f32,
    cell_height: f32,
}

impl GridGeometry {
    pub const fn new() -> Self {
        Self {
            cells: Vec::new(),
            cols: 0,
            rows: 0,
            cell_width: 0.0,
            cell_height: 0.0,
        }
    }

    /// Column/row counts for a target, with `cols * rows <= MAX_GRID_CELLS`.
    pub fn layout_for(target: u16) -> (u8, u8) {
        let target = (target as usize).clamp(1, MAX_GRID_CELLS);
        let cols = libm::ceilf(libm::sqrtf(target as f32)) as usize;
        let mut rows = (target + cols - 1) / cols;
        // Shed whole rows rather than leave a ragged last row past capacity
        if cols * rows > MAX_GRID_CELLS {
            rows = MAX_GRID_CELLS / cols;
        }
        (cols as u8, rows as u8)
    }

    pub fn rebuild(&mut self, cfg: &SimConfig) {
        let (cols, rows) = Self::layout_for(cfg.target_cell_count);
        self.cols = cols;
        self.rows = rows;

        let gap_x = cfg.grid_gap as f32 / SCREEN_WIDTH as f32;
        let gap_y = cfg.grid_gap as f32 / SCREEN_HEIGHT as f32;
        let (cols, rows) = (cols as usize, rows as usize);
        self.cell_width = ((1.0 - gap_x * (cols - 1) as f32) / cols as f32).max(0.0);
        self.cell_height = ((1.0 - gap_y * (rows - 1) as f32) / rows as f32).max(0.0);
        let step_x = self.cell_width + gap_x;
        let step_y = self.cell_height + gap_y;

        self.cells.clear();
        for r in 0..rows {
            for c in 0..cols {
                let cell = GridCell {
                    x: (c as f32 * step_x + self.cell_width * 0.5).min(1.0),
                    y: (r as f32 * step_y + self.cell_height * 0.5).min(1.0),
                };
                if self.cells.push(cell).is_err() {
                    log::debug!("geometry: cell capacity reached at {}x{}", cols, rows);
                    return;
                }
            }
        }
        log::info!(
            "geometry: {}x{} grid, {} cells (target {})",
            cols,
            rows,
            self.cells.len(),
            cfg.target_cell_count
        );
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cols(&self) -> u8 {
        self.cols
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }

    /// Normalized cell extent, excluding the gap.
    pub fn cell_size(&self) -> (f32, f32) {
        (self.cell_width, self.cell_height)
    }
}

impl Default for GridGeometry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cols_rows_follow_sqrt_rule() {
        assert_eq!(GridGeometry::layout_for(338), (19, 18));
        assert_eq!(GridGeometry::layout_for(100), (10, 10));
        assert_eq!(GridGeometry::layout_for(0), (1, 1));
        assert_eq!(GridGeometry::layout_for(2), (2, 1));
    }

    #[test]
    fn cell_count_matches_layout_and_capacity() {
        for target in [1u16, 7, 32, 338, 500, 511, 512, 600, u16::MAX] {
            let cfg = SimConfig { target_cell_count: target, ..SimConfig::default() };
            let mut geom = GridGeometry::new();
            geom.rebuild(&cfg);
            assert_eq!(geom.cell_count(), geom.cols() as usize * geom.rows() as usize);
            assert!(geom.cell_count() <= MAX_GRID_CELLS);
        }
    }

    #[test]
    fn rebuild_is_bit_identical() {
        let cfg = SimConfig { target_cell_count: 250, grid_gap: 3, ..SimConfig::default() };
        let mut a = GridGeometry::new();
        let mut b = GridGeometry::new();
        a.rebuild(&cfg);
        b.rebuild(&cfg);
        b.rebuild(&cfg);
        assert_eq!(a.cells().len(), b.cells().len());
        for (ca, cb) in a.cells().iter().zip(b.cells()) {
            assert_eq!(ca.x.to_bits(), cb.x.to_bits());
            assert_eq!(ca.y.to_bits(), cb.y.to_bits());
        }
    }

    #[test]
    fn centers_are_normalized_and_gap_shrinks_cells() {
        let plain = SimConfig { target_cell_count: 64, grid_gap: 0, ..SimConfig::default() };
        let gapped = SimConfig { grid_gap: 8, ..plain };
        let mut a = GridGeometry::new();
        let mut b = GridGeometry::new();
        a.rebuild(&plain);
        b.rebuild(&gapped);
        assert_eq!(a.cells()[0], GridCell { x: 0.0625, y: 0.0625 });
        assert!(b.cell_size().0 < a.cell_size().0);
        for cell in b.cells() {
            assert!((0.0..=1.0).contains(&cell.x) && (0.0..=1.0).contains(&cell.y));
        }
    }
}
