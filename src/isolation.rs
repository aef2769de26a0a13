//! Region isolation
//!
//! Once a region has been regenerated in the current run, nothing with a
//! lower priority level may overwrite its cells, even where the bounds
//! overlap. The mask only grows during a run and is dropped when the run ends.
//!
//! Higher Z-level means higher priority. Equal levels do not block each other.

use log::debug;

use crate::geometry::TileRect;
use crate::tiles::{TileMatrix, TileStorage};

#[derive(Clone, Debug, Default)]
pub struct IsolationMask {
    regions: Vec<(TileRect, i32)>,
}

impl IsolationMask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a region as regenerated in this run.
    pub fn record(&mut self, bounds: TileRect, level: i32) {
        self.regions.push((bounds, level));
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Regions recorded at a level strictly above `level`.
    pub fn higher_than(&self, level: i32) -> impl Iterator<Item = &TileRect> + '_ {
        self.regions
            .iter()
            .filter(move |(_, z)| *z > level)
            .map(|(rect, _)| rect)
    }

    /// Whether a write at (x, y) from a region at `level` must be skipped.
    pub fn blocks(&self, x: i32, y: i32, level: i32) -> bool {
        self.higher_than(level).any(|rect| rect.contains(x, y))
    }
}

/// Outcome of a masked write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub written: usize,
    pub skipped: usize,
}

/// Write `matrix` into `storage` with its top-left cell at `bounds`' origin,
/// skipping any cell protected by a higher-level region. `None` cells
/// remove the existing tile.
pub fn write_masked<S: TileStorage + ?Sized>(
    storage: &mut S,
    bounds: &TileRect,
    matrix: &TileMatrix,
    mask: &IsolationMask,
    level: i32,
) -> WriteReport {
    let mut report = WriteReport::default();
    for row in 0..matrix.height() {
        for col in 0..matrix.width() {
            let x = bounds.x0 + col as i32;
            let y = bounds.y0 + row as i32;
            if mask.blocks(x, y, level) {
                report.skipped += 1;
                continue;
            }
            match matrix.get(col, row) {
                Some(tile) => storage.put_tile_at(tile, x, y),
                None => storage.remove_tile_at(x, y),
            }
            report.written += 1;
        }
    }
    if report.skipped > 0 {
        debug!(
            "isolation: z{} write to {:?} skipped {} protected cells",
            level, bounds, report.skipped
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::TileLayer;

    #[test]
    fn test_lower_region_cannot_overwrite_higher() {
        let mut layer = TileLayer::new(6, 6);
        let mut mask = IsolationMask::new();

        let r1 = TileRect::new((1, 1), (2, 2));
        write_masked(&mut layer, &r1, &TileMatrix::filled(2, 2, 9), &mask, 5);
        mask.record(r1, 5);

        let r2 = TileRect::new((2, 1), (3, 2));
        let report = write_masked(&mut layer, &r2, &TileMatrix::filled(2, 2, 1), &mask, 1);
        assert_eq!(report, WriteReport { written: 2, skipped: 2 });

        for (x, y) in [(1, 1), (1, 2), (2, 1), (2, 2)] {
            assert_eq!(layer.tile_at(x, y), Some(9));
        }
        assert_eq!(layer.tile_at(3, 1), Some(1));
        assert_eq!(layer.tile_at(3, 2), Some(1));
    }

    #[test]
    fn test_equal_and_higher_levels_pass_through() {
        let mut mask = IsolationMask::new();
        mask.record(TileRect::new((0, 0), (3, 3)), 2);
        assert!(!mask.blocks(1, 1, 2));
        assert!(!mask.blocks(1, 1, 3));
        assert!(mask.blocks(1, 1, 1));
        assert!(!mask.blocks(4, 4, 1));
    }

    #[test]
    fn test_none_cells_remove_tiles() {
        let mut layer = TileLayer::new_with(2, 1, 4);
        let matrix = TileMatrix::from_rows(vec![vec![None, Some(8)]]).unwrap();
        let bounds = layer.bounds();
        write_masked(&mut layer, &bounds, &matrix, &IsolationMask::new(), 0);
        assert_eq!(layer.tile_at(0, 0), None);
        assert_eq!(layer.tile_at(1, 0), Some(8));
    }
}
