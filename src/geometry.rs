//! World-space rectangles and region identity
//!
//! Selections are dragged in any direction, so a rectangle is built from two
//! arbitrary corners and normalized. Corners are inclusive: a rectangle from
//! (1, 1) to (2, 2) covers four tiles.

use serde::{Deserialize, Serialize};

/// Inclusive rectangle in world tile coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl TileRect {
    /// Build a rectangle from two corners in any order.
    pub fn new(start: (i32, i32), end: (i32, i32)) -> Self {
        Self {
            x0: start.0.min(end.0),
            y0: start.1.min(end.1),
            x1: start.0.max(end.0),
            y1: start.1.max(end.1),
        }
    }

    /// Rectangle of `width` x `height` tiles with its top-left corner at (x, y).
    /// Zero sizes are bumped to a single tile.
    pub fn from_origin(x: i32, y: i32, width: u32, height: u32) -> Self {
        let w = width.max(1) as i32;
        let h = height.max(1) as i32;
        Self {
            x0: x,
            y0: y,
            x1: x + w - 1,
            y1: y + h - 1,
        }
    }

    pub fn width(&self) -> u32 {
        (self.x1 - self.x0 + 1) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y1 - self.y0 + 1) as u32
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    pub fn intersects(&self, other: &TileRect) -> bool {
        self.x0 <= other.x1 && other.x0 <= self.x1 && self.y0 <= other.y1 && other.y0 <= self.y1
    }

    /// Overlapping area of two rectangles, if any.
    pub fn intersection(&self, other: &TileRect) -> Option<TileRect> {
        if !self.intersects(other) {
            return None;
        }
        Some(TileRect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        })
    }

    /// Iterate over every cell, row by row.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> {
        let (x0, x1) = (self.x0, self.x1);
        (self.y0..=self.y1).flat_map(move |y| (x0..=x1).map(move |x| (x, y)))
    }
}

/// Stable identity of a user selection. Two requests refer to the same region
/// exactly when their ids match, regardless of bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(pub u64);

/// What the selection/editing layer exposes about an editable region.
pub trait Region {
    fn id(&self) -> RegionId;
    fn bounds(&self) -> TileRect;
    fn z_level(&self) -> i32;

    fn start(&self) -> (i32, i32) {
        let b = self.bounds();
        (b.x0, b.y0)
    }

    fn end(&self) -> (i32, i32) {
        let b = self.bounds();
        (b.x1, b.y1)
    }
}

/// Immutable snapshot of a region taken when a regeneration is requested.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub id: RegionId,
    pub bounds: TileRect,
    pub z_level: i32,
    /// Free-form instruction for the oracle ("a river running north").
    pub prompt: String,
}

impl Selection {
    pub fn new(id: u64, bounds: TileRect, z_level: i32) -> Self {
        Self {
            id: RegionId(id),
            bounds,
            z_level,
            prompt: String::new(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Snapshot any external region.
    pub fn from_region<R: Region + ?Sized>(region: &R) -> Self {
        Self {
            id: region.id(),
            bounds: region.bounds(),
            z_level: region.z_level(),
            prompt: String::new(),
        }
    }
}

impl Region for Selection {
    fn id(&self) -> RegionId {
        self.id
    }

    fn bounds(&self) -> TileRect {
        self.bounds
    }

    fn z_level(&self) -> i32 {
        self.z_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_normalizes_corners() {
        let rect = TileRect::new((3, 2), (1, 5));
        assert_eq!(rect, TileRect { x0: 1, y0: 2, x1: 3, y1: 5 });
        assert_eq!(rect.width(), 3);
        assert_eq!(rect.height(), 4);
        assert_eq!(rect.area(), 12);
    }

    #[test]
    fn test_rect_intersection() {
        let a = TileRect::new((1, 1), (2, 2));
        let b = TileRect::new((2, 1), (3, 2));
        assert_eq!(a.intersection(&b), Some(TileRect::new((2, 1), (2, 2))));

        let far = TileRect::new((10, 10), (12, 12));
        assert!(!a.intersects(&far));
        assert_eq!(a.intersection(&far), None);
    }

    #[test]
    fn test_cells_row_major() {
        let rect = TileRect::new((0, 0), (1, 1));
        let cells: Vec<_> = rect.cells().collect();
        assert_eq!(cells, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
    }

    #[test]
    fn test_selection_from_region() {
        let sel = Selection::new(7, TileRect::new((4, 4), (0, 0)), 2);
        let copy = Selection::from_region(&sel);
        assert_eq!(copy.id, RegionId(7));
        assert_eq!(copy.start(), (0, 0));
        assert_eq!(copy.end(), (4, 4));
    }
}
