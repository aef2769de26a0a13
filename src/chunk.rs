//! Chunk index
//!
//! Maps world rectangles onto the fixed-size grid cells used to batch dirty
//! tracking. Each priority level has its own grid; the level is part of the key.

use serde::{Deserialize, Serialize};

use crate::geometry::TileRect;

/// A grid cell at one priority level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    pub level: i32,
    pub cy: i32,
    pub cx: i32,
}

impl ChunkKey {
    pub fn new(cx: i32, cy: i32, level: i32) -> Self {
        Self { level, cy, cx }
    }

    /// The chunk containing world tile (x, y).
    pub fn containing(x: i32, y: i32, level: i32, chunk_size: u32) -> Self {
        let size = chunk_size.max(1) as i32;
        Self::new(x.div_euclid(size), y.div_euclid(size), level)
    }

    /// World tiles covered by this chunk.
    pub fn bounds(&self, chunk_size: u32) -> TileRect {
        let size = chunk_size.max(1);
        let s = size as i32;
        TileRect::from_origin(self.cx * s, self.cy * s, size, size)
    }
}

impl std::fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})@z{}", self.cx, self.cy, self.level)
    }
}

/// Every chunk at `level` that `rect` touches, in row-major order.
pub fn chunks_overlapping(rect: &TileRect, level: i32, chunk_size: u32) -> Vec<ChunkKey> {
    let first = ChunkKey::containing(rect.x0, rect.y0, level, chunk_size);
    let last = ChunkKey::containing(rect.x1, rect.y1, level, chunk_size);

    let mut keys = Vec::with_capacity(
        ((last.cx - first.cx + 1) * (last.cy - first.cy + 1)).max(0) as usize,
    );
    for cy in first.cy..=last.cy {
        for cx in first.cx..=last.cx {
            keys.push(ChunkKey::new(cx, cy, level));
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_chunk() {
        let keys = chunks_overlapping(&TileRect::new((1, 1), (3, 3)), 0, 8);
        assert_eq!(keys, vec![ChunkKey::new(0, 0, 0)]);
    }

    #[test]
    fn test_rect_spanning_boundary() {
        // 6..=9 crosses the 8-tile boundary on both axes
        let keys = chunks_overlapping(&TileRect::new((6, 6), (9, 9)), 2, 8);
        assert_eq!(
            keys,
            vec![
                ChunkKey::new(0, 0, 2),
                ChunkKey::new(1, 0, 2),
                ChunkKey::new(0, 1, 2),
                ChunkKey::new(1, 1, 2),
            ]
        );
    }

    #[test]
    fn test_negative_coordinates_floor() {
        let key = ChunkKey::containing(-1, -8, 0, 8);
        assert_eq!(key, ChunkKey::new(-1, -1, 0));

        let keys = chunks_overlapping(&TileRect::new((-1, 0), (0, 0)), 0, 8);
        assert_eq!(keys, vec![ChunkKey::new(-1, 0, 0), ChunkKey::new(0, 0, 0)]);
    }

    #[test]
    fn test_chunk_bounds_round_trip() {
        let key = ChunkKey::new(-2, 3, 1);
        let bounds = key.bounds(4);
        assert_eq!(bounds, TileRect::new((-8, 12), (-5, 15)));
        assert_eq!(chunks_overlapping(&bounds, 1, 4), vec![key]);
    }

    #[test]
    fn test_zero_chunk_size_is_clamped() {
        let keys = chunks_overlapping(&TileRect::new((0, 0), (1, 0)), 0, 0);
        assert_eq!(keys.len(), 2);
    }
}
