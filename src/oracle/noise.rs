//! Offline oracle: deterministic Perlin terrain.
//!
//! Samples noise at world coordinates, so adjacent regions line up without
//! stitching. Each level gets its own seed offset.

use noise::{NoiseFn, Perlin};

use super::{Oracle, OracleResult, RegionDescription};
use crate::tiles::TileMatrix;

pub struct NoiseOracle {
    seed: u32,
    tile_count: u32,
    frequency: f64,
}

impl NoiseOracle {
    pub fn new(seed: u64, tile_count: u32) -> Self {
        Self {
            seed: seed as u32,
            tile_count: tile_count.max(1),
            frequency: 0.08,
        }
    }

    pub fn with_frequency(mut self, frequency: f64) -> Self {
        self.frequency = frequency;
        self
    }

    fn tile(&self, perlin: &Perlin, x: i32, y: i32) -> u32 {
        let n = perlin.get([x as f64 * self.frequency, y as f64 * self.frequency]);
        let t = ((n + 1.0) * 0.5).clamp(0.0, 0.999_999);
        (t * self.tile_count as f64) as u32
    }
}

impl Oracle for NoiseOracle {
    fn generate(&self, description: &RegionDescription) -> OracleResult {
        let perlin = Perlin::new(self.seed.wrapping_add(description.level as u32));
        let (width, height) = description.expected_dimensions();
        let mut matrix = TileMatrix::new(width, height);
        for (x, y) in description.bounds.cells() {
            let col = (x - description.bounds.x0) as usize;
            let row = (y - description.bounds.y0) as usize;
            matrix.set(col, row, Some(self.tile(&perlin, x, y)));
        }
        OracleResult::Ok(matrix)
    }
}
