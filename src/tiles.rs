//! Tile storage and tile matrices
//!
//! The map layer owns the real tiles; the scheduler only needs to read what is
//! there (as context for the oracle) and write accepted results back.

use serde::{Deserialize, Serialize};

use crate::geometry::TileRect;

/// Index into the tileset.
pub type TileIndex = u32;

/// Read/write access to the world's tiles.
pub trait TileStorage {
    fn tile_at(&self, x: i32, y: i32) -> Option<TileIndex>;
    fn put_tile_at(&mut self, index: TileIndex, x: i32, y: i32);
    fn remove_tile_at(&mut self, x: i32, y: i32);
}

/// Rectangular grid of optional tiles, row-major. `None` means "no tile".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileMatrix {
    width: usize,
    height: usize,
    cells: Vec<Option<TileIndex>>,
}

impl TileMatrix {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![None; width * height],
        }
    }

    pub fn filled(width: usize, height: usize, tile: TileIndex) -> Self {
        Self {
            width,
            height,
            cells: vec![Some(tile); width * height],
        }
    }

    /// Build from rows. Returns `None` if the rows are ragged.
    pub fn from_rows(rows: Vec<Vec<Option<TileIndex>>>) -> Option<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.len());
        if rows.iter().any(|r| r.len() != width) {
            return None;
        }
        Some(Self {
            width,
            height,
            cells: rows.into_iter().flatten().collect(),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// (width, height)
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn get(&self, col: usize, row: usize) -> Option<TileIndex> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.cells[row * self.width + col]
    }

    pub fn set(&mut self, col: usize, row: usize, tile: Option<TileIndex>) {
        if col < self.width && row < self.height {
            self.cells[row * self.width + col] = tile;
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Option<TileIndex>]> {
        self.cells.chunks(self.width.max(1)).take(self.height)
    }
}

/// Snapshot the tiles under `rect`.
pub fn capture<S: TileStorage + ?Sized>(storage: &S, rect: &TileRect) -> TileMatrix {
    let mut matrix = TileMatrix::new(rect.width() as usize, rect.height() as usize);
    for (x, y) in rect.cells() {
        matrix.set(
            (x - rect.x0) as usize,
            (y - rect.y0) as usize,
            storage.tile_at(x, y),
        );
    }
    matrix
}

/// Bounded in-memory tile layer with its origin at (0, 0).
#[derive(Clone, Debug)]
pub struct TileLayer {
    pub width: usize,
    pub height: usize,
    data: Vec<Option<TileIndex>>,
}

impl TileLayer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![None; width * height],
        }
    }

    pub fn new_with(width: usize, height: usize, tile: TileIndex) -> Self {
        Self {
            width,
            height,
            data: vec![Some(tile); width * height],
        }
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(y as usize * self.width + x as usize)
    }

    pub fn bounds(&self) -> TileRect {
        TileRect::from_origin(0, 0, self.width as u32, self.height as u32)
    }

    /// Number of cells holding a tile.
    pub fn occupied(&self) -> usize {
        self.data.iter().filter(|t| t.is_some()).count()
    }

    /// Iterate over all cells with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, Option<TileIndex>)> + '_ {
        self.data.iter().enumerate().map(move |(idx, &tile)| {
            (idx % self.width, idx / self.width, tile)
        })
    }
}

impl TileStorage for TileLayer {
    fn tile_at(&self, x: i32, y: i32) -> Option<TileIndex> {
        self.index(x, y).and_then(|i| self.data[i])
    }

    fn put_tile_at(&mut self, index: TileIndex, x: i32, y: i32) {
        if let Some(i) = self.index(x, y) {
            self.data[i] = Some(index);
        }
    }

    fn remove_tile_at(&mut self, x: i32, y: i32) {
        if let Some(i) = self.index(x, y) {
            self.data[i] = None;
        }
    }
}
