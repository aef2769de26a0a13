//! Tile world regeneration library
//!
//! Edits mark chunks dirty; a debounced scheduler orders the dirty chunks by
//! their dependencies and regenerates them over several time-budgeted passes.
//! User selections are regenerated one at a time in priority order, with
//! higher Z-levels protected from lower ones.

pub mod chunk;
pub mod clock;
pub mod config;
pub mod dirty;
pub mod error;
pub mod executor;
pub mod export;
pub mod geometry;
pub mod graph;
pub mod isolation;
pub mod oracle;
pub mod priority;
pub mod queue;
pub mod scheduler;
pub mod selection;
pub mod tiles;
pub mod trigger;

pub use chunk::ChunkKey;
pub use config::SchedulerConfig;
pub use error::{ConfigError, RegenError};
pub use geometry::{Region, RegionId, Selection, TileRect};
pub use oracle::{Oracle, OracleResult, RegionDescription};
pub use scheduler::{regen_with_oracle, RegenScheduler, TickOutcome};
pub use selection::{SelectionOutcome, SelectionProcessor};
pub use tiles::{TileIndex, TileLayer, TileMatrix, TileStorage};
