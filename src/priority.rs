//! Priority scores for selection-driven regeneration
//!
//! score = level_weight * normalized_level + dependency_weight * (1 - pressure)
//!
//! where normalized_level = max(1, max - min) / (z - min) and pressure is the
//! fraction of the region's dependencies already satisfied. Lower scores are
//! serviced first.
//!
//! The formula is undefined at z == min. A region on the minimum level gets a
//! normalized level of 0, the best possible, so the base level is always
//! serviced ahead of anything stacked on it. Levels below the range (the range
//! was computed before the region was moved) are treated the same way.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::geometry::RegionId;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityWeights {
    pub level: f64,
    pub dependency: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            level: 1.0,
            dependency: 1.0,
        }
    }
}

/// Span of Z-levels present in the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRange {
    pub min: i32,
    pub max: i32,
}

impl LevelRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Range covering all given levels; `None` when there are none.
    pub fn from_levels<I: IntoIterator<Item = i32>>(levels: I) -> Option<Self> {
        levels.into_iter().fold(None, |range, z| match range {
            None => Some(Self::new(z, z)),
            Some(r) => Some(Self::new(r.min.min(z), r.max.max(z))),
        })
    }

    pub fn span(&self) -> i32 {
        self.max - self.min
    }

    /// max(1, span) / (z - min), or 0 at and below the minimum level.
    pub fn normalized(&self, z: i32) -> f64 {
        if z <= self.min {
            return 0.0;
        }
        self.span().max(1) as f64 / (z - self.min) as f64
    }
}

/// Priority score for a region on level `z`. Always finite.
pub fn compute_priority(z: i32, range: LevelRange, pressure: f64, weights: PriorityWeights) -> f64 {
    let pressure = if pressure.is_finite() {
        pressure.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let score = weights.level * range.normalized(z) + weights.dependency * (1.0 - pressure);
    if score.is_finite() {
        score
    } else {
        f64::MAX
    }
}

/// Score a region using a pressure map; regions missing from the map have
/// pressure 0.
pub fn priority_for(
    region: RegionId,
    z: i32,
    range: LevelRange,
    pressure: &HashMap<RegionId, f64>,
    weights: PriorityWeights,
) -> f64 {
    let p = pressure.get(&region).copied().unwrap_or(0.0);
    compute_priority(z, range, p, weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_level_is_finite_and_best() {
        let range = LevelRange::new(1, 3);
        let w = PriorityWeights::default();
        let at_min = compute_priority(1, range, 0.0, w);
        let at_max = compute_priority(3, range, 0.0, w);
        assert!(at_min.is_finite());
        assert_eq!(at_min, 1.0);
        assert_eq!(at_max, 2.0);
        assert!(at_min < at_max);
    }

    #[test]
    fn test_single_level_range() {
        let range = LevelRange::new(4, 4);
        let score = compute_priority(4, range, 0.5, PriorityWeights::default());
        assert_eq!(score, 0.5);
    }

    #[test]
    fn test_pressure_lowers_score() {
        let range = LevelRange::new(0, 4);
        let w = PriorityWeights::default();
        let blocked = compute_priority(2, range, 0.0, w);
        let ready = compute_priority(2, range, 1.0, w);
        assert_eq!(blocked - ready, 1.0);
        // Out-of-range and NaN pressure are clamped
        assert_eq!(compute_priority(2, range, 7.0, w), ready);
        assert_eq!(compute_priority(2, range, f64::NAN, w), blocked);
    }

    #[test]
    fn test_range_from_levels() {
        assert_eq!(LevelRange::from_levels([3, -1, 2]), Some(LevelRange::new(-1, 3)));
        assert_eq!(LevelRange::from_levels(Vec::new()), None);
    }

    #[test]
    fn test_missing_pressure_defaults_to_zero() {
        let range = LevelRange::new(0, 2);
        let mut pressure = HashMap::new();
        pressure.insert(RegionId(1), 1.0);
        let w = PriorityWeights { level: 0.0, dependency: 1.0 };
        assert_eq!(priority_for(RegionId(1), 1, range, &pressure, w), 0.0);
        assert_eq!(priority_for(RegionId(2), 1, range, &pressure, w), 1.0);
    }
}
