//! Selection-driven regeneration
//!
//! Users finalize selections one at a time; each becomes a request scored by
//! level and dependency pressure. Requests are processed one by one, and each
//! write is masked by the higher-level regions already regenerated in the
//! current batch. A failed oracle call writes nothing.

use std::collections::{HashMap, HashSet};

use log::{info, warn};

use crate::error::RegenError;
use crate::geometry::{RegionId, Selection};
use crate::isolation::{write_masked, IsolationMask, WriteReport};
use crate::oracle::{Oracle, RegionDescription};
use crate::priority::{priority_for, LevelRange, PriorityWeights};
use crate::queue::{RegenerationRequest, SelectionQueue, SnapshotInfo};
use crate::tiles::{capture, TileStorage};

#[derive(Clone, Debug, PartialEq)]
pub enum SelectionOutcome {
    Applied { region: RegionId, report: WriteReport },
    Failed { region: RegionId, error: RegenError },
}

impl SelectionOutcome {
    pub fn region(&self) -> RegionId {
        match self {
            SelectionOutcome::Applied { region, .. } | SelectionOutcome::Failed { region, .. } => *region,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, SelectionOutcome::Applied { .. })
    }
}

#[derive(Debug, Default)]
pub struct SelectionProcessor {
    queue: SelectionQueue,
    weights: PriorityWeights,
    mask: IsolationMask,
    processed: Vec<RegionId>,
}

impl SelectionProcessor {
    pub fn new(weights: PriorityWeights) -> Self {
        Self {
            weights,
            ..Self::default()
        }
    }

    pub fn queue(&self) -> &SelectionQueue {
        &self.queue
    }

    pub fn mask(&self) -> &IsolationMask {
        &self.mask
    }

    /// Regions processed (successfully or not) in the current batch.
    pub fn processed(&self) -> &[RegionId] {
        &self.processed
    }

    /// Score and queue a selection. Re-requesting a queued region overrides
    /// it. Returns the score.
    pub fn enqueue(
        &mut self,
        selection: Selection,
        info: SnapshotInfo,
        range: LevelRange,
        pressure: &HashMap<RegionId, f64>,
    ) -> f64 {
        let priority = priority_for(selection.id, selection.z_level, range, pressure, self.weights);
        self.queue.push(RegenerationRequest::new(selection, priority, info));
        priority
    }

    /// Queue a selection, capturing its current tiles as the snapshot.
    pub fn enqueue_from_storage<S: TileStorage + ?Sized>(
        &mut self,
        storage: &S,
        selection: Selection,
        dependency_count: usize,
        range: LevelRange,
        pressure: &HashMap<RegionId, f64>,
    ) -> f64 {
        let info = SnapshotInfo {
            dependency_count,
            level: selection.z_level,
            prior: Some(capture(storage, &selection.bounds)),
        };
        self.enqueue(selection, info, range, pressure)
    }

    /// Pop and regenerate the next request.
    pub fn process_next<S, O>(&mut self, storage: &mut S, oracle: &O) -> Option<SelectionOutcome>
    where
        S: TileStorage + ?Sized,
        O: Oracle + ?Sized,
    {
        let request = self.queue.pop()?;
        let selection = request.region;
        self.processed.push(selection.id);

        let description = RegionDescription {
            bounds: selection.bounds,
            level: selection.z_level,
            prior: capture(storage, &selection.bounds),
            prompt: selection.prompt.clone(),
        };

        let outcome = match description.accept(oracle.generate(&description)) {
            Ok(matrix) => {
                let report = write_masked(storage, &selection.bounds, &matrix, &self.mask, selection.z_level);
                self.mask.record(selection.bounds, selection.z_level);
                info!(
                    "selection {:?} z{}: {} written, {} protected",
                    selection.id, selection.z_level, report.written, report.skipped
                );
                SelectionOutcome::Applied {
                    region: selection.id,
                    report,
                }
            }
            Err(error) => {
                warn!("selection {:?} failed, keeping prior tiles: {}", selection.id, error);
                SelectionOutcome::Failed {
                    region: selection.id,
                    error,
                }
            }
        };
        Some(outcome)
    }

    /// Process every queued request in priority order.
    pub fn process_all<S, O>(&mut self, storage: &mut S, oracle: &O) -> Vec<SelectionOutcome>
    where
        S: TileStorage + ?Sized,
        O: Oracle + ?Sized,
    {
        std::iter::from_fn(|| self.process_next(storage, oracle)).collect()
    }

    /// End the batch: the isolation mask and processed list are discarded.
    pub fn finish_batch(&mut self) {
        self.mask = IsolationMask::new();
        self.processed.clear();
    }
}

/// Lower-level selections overlapping `selection`; it should be
/// regenerated on top of them.
pub fn dependencies_of<'a>(selection: &'a Selection, all: &'a [Selection]) -> impl Iterator<Item = &'a Selection> + 'a {
    all.iter().filter(move |other| {
        other.id != selection.id
            && other.z_level < selection.z_level
            && other.bounds.intersects(&selection.bounds)
    })
}

/// Fraction of each selection's dependencies found in `done`. A selection
/// with no dependencies is fully satisfied.
pub fn dependency_pressure(all: &[Selection], done: &HashSet<RegionId>) -> HashMap<RegionId, f64> {
    all.iter()
        .map(|selection| {
            let (total, satisfied) = dependencies_of(selection, all)
                .fold((0usize, 0usize), |(t, s), dep| (t + 1, s + done.contains(&dep.id) as usize));
            let pressure = if total == 0 {
                1.0
            } else {
                satisfied as f64 / total as f64
            };
            (selection.id, pressure)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::TileRect;
    use crate::oracle::OracleResult;
    use crate::tiles::{TileLayer, TileMatrix};

    /// Fills every region with its z-level as the tile index.
    fn level_oracle(d: &RegionDescription) -> OracleResult {
        let (w, h) = d.expected_dimensions();
        OracleResult::Ok(TileMatrix::filled(w, h, d.level as u32))
    }

    #[test]
    fn test_lower_level_popped_first() {
        let mut processor = SelectionProcessor::new(PriorityWeights::default());
        let range = LevelRange::new(1, 3);
        let none = HashMap::new();
        processor.enqueue(Selection::new(1, TileRect::new((0, 0), (1, 1)), 3), SnapshotInfo::default(), range, &none);
        processor.enqueue(Selection::new(2, TileRect::new((0, 0), (1, 1)), 1), SnapshotInfo::default(), range, &none);

        let mut layer = TileLayer::new(4, 4);
        let order: Vec<RegionId> = processor
            .process_all(&mut layer, &level_oracle)
            .iter()
            .map(|o| o.region())
            .collect();
        assert_eq!(order, vec![RegionId(2), RegionId(1)]);
    }

    #[test]
    fn test_higher_region_is_protected() {
        let mut processor = SelectionProcessor::new(PriorityWeights::default());
        let range = LevelRange::new(1, 3);
        let none = HashMap::new();
        let mut layer = TileLayer::new(6, 6);

        let r1 = Selection::new(1, TileRect::new((1, 1), (2, 2)), 3);
        let r2 = Selection::new(2, TileRect::new((2, 1), (3, 2)), 2);
        processor.enqueue(r2, SnapshotInfo::default(), range, &none);
        processor.enqueue(r1, SnapshotInfo::default(), range, &none);

        let oracle = |d: &RegionDescription| {
            let (w, h) = d.expected_dimensions();
            let tile = if d.level == 3 { 9 } else { 1 };
            OracleResult::Ok(TileMatrix::filled(w, h, tile))
        };
        let outcomes = processor.process_all(&mut layer, &oracle);
        assert_eq!(outcomes[0].region(), RegionId(1));
        assert_eq!(
            outcomes[1],
            SelectionOutcome::Applied {
                region: RegionId(2),
                report: WriteReport { written: 2, skipped: 2 }
            }
        );

        for (x, y) in [(1, 1), (1, 2), (2, 1), (2, 2)] {
            assert_eq!(layer.tile_at(x, y), Some(9), "({}, {})", x, y);
        }
        assert_eq!(layer.tile_at(3, 1), Some(1));
        assert_eq!(layer.tile_at(3, 2), Some(1));
    }

    #[test]
    fn test_failed_oracle_writes_nothing_and_masks_nothing() {
        let mut processor = SelectionProcessor::new(PriorityWeights::default());
        let mut layer = TileLayer::new_with(4, 4, 5);
        let sel = Selection::new(1, TileRect::new((0, 0), (3, 3)), 2);
        processor.enqueue(sel, SnapshotInfo::default(), LevelRange::new(0, 2), &HashMap::new());

        let oracle = |d: &RegionDescription| OracleResult::DimensionMismatch {
            expected: d.expected_dimensions(),
            actual: (1, 1),
        };
        let outcome = processor.process_next(&mut layer, &oracle);
        assert!(matches!(
            outcome,
            Some(SelectionOutcome::Failed {
                error: RegenError::DimensionMismatch { .. },
                ..
            })
        ));
        assert!(layer.iter().all(|(_, _, t)| t == Some(5)));
        assert!(processor.mask().is_empty());
    }

    #[test]
    fn test_undersized_grid_fails_without_partial_write() {
        let mut processor = SelectionProcessor::new(PriorityWeights::default());
        let mut layer = TileLayer::new_with(4, 4, 2);
        let sel = Selection::new(1, TileRect::new((0, 0), (3, 3)), 1);
        processor.enqueue(sel, SnapshotInfo::default(), LevelRange::new(0, 1), &HashMap::new());

        let oracle = |_: &RegionDescription| OracleResult::Ok(TileMatrix::filled(1, 1, 7));
        assert_eq!(
            processor.process_next(&mut layer, &oracle),
            Some(SelectionOutcome::Failed {
                region: RegionId(1),
                error: RegenError::DimensionMismatch {
                    expected: (4, 4),
                    actual: (1, 1)
                }
            })
        );
        assert_eq!(layer.tile_at(0, 0), Some(2));
        assert!(processor.mask().is_empty());
    }

    #[test]
    fn test_rerequest_overrides_and_batch_reset() {
        let mut processor = SelectionProcessor::new(PriorityWeights::default());
        let range = LevelRange::new(0, 4);
        let mut pressure = HashMap::new();
        let sel = Selection::new(7, TileRect::new((0, 0), (0, 0)), 2);

        let first = processor.enqueue(sel.clone(), SnapshotInfo::default(), range, &pressure);
        pressure.insert(RegionId(7), 1.0);
        let second = processor.enqueue(sel, SnapshotInfo::default(), range, &pressure);
        assert!(second < first);
        assert_eq!(processor.queue().len(), 1);
        assert_eq!(processor.queue().peek().map(|r| r.priority), Some(second));

        let mut layer = TileLayer::new(2, 2);
        processor.process_all(&mut layer, &level_oracle);
        assert_eq!(processor.mask().len(), 1);
        assert_eq!(processor.processed(), &[RegionId(7)]);

        processor.finish_batch();
        assert!(processor.mask().is_empty());
        assert!(processor.processed().is_empty());
    }

    #[test]
    fn test_enqueue_from_storage_snapshots_prior() {
        let mut processor = SelectionProcessor::new(PriorityWeights::default());
        let layer = TileLayer::new_with(3, 3, 4);
        let sel = Selection::new(1, TileRect::new((0, 0), (1, 1)), 0);
        processor.enqueue_from_storage(&layer, sel, 2, LevelRange::new(0, 1), &HashMap::new());

        let request = processor.queue().peek().unwrap();
        assert_eq!(request.info.dependency_count, 2);
        assert_eq!(request.info.prior, Some(TileMatrix::filled(2, 2, 4)));
    }

    #[test]
    fn test_pressure_rises_as_dependencies_finish() {
        let base = Selection::new(1, TileRect::new((0, 0), (3, 3)), 0);
        let wall = Selection::new(2, TileRect::new((2, 0), (5, 1)), 0);
        let roof = Selection::new(3, TileRect::new((1, 1), (4, 2)), 2);
        let far = Selection::new(4, TileRect::new((10, 10), (11, 11)), 1);
        let all = vec![base, wall, roof, far];

        let deps: Vec<RegionId> = dependencies_of(&all[2], &all).map(|s| s.id).collect();
        assert_eq!(deps, vec![RegionId(1), RegionId(2)]);

        let mut done = HashSet::new();
        let pressure = dependency_pressure(&all, &done);
        assert_eq!(pressure[&RegionId(3)], 0.0);
        assert_eq!(pressure[&RegionId(1)], 1.0);
        assert_eq!(pressure[&RegionId(4)], 1.0);

        done.insert(RegionId(1));
        assert_eq!(dependency_pressure(&all, &done)[&RegionId(3)], 0.5);
        done.insert(RegionId(2));
        assert_eq!(dependency_pressure(&all, &done)[&RegionId(3)], 1.0);
    }
}
