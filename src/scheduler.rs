//! Chunk-driven regeneration scheduler
//!
//! Edits mark chunks dirty. A debounced trigger (or an explicit request)
//! arms a single pending tick; on that tick the dirty set is drained, the
//! batch is ordered by its dependencies and a multi-pass run starts. The host
//! calls `tick` once per frame, which also advances a run that yielded.
//!
//! Only one run exists at a time. Marks arriving while a run is in progress
//! go into the next batch, and a trigger that fires meanwhile waits until the
//! current run has finished.

use std::time::Duration;

use log::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::config::SchedulerConfig;
use crate::error::RegenError;
use crate::dirty::DirtyTracker;
use crate::executor::{ChunkJob, MultiPassRun, RunReport, RunStatus};
use crate::geometry::TileRect;
use crate::graph::{processing_order, DependencyProvider};
use crate::isolation::write_masked;
use crate::oracle::{Oracle, RegionDescription};
use crate::tiles::{capture, TileStorage};
use crate::trigger::DebouncedTrigger;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to do this tick.
    Idle,
    /// A run is in progress and will continue next tick.
    Yielded,
    /// A run finished during this tick.
    Finished(RunReport),
}

pub struct RegenScheduler<C: Clock = SystemClock> {
    config: SchedulerConfig,
    clock: C,
    dirty: DirtyTracker,
    trigger: DebouncedTrigger,
    provider: Option<Box<dyn DependencyProvider>>,
    active: Option<MultiPassRun>,
    cycles_started: usize,
}

impl RegenScheduler<SystemClock> {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> RegenScheduler<C> {
    pub fn with_clock(config: SchedulerConfig, clock: C) -> Self {
        let config = config.sanitized();
        Self {
            dirty: DirtyTracker::new(config.chunk_size),
            trigger: DebouncedTrigger::new(config.quiet_period()),
            provider: None,
            active: None,
            cycles_started: 0,
            config,
            clock,
        }
    }

    /// Install the world's dependency provider. Without one, chunks are
    /// regenerated in dirty-set order.
    pub fn set_dependency_provider<P: DependencyProvider + 'static>(&mut self, provider: P) {
        self.provider = Some(Box::new(provider));
    }

    pub fn clear_dependency_provider(&mut self) {
        self.provider = None;
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Mark the chunks under `rect` dirty. Never runs regeneration itself.
    pub fn mark_dirty(&mut self, rect: &TileRect, level: i32) -> usize {
        self.dirty.mark(rect, level)
    }

    /// Mark dirty and (re)start the quiet timer. `quiet` overrides the
    /// configured quiet period.
    pub fn debounced_mark_dirty(&mut self, rect: &TileRect, level: i32, quiet: Option<Duration>) -> usize {
        let added = self.dirty.mark(rect, level);
        let now = self.clock.now();
        match quiet {
            Some(q) => self.trigger.poke_with(now, q),
            None => self.trigger.poke(now),
        }
        added
    }

    /// Ask for a cycle on the next tick. Idempotent while one is pending.
    pub fn schedule_regen_now(&mut self) {
        if self.trigger.request_tick() {
            debug!("scheduler: tick requested");
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Whether a timer or tick is waiting to start a cycle.
    pub fn is_pending(&self) -> bool {
        self.trigger.is_armed()
    }

    /// Dirty chunks waiting for the next cycle.
    pub fn pending_dirty(&self) -> usize {
        self.dirty.len()
    }

    pub fn cycles_started(&self) -> usize {
        self.cycles_started
    }

    /// Advance the scheduler by one host tick.
    pub fn tick<F>(&mut self, regen: &mut F) -> TickOutcome
    where
        F: FnMut(&ChunkJob<'_>) -> Result<(), RegenError>,
    {
        if let Some(run) = self.active.as_mut() {
            return match run.step(&self.clock, regen) {
                RunStatus::Yielded { .. } => TickOutcome::Yielded,
                RunStatus::Complete(report) => {
                    self.active = None;
                    TickOutcome::Finished(report)
                }
            };
        }

        if !self.trigger.poll(self.clock.now()) {
            return TickOutcome::Idle;
        }

        let batch = self.dirty.take();
        if batch.is_empty() {
            debug!("scheduler: tick fired with nothing dirty");
            return TickOutcome::Idle;
        }

        let order = processing_order(&batch, self.provider.as_deref());
        self.cycles_started += 1;
        info!(
            "scheduler: cycle {} over {} chunks ({} components)",
            self.cycles_started,
            order.len(),
            order.components().len()
        );

        let mut run = MultiPassRun::new(order, self.config.chunk_size, self.config.pass_budget())
            .with_verify_tail(self.config.verify_tail);
        match run.step(&self.clock, regen) {
            RunStatus::Yielded { .. } => {
                self.active = Some(run);
                TickOutcome::Yielded
            }
            RunStatus::Complete(report) => TickOutcome::Finished(report),
        }
    }

    /// Request a cycle and tick until everything dirty has been processed.
    pub fn flush<F>(&mut self, regen: &mut F) -> Vec<RunReport>
    where
        F: FnMut(&ChunkJob<'_>) -> Result<(), RegenError>,
    {
        let mut reports = Vec::new();
        loop {
            if !self.is_running() && !self.dirty.is_empty() {
                self.schedule_regen_now();
            }
            match self.tick(regen) {
                TickOutcome::Finished(report) => reports.push(report),
                TickOutcome::Yielded => {}
                TickOutcome::Idle => {
                    if !self.is_running() && self.dirty.is_empty() {
                        break;
                    }
                }
            }
        }
        reports
    }
}

/// Regenerate one chunk through the oracle and write the result, respecting
/// the run's isolation mask. On any oracle failure nothing is written.
pub fn regen_with_oracle<S, O>(storage: &mut S, oracle: &O, job: &ChunkJob<'_>) -> Result<(), RegenError>
where
    S: TileStorage + ?Sized,
    O: Oracle + ?Sized,
{
    let description = RegionDescription {
        bounds: job.bounds,
        level: job.key.level,
        prior: capture(storage, &job.bounds),
        prompt: String::new(),
    };
    let matrix = description.accept(oracle.generate(&description))?;
    write_masked(storage, &job.bounds, &matrix, job.mask, job.key.level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkKey;
    use crate::clock::ManualClock;
    use crate::executor::Pass;
    use crate::graph::LeftNeighbourDependencies;
    use crate::oracle::OracleResult;
    use crate::tiles::{TileLayer, TileMatrix};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::collections::{BTreeSet, HashMap, HashSet};

    fn scheduler(clock: &ManualClock) -> RegenScheduler<ManualClock> {
        let config = SchedulerConfig {
            chunk_size: 4,
            quiet_period_ms: 100,
            pass_budget_ms: 50,
            ..SchedulerConfig::default()
        };
        RegenScheduler::with_clock(config, clock.clone())
    }

    #[test]
    fn test_mark_dirty_does_not_regenerate() {
        let clock = ManualClock::new();
        let mut sched = scheduler(&clock);
        let calls = RefCell::new(0);
        let mut regen = |_: &ChunkJob<'_>| {
            *calls.borrow_mut() += 1;
            Ok(())
        };

        sched.mark_dirty(&TileRect::new((0, 0), (7, 0)), 0);
        assert_eq!(sched.pending_dirty(), 2);
        assert_eq!(*calls.borrow(), 0);

        // Nothing requested a cycle yet
        clock.advance_ms(1000);
        assert_eq!(sched.tick(&mut regen), TickOutcome::Idle);
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn test_debounced_marks_coalesce_into_one_cycle() {
        let clock = ManualClock::new();
        let mut sched = scheduler(&clock);
        let forward = RefCell::new(BTreeSet::new());
        let mut regen = |job: &ChunkJob<'_>| {
            if job.pass == Pass::Forward {
                forward.borrow_mut().insert(job.key);
            }
            Ok(())
        };

        for i in 0..5 {
            sched.debounced_mark_dirty(&TileRect::new((i * 4, 0), (i * 4, 0)), 1, None);
            clock.advance_ms(60);
            assert_eq!(sched.tick(&mut regen), TickOutcome::Idle);
        }
        assert_eq!(sched.cycles_started(), 0);

        // Quiet period elapses: the timer fires, the cycle runs on the next tick
        clock.advance_ms(100);
        assert_eq!(sched.tick(&mut regen), TickOutcome::Idle);
        assert!(matches!(sched.tick(&mut regen), TickOutcome::Finished(_)));
        assert_eq!(sched.cycles_started(), 1);

        let expected: BTreeSet<ChunkKey> = (0..5).map(|i| ChunkKey::new(i, 0, 1)).collect();
        assert_eq!(*forward.borrow(), expected);

        // No second cycle without new marks
        clock.advance_ms(1000);
        assert_eq!(sched.tick(&mut regen), TickOutcome::Idle);
        assert_eq!(sched.cycles_started(), 1);
    }

    #[test]
    fn test_schedule_regen_now_is_idempotent() {
        let clock = ManualClock::new();
        let mut sched = scheduler(&clock);
        let mut regen = |_: &ChunkJob<'_>| Ok(());
        sched.mark_dirty(&TileRect::new((0, 0), (0, 0)), 0);
        sched.schedule_regen_now();
        sched.schedule_regen_now();
        assert!(matches!(sched.tick(&mut regen), TickOutcome::Finished(_)));
        assert_eq!(sched.tick(&mut regen), TickOutcome::Idle);
        assert_eq!(sched.cycles_started(), 1);
    }

    #[test]
    fn test_marks_during_run_go_to_next_cycle() {
        let clock = ManualClock::new();
        let mut sched = scheduler(&clock);
        let step_clock = clock.clone();
        let mut regen = |_: &ChunkJob<'_>| {
            step_clock.advance_ms(30);
            Ok(())
        };

        sched.mark_dirty(&TileRect::new((0, 0), (7, 0)), 0);
        sched.schedule_regen_now();
        // Forward pass: 2 chunks x 30ms > 50ms budget
        assert_eq!(sched.tick(&mut regen), TickOutcome::Yielded);
        assert!(sched.is_running());

        sched.mark_dirty(&TileRect::new((20, 0), (20, 0)), 0);
        sched.schedule_regen_now();
        assert_eq!(sched.pending_dirty(), 1);

        let mut finished = 0;
        for _ in 0..3 {
            if let TickOutcome::Finished(report) = sched.tick(&mut regen) {
                assert_eq!(report.chunks, 2);
                finished += 1;
            }
        }
        assert_eq!(finished, 1);
        assert_eq!(sched.cycles_started(), 1);

        // The pending tick now starts the second cycle with the late mark;
        // one chunk per pass stays inside the budget so it finishes at once
        let TickOutcome::Finished(report) = sched.tick(&mut regen) else {
            panic!("second cycle should run to completion");
        };
        assert_eq!(report.chunks, 1);
        assert_eq!(sched.cycles_started(), 2);
        assert_eq!(sched.pending_dirty(), 0);
    }

    #[test]
    fn test_flush_processes_everything() {
        let clock = ManualClock::new();
        let mut sched = scheduler(&clock);
        sched.set_dependency_provider(LeftNeighbourDependencies);
        let forward = RefCell::new(Vec::new());
        let mut regen = |job: &ChunkJob<'_>| {
            if job.pass == Pass::Forward {
                forward.borrow_mut().push(job.key.cx);
            }
            Ok(())
        };

        sched.mark_dirty(&TileRect::new((0, 0), (11, 0)), 0);
        let reports = sched.flush(&mut regen);
        assert_eq!(reports.len(), 1);
        assert_eq!(forward.into_inner(), vec![0, 1, 2]);
        assert!(!sched.is_pending());
    }

    #[test]
    fn test_oracle_regen_respects_isolation_across_levels() {
        let clock = ManualClock::new();
        let mut sched = scheduler(&clock);
        let mut layer = TileLayer::new(8, 8);

        // Level 3 returns 9s, level 1 returns 1s
        let oracle = |d: &RegionDescription| {
            let (w, h) = d.expected_dimensions();
            let tile = if d.level >= 3 { 9 } else { 1 };
            OracleResult::Ok(TileMatrix::filled(w, h, tile))
        };

        sched.mark_dirty(&TileRect::new((0, 0), (3, 3)), 3);
        sched.mark_dirty(&TileRect::new((0, 0), (7, 3)), 1);
        let reports = sched.flush(&mut |job: &ChunkJob<'_>| regen_with_oracle(&mut layer, &oracle, job));
        assert_eq!(reports.len(), 1);

        // Batch drains level 1 first, but by the reverse pass level 3 owns its chunk
        assert_eq!(layer.tile_at(0, 0), Some(9));
        assert_eq!(layer.tile_at(3, 3), Some(9));
        assert_eq!(layer.tile_at(4, 0), Some(1));
    }

    #[test]
    fn test_oracle_failure_leaves_tiles_untouched() {
        let clock = ManualClock::new();
        let mut sched = scheduler(&clock);
        let mut layer = TileLayer::new_with(4, 4, 2);
        let oracle = |_: &RegionDescription| OracleResult::ParseError("not json".into());

        sched.mark_dirty(&TileRect::new((0, 0), (3, 3)), 0);
        let reports = sched.flush(&mut |job: &ChunkJob<'_>| regen_with_oracle(&mut layer, &oracle, job));
        assert_eq!(reports[0].failures(), 4);
        assert!(layer.iter().all(|(_, _, t)| t == Some(2)));
    }

    #[test]
    fn test_wrong_sized_oracle_grid_is_rejected() {
        let clock = ManualClock::new();
        let mut sched = scheduler(&clock);
        let mut layer = TileLayer::new_with(8, 4, 2);

        // Two columns too wide for the 4x4 chunk
        let oracle = |d: &RegionDescription| {
            let (w, h) = d.expected_dimensions();
            OracleResult::Ok(TileMatrix::filled(w + 2, h, 7))
        };

        sched.mark_dirty(&TileRect::new((0, 0), (3, 3)), 0);
        let reports = sched.flush(&mut |job: &ChunkJob<'_>| regen_with_oracle(&mut layer, &oracle, job));
        assert_eq!(reports[0].failures(), 4);
        assert_eq!(layer.tile_at(0, 0), Some(2));
        assert_eq!(layer.tile_at(4, 0), Some(2));
        assert_eq!(layer.tile_at(5, 0), Some(2));

        let job_mask = crate::isolation::IsolationMask::new();
        let job = ChunkJob {
            key: ChunkKey::new(0, 0, 0),
            pass: Pass::Forward,
            bounds: TileRect::new((0, 0), (3, 3)),
            mask: &job_mask,
        };
        assert_eq!(
            regen_with_oracle(&mut layer, &oracle, &job),
            Err(RegenError::DimensionMismatch {
                expected: (4, 4),
                actual: (6, 4)
            })
        );
    }

    #[test]
    fn test_provider_called_once_per_cycle() {
        let clock = ManualClock::new();
        let mut sched = scheduler(&clock);
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (provider_calls, provider_seen) = (calls.clone(), seen.clone());
        sched.set_dependency_provider(move |keys: &[ChunkKey]| {
            provider_calls.set(provider_calls.get() + 1);
            provider_seen.borrow_mut().push(keys.len());
            // Right neighbour inside the batch, plus a chunk far outside it
            let mut deps: HashMap<ChunkKey, HashSet<ChunkKey>> = HashMap::new();
            for k in keys {
                let entry = deps.entry(*k).or_default();
                entry.insert(ChunkKey::new(k.cx + 1, k.cy, k.level));
                entry.insert(ChunkKey::new(k.cx + 100, k.cy, k.level));
            }
            deps
        });

        let forward = RefCell::new(Vec::new());
        let mut regen = |job: &ChunkJob<'_>| {
            if job.pass == Pass::Forward {
                forward.borrow_mut().push(job.key.cx);
            }
            Ok(())
        };

        sched.mark_dirty(&TileRect::new((0, 0), (11, 0)), 0);
        sched.schedule_regen_now();
        assert!(matches!(sched.tick(&mut regen), TickOutcome::Finished(_)));
        assert_eq!(calls.get(), 1);
        assert_eq!(*seen.borrow(), vec![3]);
        // Dependencies come first: each chunk waits for its right neighbour
        assert_eq!(*forward.borrow(), vec![2, 1, 0]);

        // Idle ticks never consult the provider
        assert_eq!(sched.tick(&mut regen), TickOutcome::Idle);
        assert_eq!(calls.get(), 1);

        sched.mark_dirty(&TileRect::new((0, 0), (0, 0)), 0);
        sched.schedule_regen_now();
        assert!(matches!(sched.tick(&mut regen), TickOutcome::Finished(_)));
        assert_eq!(calls.get(), 2);
    }
}
