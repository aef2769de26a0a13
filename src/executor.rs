//! Multi-pass executor
//!
//! A single forward sweep cannot settle chunks whose dependencies are cyclic
//! or only roughly known, so each run makes four passes over the processing
//! order:
//!
//! 1. Forward: dependencies before dependents.
//! 2. Reverse: dependents get to influence what they depend on.
//! 3. Verify tail: the last few chunks again, in reverse.
//! 4. Stabilize: forward once more to propagate the adjustments.
//!
//! Each pass is timed. A pass that overruns the budget ends the current step
//! and the next pass waits for the host's next tick; passes that stay within
//! budget run back to back. Runs are never cancelled halfway.
//!
//! The regeneration callback is invoked serially, one chunk at a time. A
//! failing chunk is logged and skipped; the run carries on.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use log::{debug, info, warn};

use crate::chunk::ChunkKey;
use crate::clock::Clock;
use crate::error::RegenError;
use crate::geometry::TileRect;
use crate::graph::ProcessingOrder;
use crate::isolation::IsolationMask;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pass {
    Forward,
    Reverse,
    VerifyTail,
    Stabilize,
}

impl Pass {
    pub const ALL: [Pass; 4] = [Pass::Forward, Pass::Reverse, Pass::VerifyTail, Pass::Stabilize];

    /// Chunks this pass visits, in visiting order.
    pub fn visit(self, order: &[ChunkKey], verify_tail: usize) -> Vec<ChunkKey> {
        match self {
            Pass::Forward | Pass::Stabilize => order.to_vec(),
            Pass::Reverse => order.iter().rev().copied().collect(),
            Pass::VerifyTail => {
                let start = order.len().saturating_sub(verify_tail);
                order[start..].iter().rev().copied().collect()
            }
        }
    }
}

/// What the regeneration callback gets for one chunk.
pub struct ChunkJob<'a> {
    pub key: ChunkKey,
    pub pass: Pass,
    /// World tiles covered by the chunk.
    pub bounds: TileRect,
    /// Higher-level regions already regenerated in this run.
    pub mask: &'a IsolationMask,
}

impl ChunkJob<'_> {
    /// Whether this chunk may not write (x, y).
    pub fn blocks(&self, x: i32, y: i32) -> bool {
        self.mask.blocks(x, y, self.key.level)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassReport {
    pub pass: Pass,
    pub visited: usize,
    pub failed: usize,
    pub elapsed: Duration,
    pub over_budget: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    pub chunks: usize,
    pub passes: Vec<PassReport>,
    /// Steps (host ticks) the run was spread over.
    pub steps: usize,
}

impl RunReport {
    pub fn failures(&self) -> usize {
        self.passes.iter().map(|p| p.failed).sum()
    }

    pub fn visits(&self) -> usize {
        self.passes.iter().map(|p| p.visited).sum()
    }

    pub fn elapsed(&self) -> Duration {
        self.passes.iter().map(|p| p.elapsed).sum()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunStatus {
    /// A pass overran its budget; call `step` again on a later tick.
    Yielded { next_pass: Pass },
    Complete(RunReport),
}

/// One scheduling cycle's worth of passes over a fixed processing order.
#[derive(Debug)]
pub struct MultiPassRun {
    order: Vec<ChunkKey>,
    chunk_size: u32,
    budget: Duration,
    verify_tail: usize,
    next_pass: usize,
    mask: IsolationMask,
    recorded: HashSet<ChunkKey>,
    report: RunReport,
}

impl MultiPassRun {
    pub fn new(order: ProcessingOrder<ChunkKey>, chunk_size: u32, budget: Duration) -> Self {
        let order = order.into_keys();
        let report = RunReport {
            chunks: order.len(),
            ..RunReport::default()
        };
        Self {
            order,
            chunk_size: chunk_size.max(1),
            budget,
            verify_tail: 3,
            next_pass: 0,
            mask: IsolationMask::new(),
            recorded: HashSet::new(),
            report,
        }
    }

    pub fn with_verify_tail(mut self, verify_tail: usize) -> Self {
        self.verify_tail = verify_tail;
        self
    }

    pub fn order(&self) -> &[ChunkKey] {
        &self.order
    }

    pub fn is_complete(&self) -> bool {
        self.next_pass >= Pass::ALL.len()
    }

    pub fn next_pass(&self) -> Option<Pass> {
        Pass::ALL.get(self.next_pass).copied()
    }

    pub fn mask(&self) -> &IsolationMask {
        &self.mask
    }

    /// Run the next pass in full. `None` once all passes are done.
    pub fn run_pass<C, F>(&mut self, clock: &C, regen: &mut F) -> Option<PassReport>
    where
        C: Clock + ?Sized,
        F: FnMut(&ChunkJob<'_>) -> Result<(), RegenError>,
    {
        let pass = self.next_pass()?;
        let started = clock.now();
        let mut failed = 0;
        let keys = pass.visit(&self.order, self.verify_tail);

        for &key in &keys {
            let bounds = key.bounds(self.chunk_size);
            let result = {
                let job = ChunkJob {
                    key,
                    pass,
                    bounds,
                    mask: &self.mask,
                };
                regen(&job)
            };
            match result {
                Ok(()) => {
                    if self.recorded.insert(key) {
                        self.mask.record(bounds, key.level);
                    }
                }
                Err(e) => {
                    failed += 1;
                    warn!("regen {} failed during {:?}: {}", key, pass, e);
                }
            }
        }

        let elapsed = clock.now().saturating_duration_since(started);
        let report = PassReport {
            pass,
            visited: keys.len(),
            failed,
            elapsed,
            over_budget: elapsed > self.budget,
        };
        debug!(
            "pass {:?}: {} chunks, {} failed, {:?}{}",
            pass,
            report.visited,
            failed,
            elapsed,
            if report.over_budget { " (over budget)" } else { "" }
        );
        self.next_pass += 1;
        self.report.passes.push(report.clone());
        Some(report)
    }

    /// Run passes until one overruns the budget or the run finishes.
    pub fn step<C, F>(&mut self, clock: &C, regen: &mut F) -> RunStatus
    where
        C: Clock + ?Sized,
        F: FnMut(&ChunkJob<'_>) -> Result<(), RegenError>,
    {
        self.report.steps += 1;
        while let Some(report) = self.run_pass(clock, regen) {
            if report.over_budget {
                if let Some(next_pass) = self.next_pass() {
                    return RunStatus::Yielded { next_pass };
                }
            }
        }

        let report = std::mem::take(&mut self.report);
        info!(
            "regen run complete: {} chunks, {} visits, {} failures over {} steps",
            report.chunks,
            report.visits(),
            report.failures(),
            report.steps
        );
        RunStatus::Complete(report)
    }
}

/// Drive a run to completion, awaiting `yield_now` whenever a pass overruns
/// its budget so other work on the executor gets a turn.
pub async fn run_to_completion_async<C, F, Y, Fut>(
    mut run: MultiPassRun,
    clock: &C,
    mut regen: F,
    mut yield_now: Y,
) -> RunReport
where
    C: Clock + ?Sized,
    F: FnMut(&ChunkJob<'_>) -> Result<(), RegenError>,
    Y: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        match run.step(clock, &mut regen) {
            RunStatus::Complete(report) => return report,
            RunStatus::Yielded { next_pass } => {
                debug!("yielding before {:?}", next_pass);
                yield_now().await;
            }
        }
    }
}

/// `run_to_completion_async` with tokio's task yield.
pub async fn run_on_tokio<C, F>(run: MultiPassRun, clock: &C, regen: F) -> RunReport
where
    C: Clock + ?Sized,
    F: FnMut(&ChunkJob<'_>) -> Result<(), RegenError>,
{
    run_to_completion_async(run, clock, regen, tokio::task::yield_now).await
}
