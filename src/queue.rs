//! Priority queue for selection-driven regeneration requests
//!
//! Requests are kept sorted by score, lowest first. Ties keep insertion
//! order. A region can be queued only once: asking again re-scores the
//! existing request instead of adding a second one.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::geometry::{RegionId, Selection};
use crate::tiles::TileMatrix;

/// Context captured when a request is enqueued. Never changes afterwards
/// except through an override.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub dependency_count: usize,
    pub level: i32,
    /// Tiles under the region at request time.
    pub prior: Option<TileMatrix>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RegenerationRequest {
    pub region: Selection,
    pub priority: f64,
    pub info: SnapshotInfo,
    seq: u64,
}

impl RegenerationRequest {
    pub fn new(region: Selection, priority: f64, info: SnapshotInfo) -> Self {
        Self {
            region,
            priority,
            info,
            seq: 0,
        }
    }

    pub fn region_id(&self) -> RegionId {
        self.region.id
    }
}

#[derive(Debug, Default)]
pub struct SelectionQueue {
    requests: Vec<RegenerationRequest>,
    next_seq: u64,
}

impl SelectionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Requests in service order.
    pub fn iter(&self) -> impl Iterator<Item = &RegenerationRequest> {
        self.requests.iter()
    }

    /// Whether a request for this region is waiting.
    pub fn contains(&self, region: RegionId) -> bool {
        self.requests.iter().any(|r| r.region.id == region)
    }

    /// Queue a request. A request for an already-queued region overrides it.
    pub fn push(&mut self, mut request: RegenerationRequest) {
        if self.contains(request.region.id) {
            debug!(
                "queue: region {:?} already queued, overriding priority {:.3}",
                request.region.id, request.priority
            );
            let id = request.region.id;
            self.override_request(id, request.priority, request.info);
            return;
        }

        request.seq = self.next_seq;
        self.next_seq += 1;
        self.requests.push(request);
        self.resort();
    }

    /// Remove and return the request with the lowest score.
    pub fn pop(&mut self) -> Option<RegenerationRequest> {
        if self.requests.is_empty() {
            return None;
        }
        Some(self.requests.remove(0))
    }

    pub fn peek(&self) -> Option<&RegenerationRequest> {
        self.requests.first()
    }

    /// Re-score a queued request in place. The request keeps its original
    /// insertion rank for tie-breaking. Returns false (and logs) if the
    /// region is not queued.
    pub fn override_request(&mut self, region: RegionId, priority: f64, info: SnapshotInfo) -> bool {
        match self.requests.iter_mut().find(|r| r.region.id == region) {
            Some(existing) => {
                existing.priority = priority;
                existing.info = info;
                self.resort();
                true
            }
            None => {
                warn!("queue: override for region {:?} which is not queued", region);
                false
            }
        }
    }

    /// Drop a queued request without servicing it.
    pub fn remove(&mut self, region: RegionId) -> Option<RegenerationRequest> {
        let idx = self.requests.iter().position(|r| r.region.id == region)?;
        Some(self.requests.remove(idx))
    }

    fn resort(&mut self) {
        self.requests
            .sort_by(|a, b| a.priority.total_cmp(&b.priority).then(a.seq.cmp(&b.seq)));
    }
}
