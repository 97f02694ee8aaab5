use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::config::MAX_RECENT_EVENTS;
use crate::types::{CollectorHealth, JobEvent, JobStatus, MarketStatus, RunHistory, ScheduledJob};

// ---------------------------------------------------------------------------
// SnapshotStore
// ---------------------------------------------------------------------------

/// Latest data fetched from the backend.
///
/// Each snapshot is an `Arc` swapped in wholesale by its poller; readers clone
/// the `Arc` and compute on it without holding the lock. The only in-place
/// edits are the optimistic updates after a job action, which the next
/// scheduler poll overwrites.
pub struct SnapshotStore {
    jobs: RwLock<Arc<Vec<ScheduledJob>>>,
    market: RwLock<Option<Arc<MarketStatus>>>,
    history: RwLock<Arc<RunHistory>>,
    collectors: RwLock<Arc<Vec<CollectorHealth>>>,
    /// Most recent last; bounded by MAX_RECENT_EVENTS.
    events: Mutex<VecDeque<JobEvent>>,
}

impl SnapshotStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // --- scheduler snapshot ------------------------------------------------

    pub fn replace_jobs(&self, jobs: Vec<ScheduledJob>) {
        *self.jobs.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(jobs);
    }

    pub fn jobs(&self) -> Arc<Vec<ScheduledJob>> {
        Arc::clone(&self.jobs.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn job(&self, job_id: &str) -> Option<ScheduledJob> {
        self.jobs().iter().find(|j| j.job_id == job_id).cloned()
    }

    /// Optimistically flip `enabled` after a successful enable/disable call.
    /// Returns false if the job is not in the current snapshot.
    pub fn set_job_enabled(&self, job_id: &str, enabled: bool) -> bool {
        self.edit_job(job_id, |j| j.enabled = enabled)
    }

    /// Optimistically mark a job running after a manual trigger.
    pub fn mark_job_running(&self, job_id: &str) -> bool {
        self.edit_job(job_id, |j| j.status = JobStatus::Running)
    }

    fn edit_job(&self, job_id: &str, edit: impl FnOnce(&mut ScheduledJob)) -> bool {
        let mut guard = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let Some(idx) = guard.iter().position(|j| j.job_id == job_id) else {
            return false;
        };
        let mut next = guard.as_ref().clone();
        edit(&mut next[idx]);
        *guard = Arc::new(next);
        true
    }

    pub fn replace_history(&self, history: RunHistory) {
        *self.history.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(history);
    }

    pub fn history(&self) -> Arc<RunHistory> {
        Arc::clone(&self.history.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn replace_collectors(&self, collectors: Vec<CollectorHealth>) {
        *self.collectors.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(collectors);
    }

    pub fn collectors(&self) -> Arc<Vec<CollectorHealth>> {
        Arc::clone(&self.collectors.read().unwrap_or_else(PoisonError::into_inner))
    }

    // --- market status -----------------------------------------------------

    pub fn replace_market(&self, status: MarketStatus) {
        *self.market.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(status));
    }

    /// `None` until the first successful market status poll.
    pub fn market(&self) -> Option<Arc<MarketStatus>> {
        self.market
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // --- job events --------------------------------------------------------

    /// Append events not already held. Returns the newly added ones so the
    /// caller can log them.
    pub fn push_events(&self, incoming: Vec<JobEvent>) -> Vec<JobEvent> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let mut added = Vec::new();
        for event in incoming {
            if events.contains(&event) {
                continue;
            }
            events.push_back(event.clone());
            added.push(event);
        }
        while events.len() > MAX_RECENT_EVENTS {
            events.pop_front();
        }
        added
    }

    /// Newest first.
    pub fn recent_events(&self) -> Vec<JobEvent> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.iter().rev().cloned().collect()
    }

    /// Timestamp of the newest event held, used as the `since` cursor.
    pub fn latest_event_timestamp(&self) -> Option<String> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.iter().rev().find_map(|e| e.timestamp.clone())
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self {
            jobs: RwLock::new(Arc::new(Vec::new())),
            market: RwLock::new(None),
            history: RwLock::new(Arc::new(RunHistory::default())),
            collectors: RwLock::new(Arc::new(Vec::new())),
            events: Mutex::new(VecDeque::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
