//! Batched fog persistence and hash-based reconciliation.
//!
//! DESIGN
//! ======
//! `SyncEngine` is a clock-driven state machine with no I/O of its own. The
//! runtime feeds it edits and timestamps, asks it for a batch when the
//! debounce deadline passes (or the threshold is hit), performs the requests,
//! then reports the outcome back. Poll results go through the same object so
//! the throttle is evaluated both when a poll is issued and again when its
//! result arrives.
//!
//! ```text
//!   Idle --queue--> Queuing --deadline/threshold--> Flushing --finish--> Idle
//!                     ^                                 |
//!                     +------ failed partition ---------+
//! ```
//!
//! A batch is the leading run of same-action edits, so the store sees paint
//! and erase in the order the GM made them. Whatever follows the run is sent
//! as soon as the batch in flight settles.
//!
//! Delivery is at-least-once: a partition whose request failed transiently is
//! put back at the front of the queue. Re-applying an edit the store already
//! has is a no-op because reveal is set-like and hide is a subtraction. A
//! partition the store rejected outright is dropped.
//!
//! A fog reset travels the same one-at-a-time path as batches. It bumps the
//! queue generation, so a batch from before the reset is never retried.
//!
//! The reconciliation poll never merges. It either replaces the whole local
//! fog with the remote snapshot or skips the cycle.

#[cfg(test)]
#[path = "sync_test.rs"]
mod sync_test;

use std::collections::HashMap;
use std::time::Duration;

use mapview::fog::{FogAction, FogEdit, FogState, RevealedArea};
use tokio::time::Instant;

use crate::config::SessionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub debounce: Duration,
    pub threshold: usize,
    pub staleness: Duration,
}

impl From<&SessionConfig> for SyncConfig {
    fn from(config: &SessionConfig) -> Self {
        Self {
            debounce: config.flush_debounce,
            threshold: config.flush_threshold.max(1),
            staleness: config.staleness,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Queuing,
    Flushing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    /// Same cell and action already queued; nothing changed.
    Duplicate,
    /// Queued; the debounce deadline moved.
    Queued,
    /// Threshold reached; flush without waiting for the deadline.
    FlushNow,
}

/// One flush worth of edits, partitioned by endpoint. At most one partition
/// is non-empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushBatch {
    pub reveal: Vec<FogEdit>,
    pub hide: Vec<FogEdit>,
    /// Queue generation the edits were taken from.
    pub generation: u64,
}

impl FlushBatch {
    #[must_use]
    pub fn reveal_areas(&self) -> Vec<RevealedArea> {
        self.reveal.iter().map(|e| e.area).collect()
    }

    #[must_use]
    pub fn hide_areas(&self) -> Vec<RevealedArea> {
        self.hide.iter().map(|e| e.area).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.reveal.len() + self.hide.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reveal.is_empty() && self.hide.is_empty()
    }
}

/// What happened to one store request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Failed in a way the next cycle may fix.
    Retry,
    /// The store refused it; sending it again cannot help.
    Rejected,
}

/// Per-partition outcome of a [`FlushBatch`]. An empty partition counts as
/// sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub reveal: Delivery,
    pub hide: Delivery,
}

impl FlushReport {
    pub const OK: Self = Self { reveal: Delivery::Sent, hide: Delivery::Sent };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A local edit landed inside the staleness window.
    RecentEdit,
    /// A paint or erase stroke is in progress.
    GestureActive,
    /// Local edits are queued or in flight.
    EditsPending,
}

impl SkipReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RecentEdit => "recent_edit",
            Self::GestureActive => "gesture_active",
            Self::EditsPending => "edits_pending",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollDecision {
    /// Remote hash matches what we already have.
    Unchanged,
    Skip(SkipReason),
    /// Remote changed and nothing local blocks a pull.
    Fetch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Replaced,
    /// The throttle closed while the snapshot was in flight.
    Discarded(SkipReason),
}

#[derive(Debug)]
pub struct SyncEngine {
    config: SyncConfig,
    pending: Vec<FogEdit>,
    /// Latest queued action per rounded cell centre.
    last_action: HashMap<(i64, i64), FogAction>,
    deadline: Option<Instant>,
    in_flight: bool,
    /// Edits were left behind by the last batch and go out next.
    carry_over: bool,
    reset_requested: bool,
    generation: u64,
    last_edit: Option<Instant>,
    gesture: bool,
    known_hash: Option<String>,
}

impl SyncEngine {
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            pending: Vec::new(),
            last_action: HashMap::new(),
            deadline: None,
            in_flight: false,
            carry_over: false,
            reset_requested: false,
            generation: 0,
            last_edit: None,
            gesture: false,
            known_hash: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> SyncConfig {
        self.config
    }

    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        if self.in_flight {
            SyncPhase::Flushing
        } else if self.pending.is_empty() && !self.reset_requested {
            SyncPhase::Idle
        } else {
            SyncPhase::Queuing
        }
    }

    #[must_use]
    pub fn pending(&self) -> &[FogEdit] {
        &self.pending
    }

    /// When the debounce fires, if anything is queued.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// A batch or a reset is in flight.
    #[must_use]
    pub fn is_flushing(&self) -> bool {
        self.in_flight
    }

    #[must_use]
    pub fn reset_requested(&self) -> bool {
        self.reset_requested
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    // --- Queue ---

    /// Queue an edit that has already been applied locally. An edit is a
    /// duplicate only when the latest queued edit for its cell has the same
    /// action; paint after erase on one cell is kept in order.
    pub fn queue(&mut self, edit: FogEdit, now: Instant) -> QueueOutcome {
        self.last_edit = Some(now);
        let cell = cell_of(&edit);
        if self.last_action.get(&cell) == Some(&edit.action) {
            return QueueOutcome::Duplicate;
        }
        self.last_action.insert(cell, edit.action);
        self.pending.push(edit);
        if self.pending.len() >= self.config.threshold {
            self.deadline = None;
            return QueueOutcome::FlushNow;
        }
        // Replace, never stack: only the latest edit's deadline exists.
        self.deadline = Some(now + self.config.debounce);
        QueueOutcome::Queued
    }

    /// Whether a flush should start at `now`.
    #[must_use]
    pub fn flush_due(&self, now: Instant) -> bool {
        if self.in_flight {
            return false;
        }
        let deadline_passed = self.deadline.is_none_or(|d| now >= d);
        if self.reset_requested {
            return deadline_passed;
        }
        if self.pending.is_empty() {
            return false;
        }
        self.carry_over
            || self.pending.len() >= self.config.threshold
            || self.deadline.is_some_and(|d| now >= d)
    }

    /// Take the leading run of same-action edits as a batch and enter
    /// `Flushing`. `None` while anything is in flight, while a reset waits to
    /// be sent, or when nothing is queued.
    pub fn take_batch(&mut self) -> Option<FlushBatch> {
        if self.in_flight || self.reset_requested {
            return None;
        }
        let action = self.pending.first()?.action;
        let run = self.pending.iter().take_while(|e| e.action == action).count();
        let edits: Vec<FogEdit> = self.pending.drain(..run).collect();
        let mut batch = FlushBatch { generation: self.generation, ..FlushBatch::default() };
        match action {
            FogAction::Reveal => batch.reveal = edits,
            FogAction::Hide => batch.hide = edits,
        }
        self.reindex();
        self.carry_over = !self.pending.is_empty();
        self.deadline = None;
        self.in_flight = true;
        Some(batch)
    }

    /// Leave `Flushing`, putting transiently failed partitions back in front
    /// of anything queued meanwhile. A batch from before a reset is never
    /// retried. Returns how many edits were re-queued.
    pub fn finish_flush(&mut self, batch: FlushBatch, report: FlushReport, now: Instant) -> usize {
        self.in_flight = false;
        // The store moved, or refused to; the next poll must compare afresh.
        self.known_hash = None;
        if batch.generation != self.generation {
            return 0;
        }
        let mut retry = Vec::new();
        if report.reveal == Delivery::Retry {
            retry.extend(batch.reveal);
        }
        if report.hide == Delivery::Retry {
            retry.extend(batch.hide);
        }
        let requeued = retry.len();
        if requeued > 0 {
            retry.append(&mut self.pending);
            self.pending = retry;
            self.reindex();
            // Retry after one debounce.
            self.carry_over = false;
            self.deadline = Some(now + self.config.debounce);
        } else if !self.pending.is_empty() && self.deadline.is_none() && !self.carry_over {
            self.deadline = Some(now + self.config.debounce);
        }
        requeued
    }

    /// Drop every queued edit and start a new generation.
    pub fn clear_pending(&mut self, now: Instant) {
        self.pending.clear();
        self.last_action.clear();
        self.deadline = None;
        self.carry_over = false;
        self.generation += 1;
        self.known_hash = None;
        self.last_edit = Some(now);
    }

    // --- Reset ---

    /// Clear the queue and schedule a store reset behind whatever is in
    /// flight.
    pub fn request_reset(&mut self, now: Instant) {
        self.clear_pending(now);
        self.reset_requested = true;
    }

    /// Claim the scheduled reset and enter `Flushing`. `false` while anything
    /// is in flight or no reset is scheduled.
    pub fn take_reset(&mut self) -> bool {
        if self.in_flight || !self.reset_requested {
            return false;
        }
        self.reset_requested = false;
        self.in_flight = true;
        true
    }

    /// Leave `Flushing` after a reset request; a transient failure schedules
    /// it again after the debounce.
    pub fn finish_reset(&mut self, delivery: Delivery, now: Instant) {
        self.in_flight = false;
        self.known_hash = None;
        if delivery == Delivery::Retry {
            self.reset_requested = true;
            self.deadline = Some(now + self.config.debounce);
        } else if !self.pending.is_empty() && self.deadline.is_none() {
            self.deadline = Some(now + self.config.debounce);
        }
    }

    fn reindex(&mut self) {
        self.last_action.clear();
        for edit in &self.pending {
            self.last_action.insert(cell_of(edit), edit.action);
        }
    }

    // --- Gestures ---

    pub fn begin_gesture(&mut self) {
        self.gesture = true;
    }

    pub fn end_gesture(&mut self) {
        self.gesture = false;
    }

    #[must_use]
    pub fn gesture_active(&self) -> bool {
        self.gesture
    }

    // --- Reconciliation ---

    #[must_use]
    pub fn known_hash(&self) -> Option<&str> {
        self.known_hash.as_deref()
    }

    /// Record the hash of a snapshot just loaded from the store.
    pub fn note_remote_hash(&mut self, hash: impl Into<String>) {
        self.known_hash = Some(hash.into());
    }

    /// What stops a remote snapshot from being applied right now, if anything.
    #[must_use]
    pub fn blocker(&self, now: Instant) -> Option<SkipReason> {
        if self.gesture {
            return Some(SkipReason::GestureActive);
        }
        if self
            .last_edit
            .is_some_and(|at| now.saturating_duration_since(at) < self.config.staleness)
        {
            return Some(SkipReason::RecentEdit);
        }
        if self.in_flight || self.reset_requested || !self.pending.is_empty() {
            return Some(SkipReason::EditsPending);
        }
        None
    }

    /// Decide what to do with a freshly polled remote hash.
    pub fn poll_decision(&mut self, remote_hash: &str, local_hash: &str, now: Instant) -> PollDecision {
        if self.known_hash.as_deref() == Some(remote_hash) {
            return PollDecision::Unchanged;
        }
        if remote_hash == local_hash {
            self.known_hash = Some(remote_hash.to_owned());
            return PollDecision::Unchanged;
        }
        match self.blocker(now) {
            Some(reason) => PollDecision::Skip(reason),
            None => PollDecision::Fetch,
        }
    }

    /// Replace `fog` with a fetched snapshot unless the throttle closed while
    /// it was in flight.
    pub fn reconcile(&mut self, fog: &mut FogState, areas: Vec<RevealedArea>, now: Instant) -> ReconcileOutcome {
        if let Some(reason) = self.blocker(now) {
            return ReconcileOutcome::Discarded(reason);
        }
        fog.replace(areas);
        self.known_hash = Some(fog.hash().to_owned());
        ReconcileOutcome::Replaced
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}

fn cell_of(edit: &FogEdit) -> (i64, i64) {
    let key = edit.key();
    (key.x, key.y)
}
