//! Durable outbox with ordered, retrying delivery.
//!
//! `enqueue` appends and saves immediately. `flush` walks pending entries in
//! enqueue order and hands each to the persistence collaborator:
//! 1. Success removes the entry.
//! 2. A retryable failure (network, timeout) bumps `attempts` and pushes
//!    `next_attempt_at` out by the backoff delay.
//! 3. A validation failure, or reaching `max_attempts`, moves the entry to
//!    `failed` and reports `PersistenceFailed`.
//!
//! An entry that is not delivered in a pass blocks every later entry sharing a
//! resource key with it, so a newer rating never lands before an older one.
//! Failed entries hold nothing back; instead, a delivery strips from every older
//! failed entry the candidate ratings it just overwrote, so `retry_failed` can
//! never replay a stale value over a newer one.

use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::models::TournamentError;
use crate::sync::outbox::{
    EntryState, JsonFileStore, MemoryStore, OperationType, OutboxEntry, OutboxEntryId,
    OutboxStore, RatingsPayload,
};
use crate::sync::persistence::{PersistenceError, RatingsPersistence};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;

/// Result of one `flush` call.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FlushReport {
    pub delivered: usize,
    /// Entries that failed this pass and were rescheduled.
    pub retried: usize,
    /// Entries given up on during this pass (`PersistenceFailed` errors).
    pub abandoned: Vec<TournamentError>,
    /// Failed entries dropped because newer deliveries overwrote all their ratings.
    pub superseded: usize,
    /// Entries left in the queue after the pass.
    pub remaining: usize,
    /// Another flush was already running; nothing was attempted.
    pub skipped: bool,
    /// The queue is offline; nothing was attempted.
    pub offline: bool,
}

/// Counts for status displays ("3 votes not synced yet").
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SyncStatus {
    pub online: bool,
    pub pending: usize,
    pub failed: usize,
    pub next_attempt_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<OutboxEntry>,
    failed: Vec<OutboxEntry>,
    next_sequence: u64,
}

impl QueueState {
    fn all_entries(&self) -> Vec<OutboxEntry> {
        self.pending
            .iter()
            .chain(self.failed.iter())
            .cloned()
            .collect()
    }

    fn position(&self, id: OutboxEntryId) -> Option<usize> {
        self.pending.iter().position(|e| e.id == id)
    }

    /// Remove from older failed entries every rating `delivered` has written.
    /// Entries left with nothing to write are dropped and their ids returned.
    fn prune_superseded(&mut self, delivered: &OutboxEntry) -> Vec<OutboxEntryId> {
        let written = &delivered.payload.ratings;
        let mut dropped = Vec::new();
        self.failed.retain_mut(|failed| {
            if failed.sequence > delivered.sequence {
                return true;
            }
            failed.payload.ratings.retain(|id, _| !written.contains_key(id));
            if failed.payload.ratings.is_empty() {
                dropped.push(failed.id);
                return false;
            }
            true
        });
        dropped
    }
}

pub struct SyncQueue {
    config: SyncConfig,
    persistence: Arc<dyn RatingsPersistence>,
    store: Arc<dyn OutboxStore>,
    clock: Arc<dyn Clock>,
    state: Mutex<QueueState>,
    /// Held for the whole of a flush; `try_lock` failing means one is running.
    flush_gate: tokio::sync::Mutex<()>,
    online: AtomicBool,
    failures: broadcast::Sender<TournamentError>,
}

impl SyncQueue {
    /// Load whatever the store holds and start online.
    pub fn open(
        config: SyncConfig,
        persistence: Arc<dyn RatingsPersistence>,
        store: Arc<dyn OutboxStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TournamentError> {
        let mut entries = store.load()?;
        entries.sort_by_key(|e| e.sequence);
        let next_sequence = entries.iter().map(|e| e.sequence + 1).max().unwrap_or(0);
        let (failed, pending): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|e| e.state == EntryState::Failed);
        if !pending.is_empty() || !failed.is_empty() {
            log::info!(
                "Outbox restored: {} pending, {} failed",
                pending.len(),
                failed.len()
            );
        }
        let (failures, _) = broadcast::channel(64);
        Ok(Self {
            config,
            persistence,
            store,
            clock,
            state: Mutex::new(QueueState {
                pending: pending.into(),
                failed,
                next_sequence,
            }),
            flush_gate: tokio::sync::Mutex::new(()),
            online: AtomicBool::new(true),
            failures,
        })
    }

    /// File-backed when `config.outbox_path` is set, in-memory otherwise.
    pub fn from_config(
        config: SyncConfig,
        persistence: Arc<dyn RatingsPersistence>,
    ) -> Result<Self, TournamentError> {
        let store: Arc<dyn OutboxStore> = match &config.outbox_path {
            Some(path) => Arc::new(JsonFileStore::new(path.clone())),
            None => Arc::new(MemoryStore::new()),
        };
        Self::open(config, persistence, store, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn save(&self, state: &QueueState) -> Result<(), TournamentError> {
        self.store.save(&state.all_entries())
    }

    /// Save, logging instead of failing. Used mid-flush where the in-memory
    /// queue stays authoritative and the next save catches up.
    fn save_or_log(&self, state: &QueueState) {
        if let Err(e) = self.save(state) {
            log::error!("Outbox save failed: {}", e);
        }
    }

    /// Append a write and persist the queue. If it cannot be persisted the entry
    /// is dropped again and the error returned, so the caller knows it is not durable.
    pub fn enqueue(
        &self,
        operation: OperationType,
        payload: RatingsPayload,
    ) -> Result<OutboxEntryId, TournamentError> {
        let now = self.clock.now();
        let mut state = self.lock_state();
        let entry = OutboxEntry::new(state.next_sequence, operation, payload, now);
        let id = entry.id;
        state.next_sequence += 1;
        state.pending.push_back(entry);
        if let Err(e) = self.save(&state) {
            state.pending.pop_back();
            state.next_sequence -= 1;
            return Err(e);
        }
        log::debug!(
            "Queued {:?} {} ({} pending)",
            operation,
            id,
            state.pending.len()
        );
        Ok(id)
    }

    /// Record a connectivity change. Returns the previous value.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            log::info!("Sync queue is now {}", if online { "online" } else { "offline" });
        }
        previous
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Receive every `PersistenceFailed` raised by any flush.
    pub fn subscribe_failures(&self) -> broadcast::Receiver<TournamentError> {
        self.failures.subscribe()
    }

    pub fn pending(&self) -> Vec<OutboxEntry> {
        self.lock_state().pending.iter().cloned().collect()
    }

    pub fn failed(&self) -> Vec<OutboxEntry> {
        self.lock_state().failed.clone()
    }

    pub fn status(&self) -> SyncStatus {
        let state = self.lock_state();
        SyncStatus {
            online: self.is_online(),
            pending: state.pending.len(),
            failed: state.failed.len(),
            next_attempt_at: state.pending.iter().map(|e| e.next_attempt_at).min(),
        }
    }

    /// How long until the next backoff deadline; `None` when nothing is pending.
    ///
    /// Entries already due but held back behind a rescheduled entry wait for that
    /// entry's deadline, so only future deadlines count. If nothing is scheduled in
    /// the future but entries remain, they are due now.
    pub fn next_retry_in(&self) -> Option<Duration> {
        let now = self.clock.now();
        let state = self.lock_state();
        if state.pending.is_empty() {
            return None;
        }
        let next = state
            .pending
            .iter()
            .map(|e| e.next_attempt_at)
            .filter(|at| *at > now)
            .min();
        Some(match next {
            Some(at) => (at - now).to_std().unwrap_or(Duration::ZERO),
            None => Duration::ZERO,
        })
    }

    /// Put every failed entry back in the queue (in original order) with a fresh
    /// attempt budget. Returns how many were re-queued.
    pub fn retry_failed(&self) -> Result<usize, TournamentError> {
        let now = self.clock.now();
        let mut state = self.lock_state();
        let revived: Vec<OutboxEntry> = state
            .failed
            .drain(..)
            .map(|mut e| {
                e.state = EntryState::Pending;
                e.attempts = 0;
                e.next_attempt_at = now;
                e
            })
            .collect();
        let count = revived.len();
        state.pending.extend(revived);
        state.pending.make_contiguous().sort_by_key(|e| e.sequence);
        self.save(&state)?;
        Ok(count)
    }

    /// Drop every failed entry, returning them so the caller can report what was lost.
    pub fn discard_failed(&self) -> Result<Vec<OutboxEntry>, TournamentError> {
        let mut state = self.lock_state();
        let dropped = std::mem::take(&mut state.failed);
        self.save(&state)?;
        Ok(dropped)
    }

    /// Deliver due entries in FIFO order. Only one flush runs at a time; a
    /// concurrent call returns immediately with `skipped = true`.
    pub async fn flush(&self) -> FlushReport {
        let Ok(_gate) = self.flush_gate.try_lock() else {
            log::debug!("Flush already running; skipping");
            return FlushReport {
                skipped: true,
                ..FlushReport::default()
            };
        };

        let mut report = FlushReport::default();
        if !self.is_online() {
            report.offline = true;
            report.remaining = self.lock_state().pending.len();
            return report;
        }

        // Entries enqueued while this pass runs wait for the next one.
        let batch: Vec<OutboxEntry> = self.lock_state().pending.iter().cloned().collect();
        let mut blocked: HashSet<String> = HashSet::new();

        for entry in batch {
            let keys = entry.payload.resource_keys();
            let now = self.clock.now();
            if keys.iter().any(|k| blocked.contains(k)) || !entry.is_due(now) {
                blocked.extend(keys);
                continue;
            }
            if !self.is_online() {
                log::info!("Connectivity lost mid-flush; stopping");
                break;
            }

            match self.deliver(&entry).await {
                Ok(()) => {
                    let mut state = self.lock_state();
                    if let Some(pos) = state.position(entry.id) {
                        state.pending.remove(pos);
                    }
                    for id in state.prune_superseded(&entry) {
                        log::info!("Failed entry {} superseded by {}", id, entry.id);
                        report.superseded += 1;
                    }
                    self.save_or_log(&state);
                    report.delivered += 1;
                    log::debug!("Delivered {:?} {}", entry.operation, entry.id);
                }
                Err(error) => {
                    if self.record_failure(&entry, &error, &mut report) {
                        blocked.extend(keys);
                    }
                }
            }
        }

        report.remaining = self.lock_state().pending.len();
        if report.delivered > 0 || report.retried > 0 || !report.abandoned.is_empty() {
            log::info!(
                "Flush: {} delivered, {} rescheduled, {} abandoned, {} remaining",
                report.delivered,
                report.retried,
                report.abandoned.len(),
                report.remaining
            );
        }
        report
    }

    /// One delivery attempt, bounded by the configured timeout. A hang is a failure.
    async fn deliver(&self, entry: &OutboxEntry) -> Result<(), PersistenceError> {
        let timeout = self.config.delivery_timeout();
        match tokio::time::timeout(
            timeout,
            self.persistence.save_ratings(entry.operation, &entry.payload),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PersistenceError::timeout(format!(
                "no response within {} ms",
                timeout.as_millis()
            ))),
        }
    }

    /// Reschedule or abandon `entry` after `error`. Returns true when the entry
    /// stays pending (and so must block later writes to the same resources).
    fn record_failure(
        &self,
        entry: &OutboxEntry,
        error: &PersistenceError,
        report: &mut FlushReport,
    ) -> bool {
        let now = self.clock.now();
        let mut state = self.lock_state();
        let Some(pos) = state.position(entry.id) else {
            return false;
        };

        let attempts = entry.attempts + 1;
        if error.is_retryable() && attempts < self.config.max_attempts {
            let delay = self.config.backoff_delay(attempts);
            let queued = &mut state.pending[pos];
            queued.attempts = attempts;
            queued.last_error = Some(error.to_string());
            queued.next_attempt_at = now
                + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
            self.save_or_log(&state);
            report.retried += 1;
            log::warn!(
                "Delivery of {} failed (attempt {}/{}): {}; retrying in {:?}",
                entry.id,
                attempts,
                self.config.max_attempts,
                error,
                delay
            );
            return true;
        }

        let Some(mut failed) = state.pending.remove(pos) else {
            return false;
        };
        failed.attempts = attempts;
        failed.state = EntryState::Failed;
        failed.last_error = Some(error.to_string());
        state.failed.push(failed);
        self.save_or_log(&state);
        drop(state);

        let reason = if error.is_retryable() {
            format!("gave up after {} attempts: {}", attempts, error)
        } else {
            error.to_string()
        };
        log::error!("Outbox entry {} abandoned: {}", entry.id, reason);
        let failure = TournamentError::PersistenceFailed {
            entry_id: entry.id,
            reason,
        };
        // nobody listening is fine; the entry stays visible via `failed()`
        let _ = self.failures.send(failure.clone());
        report.abandoned.push(failure);
        false
    }
}
