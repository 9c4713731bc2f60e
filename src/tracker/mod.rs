//! Optimistic tracking of in-flight votes, approvals and rejections.
//!
//! [`OptimisticTracker::submit`] records a `Pending` entry synchronously,
//! before any chain work starts, so a view rendered right after the call
//! already reflects the action. The chain submission then runs on its own
//! task and the entry is reconciled when a terminal status arrives:
//!
//! ```text
//! Pending --success--> Confirmed --grace period--> (removed)
//! Pending --error----> Failed ----dismiss--------> (removed)
//! Failed  --submit/retry for the same key--------> Pending
//! ```
//!
//! Entries are kept in memory only and are lost with the tracker.

pub mod types;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::chain::wallet::connected_actor;
use crate::chain::{await_terminal, ActionRequest, ChainClient, ChainError, WalletProvider};
use crate::config::{ResolutionPolicy, TrackerConfig};
use crate::errors::TrackerError;
use crate::projector::{self, Aggregate};
use types::{ActionKind, ActionPayload, ActionState, EntryKey, PendingAction, SubjectId};

/// Capacity of the event channel. Slow subscribers skip old events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Final result of one submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub success: bool,
    pub result_ref: Option<String>,
    pub failure_reason: Option<String>,
}

impl SubmitOutcome {
    pub fn confirmed(result_ref: Option<String>) -> Self {
        Self {
            success: true,
            result_ref,
            failure_reason: None,
        }
    }

    pub fn failed(result_ref: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            result_ref,
            failure_reason: Some(reason.into()),
        }
    }
}

impl From<TrackerError> for SubmitOutcome {
    fn from(err: TrackerError) -> Self {
        SubmitOutcome::failed(None, err.to_string())
    }
}

/// Visible state changes, published to subscribers.
///
/// Every submission publishes exactly one `Submitted` and one terminal
/// event (`Confirmed` or `Failed`) carrying the same `submission` id, even
/// when its resolution no longer changes the tracked entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    Submitted { submission: u64, action: PendingAction },
    Confirmed { submission: u64, action: PendingAction },
    Failed { submission: u64, action: PendingAction },
    /// A confirmed entry reached the end of its grace period
    Expired(EntryKey),
    Dismissed(EntryKey),
}

/// Handle to a submission that is already running.
///
/// Awaiting it yields the outcome. Dropping it does not cancel anything:
/// the chain transaction and the reconciliation of the entry continue.
#[derive(Debug)]
pub struct Submission {
    id: u64,
    key: EntryKey,
    task: JoinHandle<SubmitOutcome>,
}

impl Submission {
    /// Id shared with this submission's events
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> &EntryKey {
        &self.key
    }
}

impl Future for Submission {
    type Output = SubmitOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<SubmitOutcome> {
        match Pin::new(&mut self.task).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(err)) => Poll::Ready(SubmitOutcome::failed(
                None,
                format!("Submission task failed: {}", err),
            )),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[derive(Debug, Clone)]
struct TrackedEntry {
    action: PendingAction,
    /// Submission that last armed this entry
    sequence: u64,
    /// Set by each applied confirmation; only the matching timer may expire the entry
    expiry_token: Option<u64>,
}

struct TrackerInner {
    entries: Mutex<HashMap<EntryKey, TrackedEntry>>,
    chain: Arc<dyn ChainClient>,
    wallet: Arc<dyn WalletProvider>,
    config: TrackerConfig,
    events: broadcast::Sender<TrackerEvent>,
    next_sequence: AtomicU64,
    next_expiry_token: AtomicU64,
}

/// Keyed set of optimistic actions for one UI session.
///
/// Cloning yields another handle to the same entries. Separate trackers
/// (e.g. one for votes, one for approvals) share nothing.
#[derive(Clone)]
pub struct OptimisticTracker {
    inner: Arc<TrackerInner>,
}

impl OptimisticTracker {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        wallet: Arc<dyn WalletProvider>,
        config: TrackerConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(TrackerInner {
                entries: Mutex::new(HashMap::new()),
                chain,
                wallet,
                config,
                events,
                next_sequence: AtomicU64::new(1),
                next_expiry_token: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    /// Receive every visible state change from now on
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.inner.events.subscribe()
    }

    /// Submit an action as the wallet's selected actor.
    ///
    /// On success the entry for `(subject_id, actor)` is already Pending when
    /// this returns, replacing whatever was there. Must be called inside a
    /// tokio runtime.
    pub fn submit(
        &self,
        subject_id: impl Into<SubjectId>,
        kind: ActionKind,
        payload: ActionPayload,
    ) -> Result<Submission, TrackerError> {
        let actor_id = connected_actor(self.inner.wallet.as_ref()).ok_or_else(|| {
            debug!("Rejecting {} submission: wallet not connected", kind);
            TrackerError::NotConnected
        })?;
        if !payload.matches(kind) {
            return Err(TrackerError::InvalidPayload(format!(
                "{} cannot carry payload {}",
                kind, payload
            )));
        }

        let action = PendingAction::new(subject_id, actor_id, kind, payload);
        let key = action.key();

        let sequence = self.inner.arm(action.clone());
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { inner.drive(action, sequence).await });

        Ok(Submission {
            id: sequence,
            key,
            task,
        })
    }

    /// Re-submit the selected actor's failed action on a subject
    pub fn retry(&self, subject_id: &str) -> Result<Submission, TrackerError> {
        let actor_id =
            connected_actor(self.inner.wallet.as_ref()).ok_or(TrackerError::NotConnected)?;
        let key = EntryKey::new(subject_id, actor_id);

        let (kind, payload) = {
            let entries = self.inner.entries.lock();
            entries
                .get(&key)
                .filter(|entry| entry.action.state == ActionState::Failed)
                .map(|entry| (entry.action.kind, entry.action.payload))
        }
        .ok_or_else(|| TrackerError::UnknownEntry(key.to_string()))?;

        debug!("Retrying {} for {}", kind, key);
        self.submit(subject_id, kind, payload)
    }

    /// Remove the entry for a key, whatever its state. Absent keys are ignored.
    pub fn dismiss(&self, subject_id: &str, actor_id: &str) {
        let key = EntryKey::new(subject_id, actor_id);
        let removed = self.inner.entries.lock().remove(&key);
        if removed.is_some() {
            debug!("Dismissed entry {}", key);
            self.inner.publish(TrackerEvent::Dismissed(key));
        }
    }

    /// All current entries for a subject, oldest first
    pub fn list(&self, subject_id: &str) -> Vec<PendingAction> {
        let mut actions: Vec<PendingAction> = self
            .inner
            .entries
            .lock()
            .values()
            .filter(|entry| entry.action.subject_id == subject_id)
            .map(|entry| entry.action.clone())
            .collect();
        sort_actions(&mut actions);
        actions
    }

    /// Entries for a subject that are still awaiting a terminal status
    pub fn pending_for(&self, subject_id: &str) -> Vec<PendingAction> {
        let mut actions = self.list(subject_id);
        actions.retain(PendingAction::is_pending);
        actions
    }

    pub fn has(&self, subject_id: &str, actor_id: &str) -> bool {
        self.inner
            .entries
            .lock()
            .contains_key(&EntryKey::new(subject_id, actor_id))
    }

    pub fn has_pending(&self, subject_id: &str, actor_id: &str) -> bool {
        self.get(subject_id, actor_id)
            .map_or(false, |action| action.is_pending())
    }

    pub fn get(&self, subject_id: &str, actor_id: &str) -> Option<PendingAction> {
        self.inner
            .entries
            .lock()
            .get(&EntryKey::new(subject_id, actor_id))
            .map(|entry| entry.action.clone())
    }

    /// Every entry across all subjects
    pub fn snapshot(&self) -> Vec<PendingAction> {
        let mut actions: Vec<PendingAction> = self
            .inner
            .entries
            .lock()
            .values()
            .map(|entry| entry.action.clone())
            .collect();
        sort_actions(&mut actions);
        actions
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    /// Fetch confirmed totals and fold this tracker's entries into them
    pub async fn projected(&self, subject_id: &str) -> Result<Aggregate, ChainError> {
        let confirmed = self.inner.chain.confirmed_totals(subject_id).await?;
        Ok(projector::project(&confirmed, &self.list(subject_id)))
    }
}

/// Milliseconds reported by a pending-timeout failure
fn timeout_millis(limit: Duration) -> u64 {
    u64::try_from(limit.as_millis()).unwrap_or(u64::MAX)
}

fn sort_actions(actions: &mut [PendingAction]) {
    actions.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.subject_id.cmp(&b.subject_id))
            .then_with(|| a.actor_id.cmp(&b.actor_id))
    });
}

impl TrackerInner {
    fn publish(&self, event: TrackerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Insert or overwrite the entry for the action's key as Pending
    fn arm(&self, action: PendingAction) -> u64 {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let key = action.key();
        let previous = self.entries.lock().insert(
            key.clone(),
            TrackedEntry {
                action: action.clone(),
                sequence,
                expiry_token: None,
            },
        );

        match previous {
            Some(prev) => debug!(
                "Re-armed {} (was {}) as {} submission #{}",
                key, prev.action.state, action.kind, sequence
            ),
            None => debug!("Tracking {} {} as submission #{}", action.kind, key, sequence),
        }
        self.publish(TrackerEvent::Submitted {
            submission: sequence,
            action,
        });
        sequence
    }

    async fn drive(self: Arc<Self>, action: PendingAction, sequence: u64) -> SubmitOutcome {
        let request = ActionRequest {
            subject_id: action.subject_id.clone(),
            actor_id: action.actor_id.clone(),
            kind: action.kind,
            payload: action.payload,
        };
        let (result_ref, result) = match self.config.pending_timeout() {
            Some(limit) => match tokio::time::timeout(limit, self.dispatch(request)).await {
                Ok(resolved) => resolved,
                Err(_) => (None, Err(ChainError::Timeout(timeout_millis(limit)))),
            },
            None => self.dispatch(request).await,
        };
        self.resolve(action, sequence, result_ref, result)
    }

    async fn dispatch(&self, request: ActionRequest) -> (Option<String>, Result<(), ChainError>) {
        match self.chain.submit(request).await {
            Ok(submitted) => {
                let tx_hash = submitted.tx_hash;
                debug!("Transaction {} dispatched", tx_hash);
                (Some(tx_hash), await_terminal(submitted.statuses).await)
            }
            Err(err) => (None, Err(err)),
        }
    }

    fn resolve(
        self: &Arc<Self>,
        mut action: PendingAction,
        sequence: u64,
        result_ref: Option<String>,
        result: Result<(), ChainError>,
    ) -> SubmitOutcome {
        let key = action.key();
        let outcome = match &result {
            Ok(()) => {
                action.confirm(result_ref.clone());
                SubmitOutcome::confirmed(result_ref.clone())
            }
            Err(err) => {
                action.fail(result_ref.clone(), err.to_string());
                SubmitOutcome::failed(result_ref.clone(), err.to_string())
            }
        };

        // Some(token) when the entry changed, the token set only on confirmation
        let applied: Option<Option<u64>> = {
            let mut entries = self.entries.lock();
            match entries.get_mut(&key) {
                None => {
                    debug!("Submission #{} for {} resolved after the entry was removed", sequence, key);
                    None
                }
                Some(entry)
                    if entry.sequence != sequence
                        && self.config.resolution_policy == ResolutionPolicy::LatestSubmissionWins =>
                {
                    debug!(
                        "Ignoring resolution of submission #{} for {}: superseded by #{}",
                        sequence, key, entry.sequence
                    );
                    None
                }
                Some(entry) => {
                    entry.action.state = action.state;
                    entry.action.result_ref = action.result_ref.clone();
                    entry.action.failure_reason = action.failure_reason.clone();
                    entry.expiry_token = outcome
                        .success
                        .then(|| self.next_expiry_token.fetch_add(1, Ordering::Relaxed));
                    Some(entry.expiry_token)
                }
            }
        };

        if let Some(token) = applied {
            if let Some(token) = token {
                info!("{} for {} confirmed ({:?})", action.kind, key, action.result_ref);
                self.schedule_expiry(key, token);
            } else {
                warn!(
                    "{} for {} failed: {}",
                    action.kind,
                    key,
                    action.failure_reason.as_deref().unwrap_or_default()
                );
            }
        }

        let event = if outcome.success {
            TrackerEvent::Confirmed {
                submission: sequence,
                action,
            }
        } else {
            TrackerEvent::Failed {
                submission: sequence,
                action,
            }
        };
        self.publish(event);

        outcome
    }

    /// Remove a confirmed entry once its grace period has elapsed
    fn schedule_expiry(self: &Arc<Self>, key: EntryKey, token: u64) {
        let grace = self.config.grace_period();
        let tracker: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(inner) = tracker.upgrade() {
                inner.expire(key, token);
            }
        });
    }

    fn expire(&self, key: EntryKey, token: u64) {
        let removed = {
            let mut entries = self.entries.lock();
            let still_confirmed = entries.get(&key).map_or(false, |entry| {
                entry.expiry_token == Some(token) && entry.action.state == ActionState::Confirmed
            });
            still_confirmed && entries.remove(&key).is_some()
        };
        if removed {
            debug!("Confirmed entry {} expired", key);
            self.publish(TrackerEvent::Expired(key));
        }
    }
}
