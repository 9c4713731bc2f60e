//! Transaction toasts driven by tracker events.
//!
//! Toasts are appended newest first and only ever change status in place.
//! Each toast follows one submission. A bounded number is visible; success
//! toasts fade after a configurable time, error toasts stay until dismissed
//! or pushed out by newer toasts, and expose a retry target.

use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;

use crate::config::ToastConfig;
use crate::tracker::types::{ActionKind, EntryKey, PendingAction};
use crate::tracker::TrackerEvent;

/// Toasts kept per visible slot before the oldest resolved ones are dropped
const RETAINED_PER_VISIBLE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastStatus {
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    /// Tracker submission this toast follows
    pub submission: u64,
    pub key: EntryKey,
    pub kind: ActionKind,
    pub status: ToastStatus,
    pub title: String,
    pub message: Option<String>,
    pub tx_ref: Option<String>,
    resolved_at: Option<Instant>,
}

impl Toast {
    pub fn can_retry(&self) -> bool {
        self.status == ToastStatus::Error
    }
}

#[derive(Debug)]
pub struct ToastQueue {
    config: ToastConfig,
    /// Newest first
    toasts: Vec<Toast>,
    next_id: u64,
}

impl ToastQueue {
    pub fn new(config: ToastConfig) -> Self {
        Self {
            config,
            toasts: Vec::new(),
            next_id: 1,
        }
    }

    /// Fold one tracker event into the queue
    pub fn apply(&mut self, event: &TrackerEvent) {
        match event {
            TrackerEvent::Submitted { submission, action } => {
                let title = format!("{} submitted", action.kind);
                self.push(*submission, action, ToastStatus::Pending, title, None);
            }
            TrackerEvent::Confirmed { submission, action } => {
                let title = format!("{} confirmed", action.kind);
                self.resolve(*submission, action, ToastStatus::Success, title, None);
            }
            TrackerEvent::Failed { submission, action } => {
                let title = format!("{} failed", action.kind);
                let reason = action.failure_reason.clone();
                self.resolve(*submission, action, ToastStatus::Error, title, reason);
            }
            // Toasts outlive their entries
            TrackerEvent::Expired(_) | TrackerEvent::Dismissed(_) => {}
        }
    }

    fn push(
        &mut self,
        submission: u64,
        action: &PendingAction,
        status: ToastStatus,
        title: String,
        message: Option<String>,
    ) {
        let id = self.next_id;
        self.next_id += 1;
        let resolved_at = (status != ToastStatus::Pending).then(Instant::now);
        self.toasts.insert(
            0,
            Toast {
                id,
                submission,
                key: action.key(),
                kind: action.kind,
                status,
                title,
                message,
                tx_ref: action.result_ref.clone(),
                resolved_at,
            },
        );
        self.enforce_capacity();
    }

    fn resolve(
        &mut self,
        submission: u64,
        action: &PendingAction,
        status: ToastStatus,
        title: String,
        message: Option<String>,
    ) {
        let pending = self
            .toasts
            .iter_mut()
            .find(|toast| toast.submission == submission && toast.status == ToastStatus::Pending);

        match pending {
            Some(toast) => {
                toast.status = status;
                toast.title = title;
                toast.message = message;
                toast.tx_ref = action.result_ref.clone();
                toast.resolved_at = Some(Instant::now());
            }
            None => self.push(submission, action, status, title, message),
        }
    }

    /// Most toasts kept in memory, visible or not
    pub fn capacity(&self) -> usize {
        self.config.max_visible.saturating_mul(RETAINED_PER_VISIBLE)
    }

    /// Drop the oldest resolved toasts past capacity, then the oldest of any kind
    fn enforce_capacity(&mut self) {
        let capacity = self.capacity();
        while self.toasts.len() > capacity {
            let oldest_resolved = self
                .toasts
                .iter()
                .rposition(|toast| toast.status != ToastStatus::Pending);
            match oldest_resolved {
                Some(index) => {
                    self.toasts.remove(index);
                }
                None => {
                    self.toasts.pop();
                }
            }
        }
    }

    /// Drop success toasts whose time is up
    pub fn prune(&mut self) {
        let Some(ttl) = self.config.success_ttl() else {
            return;
        };
        let now = Instant::now();
        self.toasts.retain(|toast| {
            !(toast.status == ToastStatus::Success
                && toast.resolved_at.map_or(false, |at| now.duration_since(at) >= ttl))
        });
    }

    /// Toasts to render, newest first
    pub fn visible(&self) -> &[Toast] {
        let end = self.toasts.len().min(self.config.max_visible);
        &self.toasts[..end]
    }

    pub fn len(&self) -> usize {
        self.toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }

    pub fn dismiss(&mut self, id: u64) {
        self.toasts.retain(|toast| toast.id != id);
    }

    pub fn clear(&mut self) {
        self.toasts.clear();
    }

    /// Entry to retry for an error toast
    pub fn retry_target(&self, id: u64) -> Option<&EntryKey> {
        self.toasts
            .iter()
            .find(|toast| toast.id == id && toast.can_retry())
            .map(|toast| &toast.key)
    }
}

/// Feed tracker events into a shared queue until the tracker goes away
pub async fn follow(queue: Arc<Mutex<ToastQueue>>, mut events: broadcast::Receiver<TrackerEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let mut queue = queue.lock();
                queue.apply(&event);
                queue.prune();
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Toast queue fell behind, skipped {} events", skipped);
            }
            Err(RecvError::Closed) => {
                debug!("Tracker event channel closed");
                break;
            }
        }
    }
}
