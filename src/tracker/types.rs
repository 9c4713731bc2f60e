use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of a proposal, referendum or application
pub type SubjectId = String;

/// Wallet address of the acting principal
pub type ActorId = String;

/// Key under which an entry is tracked. At most one entry exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryKey {
    pub subject_id: SubjectId,
    pub actor_id: ActorId,
}

impl EntryKey {
    pub fn new(subject_id: impl Into<SubjectId>, actor_id: impl Into<ActorId>) -> Self {
        Self {
            subject_id: subject_id.into(),
            actor_id: actor_id.into(),
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subject_id, self.actor_id)
    }
}

/// Kind of user action being tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Vote,
    Approval,
    Rejection,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Vote => write!(f, "Vote"),
            ActionKind::Approval => write!(f, "Approval"),
            ActionKind::Rejection => write!(f, "Rejection"),
        }
    }
}

/// Direction of a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteDirection {
    Aye,
    Nay,
    Abstain,
}

impl fmt::Display for VoteDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteDirection::Aye => write!(f, "Aye"),
            VoteDirection::Nay => write!(f, "Nay"),
            VoteDirection::Abstain => write!(f, "Abstain"),
        }
    }
}

/// Kind-specific data carried by an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionPayload {
    /// A weighted vote. Weight is in the chain's smallest balance unit.
    Vote { direction: VoteDirection, weight: u128 },
    /// Approvals and rejections carry no data
    Empty,
}

impl ActionPayload {
    pub fn vote(direction: VoteDirection, weight: u128) -> Self {
        ActionPayload::Vote { direction, weight }
    }

    /// Whether this payload is well formed for the given kind
    pub fn matches(&self, kind: ActionKind) -> bool {
        match (kind, self) {
            (ActionKind::Vote, ActionPayload::Vote { weight, .. }) => *weight > 0,
            (ActionKind::Approval, ActionPayload::Empty)
            | (ActionKind::Rejection, ActionPayload::Empty) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ActionPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionPayload::Vote { direction, weight } => write!(f, "{} x{}", direction, weight),
            ActionPayload::Empty => write!(f, "-"),
        }
    }
}

/// Visible state of a tracked entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionState {
    Pending,
    Confirmed,
    Failed,
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionState::Pending => write!(f, "Pending"),
            ActionState::Confirmed => write!(f, "Confirmed"),
            ActionState::Failed => write!(f, "Failed"),
        }
    }
}

/// One user-initiated action that has not been reconciled away yet.
///
/// Entries live only in memory for the lifetime of their tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    pub subject_id: SubjectId,
    pub actor_id: ActorId,
    pub kind: ActionKind,
    pub payload: ActionPayload,
    pub created_at: DateTime<Utc>,
    pub state: ActionState,
    /// Transaction reference, set once a terminal status arrives
    pub result_ref: Option<String>,
    /// Only present in the Failed state
    pub failure_reason: Option<String>,
}

impl PendingAction {
    pub fn new(
        subject_id: impl Into<SubjectId>,
        actor_id: impl Into<ActorId>,
        kind: ActionKind,
        payload: ActionPayload,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            actor_id: actor_id.into(),
            kind,
            payload,
            created_at: Utc::now(),
            state: ActionState::Pending,
            result_ref: None,
            failure_reason: None,
        }
    }

    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.subject_id.clone(), self.actor_id.clone())
    }

    pub fn is_pending(&self) -> bool {
        self.state == ActionState::Pending
    }

    pub(crate) fn confirm(&mut self, result_ref: Option<String>) {
        self.state = ActionState::Confirmed;
        self.result_ref = result_ref;
        self.failure_reason = None;
    }

    pub(crate) fn fail(&mut self, result_ref: Option<String>, reason: String) {
        self.state = ActionState::Failed;
        self.result_ref = result_ref;
        self.failure_reason = Some(reason);
    }
}
