//! Display aggregates that blend confirmed chain totals with local pending actions.
//!
//! Only entries in the `Pending` state contribute. The projector cannot tell
//! whether a pending entry is already reflected in the confirmed totals; the
//! caller is expected to refetch totals after confirmation and let confirmed
//! entries expire.

use serde::{Deserialize, Serialize};

use crate::tracker::types::{ActionKind, ActionPayload, PendingAction, VoteDirection};

/// Fixed-point scale for approval percentages (100% == 10_000)
pub const BASIS_POINTS: u128 = 10_000;

/// Confirmed vote totals as reported by the chain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTotals {
    pub aye: u128,
    pub nay: u128,
    pub abstain: u128,
}

impl VoteTotals {
    pub fn new(aye: u128, nay: u128, abstain: u128) -> Self {
        Self { aye, nay, abstain }
    }

    pub fn total(&self) -> u128 {
        self.aye
            .saturating_add(self.nay)
            .saturating_add(self.abstain)
    }

    pub(crate) fn add(&mut self, direction: VoteDirection, weight: u128) {
        let bucket = match direction {
            VoteDirection::Aye => &mut self.aye,
            VoteDirection::Nay => &mut self.nay,
            VoteDirection::Abstain => &mut self.abstain,
        };
        *bucket = bucket.saturating_add(weight);
    }
}

/// Display-ready vote tally
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoteTally {
    pub aye: u128,
    pub nay: u128,
    pub abstain: u128,
    pub total: u128,
    /// Share of aye weight in percent, two decimals of precision
    pub approval_percentage: f64,
}

impl VoteTally {
    fn from_totals(totals: VoteTotals) -> Self {
        let total = totals.total();
        let basis_points = approval_basis_points(totals.aye, total);
        Self {
            aye: totals.aye,
            nay: totals.nay,
            abstain: totals.abstain,
            total,
            approval_percentage: basis_points as f64 / 100.0,
        }
    }
}

/// Approval and rejection counts for an application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalCount {
    pub approvals: u64,
    pub rejections: u64,
}

impl ApprovalCount {
    pub fn new(approvals: u64, rejections: u64) -> Self {
        Self { approvals, rejections }
    }
}

/// Confirmed totals fetched from the chain for one subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmedTotals {
    Votes(VoteTotals),
    Approvals(ApprovalCount),
}

/// Aggregate shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Aggregate {
    Votes(VoteTally),
    Approvals(ApprovalCount),
}

/// `aye * 10_000 / total`, truncated. Zero when there is no weight at all.
pub fn approval_basis_points(aye: u128, total: u128) -> u128 {
    if total == 0 {
        return 0;
    }
    match aye.checked_mul(BASIS_POINTS) {
        Some(scaled) => scaled / total,
        // Only reachable for weights near u128::MAX
        None => aye / (total / BASIS_POINTS).max(1),
    }
}

/// Fold pending entries into confirmed totals
pub fn project(confirmed: &ConfirmedTotals, entries: &[PendingAction]) -> Aggregate {
    match confirmed {
        ConfirmedTotals::Votes(totals) => Aggregate::Votes(project_votes(totals, entries)),
        ConfirmedTotals::Approvals(count) => {
            Aggregate::Approvals(project_approvals(count, entries))
        }
    }
}

pub fn project_votes(confirmed: &VoteTotals, entries: &[PendingAction]) -> VoteTally {
    let mut totals = *confirmed;
    for entry in entries.iter().filter(|e| e.is_pending()) {
        if let (ActionKind::Vote, ActionPayload::Vote { direction, weight }) = (entry.kind, entry.payload) {
            totals.add(direction, weight);
        }
    }
    VoteTally::from_totals(totals)
}

pub fn project_approvals(confirmed: &ApprovalCount, entries: &[PendingAction]) -> ApprovalCount {
    let mut count = *confirmed;
    for entry in entries.iter().filter(|e| e.is_pending()) {
        match entry.kind {
            ActionKind::Approval => count.approvals = count.approvals.saturating_add(1),
            ActionKind::Rejection => count.rejections = count.rejections.saturating_add(1),
            ActionKind::Vote => {}
        }
    }
    count
}
