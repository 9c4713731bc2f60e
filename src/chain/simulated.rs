//! In-process chain client for demos and integration tests.
//!
//! Each submission plays a scripted outcome after a latency with optional jitter. Finalized
//! actions are folded into the subject's confirmed totals, replacing any
//! earlier action by the same actor the way the runtime pallets do.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use blake2::{Blake2s256, Digest};
use log::{debug, trace};
use parking_lot::Mutex;
use rand::Rng;

use crate::chain::{
    ActionRequest, ChainClient, ChainError, DispatchError, StatusSender, Submitted, TxStatus,
    TxStatusStream,
};
use crate::projector::{ApprovalCount, ConfirmedTotals, VoteTotals};
use crate::tracker::types::{ActionKind, ActionPayload, ActorId, SubjectId};

/// What the simulated chain does with one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedOutcome {
    /// Ready, in block, finalized
    Finalize,
    /// Included in a block with a dispatch error
    Reject(DispatchError),
    /// Refused before a transaction hash exists
    SubmissionError(String),
    /// Dropped from the pool after broadcast
    Drop,
    /// Broadcast and then silence
    Stall,
}

struct ConfirmedAction {
    kind: ActionKind,
    payload: ActionPayload,
}

#[derive(Default)]
struct LedgerState {
    baselines: HashMap<SubjectId, ConfirmedTotals>,
    confirmed: HashMap<SubjectId, HashMap<ActorId, ConfirmedAction>>,
    scripts: HashMap<(SubjectId, ActorId), VecDeque<ScriptedOutcome>>,
    /// Senders of stalled submissions, kept so their streams stay open
    stalled: Vec<StatusSender>,
}

pub struct SimulatedChain {
    latency: Duration,
    /// Upper bound of the random delay added to each status step
    jitter: Duration,
    default_outcome: ScriptedOutcome,
    nonce: AtomicU64,
    state: Arc<Mutex<LedgerState>>,
}

impl SimulatedChain {
    /// A chain that finalizes everything, waiting `latency` per status step
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            jitter: Duration::ZERO,
            default_outcome: ScriptedOutcome::Finalize,
            nonce: AtomicU64::new(0),
            state: Arc::new(Mutex::new(LedgerState::default())),
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_default_outcome(mut self, outcome: ScriptedOutcome) -> Self {
        self.default_outcome = outcome;
        self
    }

    /// Confirmed totals a subject starts from
    pub fn seed_totals(&self, subject_id: impl Into<SubjectId>, totals: ConfirmedTotals) {
        self.state.lock().baselines.insert(subject_id.into(), totals);
    }

    /// Queue an outcome for the next submission by `actor_id` on `subject_id`
    pub fn script(&self, subject_id: &str, actor_id: &str, outcome: ScriptedOutcome) {
        self.state
            .lock()
            .scripts
            .entry((subject_id.to_string(), actor_id.to_string()))
            .or_default()
            .push_back(outcome);
    }

    fn next_outcome(&self, request: &ActionRequest) -> ScriptedOutcome {
        let mut state = self.state.lock();
        state
            .scripts
            .get_mut(&(request.subject_id.clone(), request.actor_id.clone()))
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.default_outcome.clone())
    }

    fn step_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.latency;
        }
        let extra = rand::thread_rng().gen_range(0..=self.jitter.as_millis() as u64);
        self.latency + Duration::from_millis(extra)
    }

    fn tx_hash(request: &ActionRequest, nonce: u64) -> String {
        let mut hasher = Blake2s256::new();
        hasher.update(request.subject_id.as_bytes());
        hasher.update(request.actor_id.as_bytes());
        hasher.update(request.kind.to_string().as_bytes());
        hasher.update(nonce.to_le_bytes());
        format!("0x{}", hex::encode(hasher.finalize()))
    }

    fn block_hash(tx_hash: &str, stage: &str) -> String {
        let mut hasher = Blake2s256::new();
        hasher.update(tx_hash.as_bytes());
        hasher.update(stage.as_bytes());
        format!("0x{}", hex::encode(hasher.finalize()))
    }

    fn apply(state: &Mutex<LedgerState>, request: &ActionRequest) {
        debug!("Simulated chain applying {} on {}", request.kind, request.key());
        state
            .lock()
            .confirmed
            .entry(request.subject_id.clone())
            .or_default()
            .insert(
                request.actor_id.clone(),
                ConfirmedAction {
                    kind: request.kind,
                    payload: request.payload,
                },
            );
    }
}

#[async_trait]
impl ChainClient for SimulatedChain {
    async fn submit(&self, request: ActionRequest) -> Result<Submitted, ChainError> {
        let outcome = self.next_outcome(&request);
        if let ScriptedOutcome::SubmissionError(msg) = &outcome {
            return Err(ChainError::Submission(msg.clone()));
        }

        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        let tx_hash = Self::tx_hash(&request, nonce);
        let (sender, statuses) = TxStatusStream::channel();
        trace!("Simulated submission {} -> {:?}", tx_hash, outcome);

        sender.send(TxStatus::Ready);
        if outcome == ScriptedOutcome::Stall {
            sender.send(TxStatus::Broadcast);
            let mut state = self.state.lock();
            // Streams the caller has already dropped need no keeping alive
            state.stalled.retain(|stalled| !stalled.is_closed());
            state.stalled.push(sender);
            drop(state);
            return Ok(Submitted { tx_hash, statuses });
        }

        let delays = [self.step_delay(), self.step_delay(), self.step_delay()];
        let in_block = Self::block_hash(&tx_hash, "in-block");
        let finalized = Self::block_hash(&tx_hash, "finalized");
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            tokio::time::sleep(delays[0]).await;
            sender.send(TxStatus::Broadcast);
            tokio::time::sleep(delays[1]).await;
            match outcome {
                ScriptedOutcome::Finalize => {
                    sender.send(TxStatus::InBlock {
                        block_hash: in_block,
                        dispatch_error: None,
                    });
                    tokio::time::sleep(delays[2]).await;
                    // Totals change before anyone can observe finalization
                    Self::apply(&state, &request);
                    sender.send(TxStatus::Finalized {
                        block_hash: finalized,
                        dispatch_error: None,
                    });
                }
                ScriptedOutcome::Reject(err) => {
                    sender.send(TxStatus::InBlock {
                        block_hash: in_block,
                        dispatch_error: Some(err.clone()),
                    });
                    tokio::time::sleep(delays[2]).await;
                    sender.send(TxStatus::Finalized {
                        block_hash: finalized,
                        dispatch_error: Some(err),
                    });
                }
                ScriptedOutcome::Drop => sender.send(TxStatus::Dropped),
                ScriptedOutcome::Stall | ScriptedOutcome::SubmissionError(_) => {}
            }
        });

        Ok(Submitted { tx_hash, statuses })
    }

    async fn confirmed_totals(&self, subject_id: &str) -> Result<ConfirmedTotals, ChainError> {
        let state = self.state.lock();
        let confirmed = state.confirmed.get(subject_id);
        let baseline = state.baselines.get(subject_id).copied().or_else(|| {
            // Infer the aggregate kind from what has been confirmed so far
            confirmed
                .and_then(|actions| actions.values().next())
                .map(|action| match action.kind {
                    ActionKind::Vote => ConfirmedTotals::Votes(VoteTotals::default()),
                    ActionKind::Approval | ActionKind::Rejection => {
                        ConfirmedTotals::Approvals(ApprovalCount::default())
                    }
                })
        });

        let mut totals = baseline.ok_or_else(|| {
            ChainError::Query(format!("unknown subject {}", subject_id))
        })?;

        for action in confirmed.into_iter().flat_map(|actions| actions.values()) {
            match (&mut totals, action.kind, action.payload) {
                (
                    ConfirmedTotals::Votes(votes),
                    ActionKind::Vote,
                    ActionPayload::Vote { direction, weight },
                ) => votes.add(direction, weight),
                (ConfirmedTotals::Approvals(count), ActionKind::Approval, _) => {
                    count.approvals = count.approvals.saturating_add(1)
                }
                (ConfirmedTotals::Approvals(count), ActionKind::Rejection, _) => {
                    count.rejections = count.rejections.saturating_add(1)
                }
                _ => {}
            }
        }

        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::await_terminal;
    use crate::tracker::types::VoteDirection;

    fn vote_request(actor: &str, direction: VoteDirection, weight: u128) -> ActionRequest {
        ActionRequest {
            subject_id: "REF-12".to_string(),
            actor_id: actor.to_string(),
            kind: ActionKind::Vote,
            payload: ActionPayload::vote(direction, weight),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_finalize_updates_totals() {
        let chain = SimulatedChain::new(Duration::from_millis(500));
        chain.seed_totals("REF-12", ConfirmedTotals::Votes(VoteTotals::new(100, 50, 0)));

        let submitted = chain
            .submit(vote_request("A", VoteDirection::Aye, 25))
            .await
            .unwrap();
        assert!(submitted.tx_hash.starts_with("0x"));
        assert_eq!(submitted.tx_hash.len(), 66);
        assert!(await_terminal(submitted.statuses).await.is_ok());

        let totals = chain.confirmed_totals("REF-12").await.unwrap();
        assert_eq!(totals, ConfirmedTotals::Votes(VoteTotals::new(125, 50, 0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_revote_replaces_previous_vote() {
        let chain = SimulatedChain::new(Duration::from_millis(10));

        for direction in [VoteDirection::Aye, VoteDirection::Nay] {
            let submitted = chain.submit(vote_request("A", direction, 7)).await.unwrap();
            await_terminal(submitted.statuses).await.unwrap();
        }

        let totals = chain.confirmed_totals("REF-12").await.unwrap();
        assert_eq!(totals, ConfirmedTotals::Votes(VoteTotals::new(0, 7, 0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_outcomes_are_consumed_in_order() {
        let chain = SimulatedChain::new(Duration::from_millis(10));
        let err = DispatchError::module("democracy", "InsufficientFunds", "Too high a balance was provided");
        chain.script("REF-12", "A", ScriptedOutcome::SubmissionError("nonce too low".into()));
        chain.script("REF-12", "A", ScriptedOutcome::Reject(err.clone()));

        let first = chain.submit(vote_request("A", VoteDirection::Aye, 1)).await;
        assert_eq!(first.unwrap_err(), ChainError::Submission("nonce too low".into()));

        let second = chain.submit(vote_request("A", VoteDirection::Aye, 1)).await.unwrap();
        assert_eq!(await_terminal(second.statuses).await, Err(ChainError::Dispatch(err)));

        // Script exhausted, falls back to the default
        let third = chain.submit(vote_request("A", VoteDirection::Aye, 1)).await.unwrap();
        assert!(await_terminal(third.statuses).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_subject_query_fails() {
        let chain = SimulatedChain::new(Duration::from_millis(10));
        assert!(matches!(
            chain.confirmed_totals("nothing").await,
            Err(ChainError::Query(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_submission_never_terminates() {
        let chain = SimulatedChain::new(Duration::from_millis(10))
            .with_default_outcome(ScriptedOutcome::Stall);
        let submitted = chain.submit(vote_request("A", VoteDirection::Aye, 1)).await.unwrap();

        let waited = tokio::time::timeout(Duration::from_secs(60), await_terminal(submitted.statuses)).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_abandoned_stalls_are_released() {
        let chain = SimulatedChain::new(Duration::from_millis(10))
            .with_default_outcome(ScriptedOutcome::Stall);

        let first = chain.submit(vote_request("A", VoteDirection::Aye, 1)).await.unwrap();
        drop(first);
        let _second = chain.submit(vote_request("B", VoteDirection::Aye, 1)).await.unwrap();

        assert_eq!(chain.state.lock().stalled.len(), 1);
    }

    #[tokio::test]
    async fn test_approval_counts_saturate() {
        let chain = SimulatedChain::new(Duration::from_millis(10));
        chain.seed_totals("APP-9", ConfirmedTotals::Approvals(ApprovalCount::new(u64::MAX, 0)));
        SimulatedChain::apply(
            &chain.state,
            &ActionRequest {
                subject_id: "APP-9".to_string(),
                actor_id: "A".to_string(),
                kind: ActionKind::Approval,
                payload: ActionPayload::Empty,
            },
        );

        let totals = chain.confirmed_totals("APP-9").await.unwrap();
        assert_eq!(totals, ConfirmedTotals::Approvals(ApprovalCount::new(u64::MAX, 0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_jitter_bounds_resolution_time() {
        let chain = SimulatedChain::new(Duration::from_millis(100)).with_jitter(Duration::from_millis(50));
        let start = tokio::time::Instant::now();
        let submitted = chain.submit(vote_request("A", VoteDirection::Aye, 1)).await.unwrap();
        await_terminal(submitted.statuses).await.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed <= Duration::from_millis(450));
    }
}
