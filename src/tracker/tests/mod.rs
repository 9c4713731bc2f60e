use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::chain::{
    ActionRequest, ChainClient, ChainError, DispatchError, StaticWallet, StatusSender, Submitted,
    TxStatus, TxStatusStream,
};
use crate::config::TrackerConfig;
use crate::projector::{ConfirmedTotals, VoteTotals};
use crate::tracker::OptimisticTracker;


/// Chain client whose submissions are resolved by hand from the test
#[derive(Default)]
pub struct ManualChain {
    submissions: Mutex<Vec<(ActionRequest, StatusSender)>>,
}

impl ManualChain {
    pub fn submitted(&self) -> usize {
        self.submissions.lock().len()
    }

    pub fn request(&self, index: usize) -> ActionRequest {
        self.submissions.lock()[index].0.clone()
    }

    pub fn push(&self, index: usize, status: TxStatus) {
        self.submissions.lock()[index].1.send(status);
    }

    pub fn finalize(&self, index: usize) {
        self.push(index, TxStatus::InBlock {
            block_hash: format!("0xb{}", index),
            dispatch_error: None,
        });
        self.push(index, finalized(index, None));
    }

    pub fn reject(&self, index: usize, err: DispatchError) {
        self.push(index, TxStatus::InBlock {
            block_hash: format!("0xb{}", index),
            dispatch_error: Some(err),
        });
    }

    /// Wait until the spawned submission tasks have reached the client
    pub async fn wait_for(&self, count: usize) {
        while self.submitted() < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl ChainClient for ManualChain {
    async fn submit(&self, request: ActionRequest) -> Result<Submitted, ChainError> {
        let (sender, statuses) = TxStatusStream::channel();
        let mut submissions = self.submissions.lock();
        let tx_hash = format!("0xtx{}", submissions.len());
        submissions.push((request, sender));
        Ok(Submitted { tx_hash, statuses })
    }

    async fn confirmed_totals(&self, _subject_id: &str) -> Result<ConfirmedTotals, ChainError> {
        Ok(ConfirmedTotals::Votes(VoteTotals::default()))
    }
}

pub fn finalized(index: usize, dispatch_error: Option<DispatchError>) -> TxStatus {
    TxStatus::Finalized {
        block_hash: format!("0xf{}", index),
        dispatch_error,
    }
}

pub fn manual_tracker(config: TrackerConfig) -> (OptimisticTracker, Arc<ManualChain>, Arc<StaticWallet>) {
    let chain = Arc::new(ManualChain::default());
    let wallet = Arc::new(StaticWallet::connected("A"));
    let tracker = OptimisticTracker::new(chain.clone(), wallet.clone(), config);
    (tracker, chain, wallet)
}

/// Let spawned tasks run without moving the paused clock
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
