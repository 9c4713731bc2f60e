//! Collaborator contracts for the external chain client.
//!
//! The chain client reports progress of a submitted action as a stream of
//! [`TxStatus`] events. Callback-style clients feed a [`StatusSender`];
//! promise-style clients resolve a single status through
//! [`TxStatusStream::from_future`]. Either way the tracker only sees the
//! stream and [`await_terminal`] decides when it is done.

pub mod simulated;
pub mod wallet;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use log::trace;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::projector::ConfirmedTotals;
use crate::tracker::types::{ActionKind, ActionPayload, ActorId, EntryKey, SubjectId};

pub use simulated::{ScriptedOutcome, SimulatedChain};
pub use wallet::{StaticWallet, WalletProvider};

/// Module-level or raw error reported by the chain after dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchError {
    /// Error decoded against chain metadata
    Module {
        section: String,
        name: String,
        docs: String,
    },
    /// Undecodable error, carried as the client's raw description
    Other(String),
}

impl DispatchError {
    pub fn module(section: &str, name: &str, docs: &str) -> Self {
        DispatchError::Module {
            section: section.to_string(),
            name: name.to_string(),
            docs: docs.to_string(),
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Module { section, name, docs } if docs.is_empty() => {
                write!(f, "{}.{}", section, name)
            }
            DispatchError::Module { section, name, docs } => {
                write!(f, "{}.{}: {}", section, name, docs)
            }
            DispatchError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// Error type for chain client operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Failure while constructing or dispatching the call
    #[error("{0}")]
    Submission(String),

    /// The chain rejected the action after dispatch
    #[error("{0}")]
    Dispatch(DispatchError),

    /// The transaction left the pool without being included
    #[error("Transaction {0}")]
    Dropped(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Transaction status stream closed before a terminal status")]
    StreamClosed,

    #[error("No terminal status after {0} ms")]
    Timeout(u64),
}

/// Lifecycle events a submitted transaction goes through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Ready,
    Broadcast,
    InBlock {
        block_hash: String,
        dispatch_error: Option<DispatchError>,
    },
    Finalized {
        block_hash: String,
        dispatch_error: Option<DispatchError>,
    },
    Dropped,
    Invalid,
    Usurped,
}

impl TxStatus {
    /// Outcome carried by this status, if it is terminal.
    ///
    /// Finalization and any dispatch error are terminal. An in-block status
    /// without an error is not: the action can still be retracted.
    pub fn terminal_outcome(&self) -> Option<Result<(), ChainError>> {
        match self {
            TxStatus::Finalized { dispatch_error: None, .. } => Some(Ok(())),
            TxStatus::Finalized { dispatch_error: Some(err), .. }
            | TxStatus::InBlock { dispatch_error: Some(err), .. } => {
                Some(Err(ChainError::Dispatch(err.clone())))
            }
            TxStatus::Dropped => Some(Err(ChainError::Dropped("dropped".to_string()))),
            TxStatus::Invalid => Some(Err(ChainError::Dropped("invalid".to_string()))),
            TxStatus::Usurped => Some(Err(ChainError::Dropped("usurped".to_string()))),
            TxStatus::Ready | TxStatus::Broadcast | TxStatus::InBlock { .. } => None,
        }
    }
}

/// Stream of status updates for one submitted transaction
pub struct TxStatusStream {
    inner: BoxStream<'static, TxStatus>,
}

impl TxStatusStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = TxStatus> + Send + 'static,
    {
        Self { inner: stream.boxed() }
    }

    /// A stream that yields exactly one already-known status
    pub fn resolved(status: TxStatus) -> Self {
        Self::new(stream::iter(vec![status]))
    }

    /// Adapt a promise-style client that resolves once
    pub fn from_future<F>(fut: F) -> Self
    where
        F: Future<Output = TxStatus> + Send + 'static,
    {
        Self::new(stream::once(fut))
    }

    /// Adapt a callback-style client. Every call on the returned sender
    /// becomes one stream item; the stream ends when all senders drop.
    pub fn channel() -> (StatusSender, Self) {
        let (tx, rx) = mpsc::unbounded();
        (StatusSender { tx }, Self::new(rx))
    }
}

impl Stream for TxStatusStream {
    type Item = TxStatus;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<TxStatus>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for TxStatusStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxStatusStream").finish_non_exhaustive()
    }
}

/// Callback handle for clients that push status updates
#[derive(Clone)]
pub struct StatusSender {
    tx: mpsc::UnboundedSender<TxStatus>,
}

impl StatusSender {
    /// Push a status update. Updates sent after the receiver is gone are dropped.
    pub fn send(&self, status: TxStatus) {
        let _ = self.tx.unbounded_send(status);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// An action handed to the chain client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub subject_id: SubjectId,
    pub actor_id: ActorId,
    pub kind: ActionKind,
    pub payload: ActionPayload,
}

impl ActionRequest {
    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.subject_id.clone(), self.actor_id.clone())
    }
}

/// A signed transaction accepted by the client for dispatch
#[derive(Debug)]
pub struct Submitted {
    /// Transaction hash, used as the entry's result reference
    pub tx_hash: String,
    pub statuses: TxStatusStream,
}

/// External chain client. Implementations own signing, RPC and the wire protocol.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Sign and dispatch an action, returning its status stream
    async fn submit(&self, request: ActionRequest) -> Result<Submitted, ChainError>;

    /// Current confirmed totals for a subject
    async fn confirmed_totals(&self, subject_id: &str) -> Result<ConfirmedTotals, ChainError>;
}

/// Drive a status stream until the first terminal status.
///
/// Events after the terminal one are never read.
pub async fn await_terminal(mut statuses: TxStatusStream) -> Result<(), ChainError> {
    while let Some(status) = statuses.next().await {
        trace!("Transaction status: {:?}", status);
        if let Some(outcome) = status.terminal_outcome() {
            return outcome;
        }
    }
    Err(ChainError::StreamClosed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_block() -> TxStatus {
        TxStatus::InBlock {
            block_hash: "0x01".to_string(),
            dispatch_error: None,
        }
    }

    fn finalized(dispatch_error: Option<DispatchError>) -> TxStatus {
        TxStatus::Finalized {
            block_hash: "0x02".to_string(),
            dispatch_error,
        }
    }

    #[test]
    fn test_dispatch_error_prefers_decoded_description() {
        let decoded = DispatchError::module("democracy", "AlreadyVoting", "Already voting on this referendum");
        assert_eq!(decoded.to_string(), "democracy.AlreadyVoting: Already voting on this referendum");

        let bare = DispatchError::module("kyc", "NotFound", "");
        assert_eq!(bare.to_string(), "kyc.NotFound");

        let raw = DispatchError::Other("Module { index: 9, error: 3 }".to_string());
        assert_eq!(raw.to_string(), "Module { index: 9, error: 3 }");
    }

    #[test]
    fn test_terminal_classification() {
        assert!(TxStatus::Ready.terminal_outcome().is_none());
        assert!(in_block().terminal_outcome().is_none());
        assert_eq!(finalized(None).terminal_outcome(), Some(Ok(())));

        let err = DispatchError::Other("BadOrigin".to_string());
        let in_block_err = TxStatus::InBlock {
            block_hash: "0x01".to_string(),
            dispatch_error: Some(err.clone()),
        };
        assert_eq!(
            in_block_err.terminal_outcome(),
            Some(Err(ChainError::Dispatch(err)))
        );
        assert!(matches!(
            TxStatus::Usurped.terminal_outcome(),
            Some(Err(ChainError::Dropped(_)))
        ));
    }

    #[tokio::test]
    async fn test_first_terminal_status_wins() {
        let stream = TxStatusStream::new(stream::iter(vec![
            TxStatus::Ready,
            in_block(),
            finalized(None),
            finalized(Some(DispatchError::Other("late".to_string()))),
        ]));
        assert_eq!(await_terminal(stream).await, Ok(()));
    }

    #[tokio::test]
    async fn test_callback_style_stream() {
        let (sender, stream) = TxStatusStream::channel();
        sender.send(TxStatus::Broadcast);
        sender.send(TxStatus::InBlock {
            block_hash: "0x03".to_string(),
            dispatch_error: Some(DispatchError::module("treasury", "InsufficientProposersBalance", "")),
        });
        let result = await_terminal(stream).await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "treasury.InsufficientProposersBalance"
        );
    }

    #[tokio::test]
    async fn test_promise_style_stream() {
        let stream = TxStatusStream::from_future(async { finalized(None) });
        assert!(await_terminal(stream).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_stream_without_terminal_status() {
        let (sender, stream) = TxStatusStream::channel();
        sender.send(TxStatus::Ready);
        drop(sender);
        assert_eq!(await_terminal(stream).await, Err(ChainError::StreamClosed));
    }
}
