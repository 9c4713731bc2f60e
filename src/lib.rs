pub mod chain;
pub mod config;
pub mod errors;
pub mod projector;
pub mod report;
pub mod toasts;
pub mod tracker;
pub mod utils;

// Re-export commonly used items
pub use chain::{
    ActionRequest, ChainClient, ChainError, DispatchError, ScriptedOutcome, SimulatedChain,
    StaticWallet, Submitted, TxStatus, TxStatusStream, WalletProvider,
};
pub use config::{load_config, ResolutionPolicy, ToastConfig, TrackerConfig};
pub use errors::{BlueHoleError, TrackerError};
pub use projector::{project, Aggregate, ApprovalCount, ConfirmedTotals, VoteTally, VoteTotals};
pub use toasts::{Toast, ToastQueue, ToastStatus};
pub use tracker::types::{
    ActionKind, ActionPayload, ActionState, ActorId, EntryKey, PendingAction, SubjectId,
    VoteDirection,
};
pub use tracker::{OptimisticTracker, Submission, SubmitOutcome, TrackerEvent};
