use std::sync::Arc;
use std::time::Duration;

use bluehole_core::chain::{SimulatedChain, StaticWallet};
use bluehole_core::config::TrackerConfig;
use bluehole_core::tracker::OptimisticTracker;

pub const LATENCY: Duration = Duration::from_millis(100);

pub struct Session {
    pub tracker: OptimisticTracker,
    pub chain: Arc<SimulatedChain>,
    pub wallet: Arc<StaticWallet>,
}

/// Tracker wired to a simulated chain with `alice` selected in the wallet
pub fn session(config: TrackerConfig) -> Session {
    let _ = env_logger::builder().is_test(true).try_init();

    let chain = Arc::new(SimulatedChain::new(LATENCY));
    let wallet = Arc::new(StaticWallet::connected("alice"));
    let tracker = OptimisticTracker::new(chain.clone(), wallet.clone(), config);
    Session {
        tracker,
        chain,
        wallet,
    }
}

/// Give spawned tasks a turn, moving the paused clock by a millisecond
#[allow(dead_code)]
pub async fn tick() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
