use log::debug;
use parking_lot::RwLock;

use crate::tracker::types::ActorId;

/// Source of the currently selected wallet account
#[cfg_attr(test, mockall::automock)]
pub trait WalletProvider: Send + Sync {
    /// Address of the selected account, if any
    fn selected_actor(&self) -> Option<ActorId>;

    fn is_connected(&self) -> bool;
}

/// The selected actor, only while the wallet is connected
pub fn connected_actor(wallet: &dyn WalletProvider) -> Option<ActorId> {
    if wallet.is_connected() {
        wallet.selected_actor()
    } else {
        None
    }
}

#[derive(Debug, Default)]
struct WalletState {
    connected: bool,
    selected: Option<ActorId>,
}

/// In-process wallet whose selected account is switched explicitly
#[derive(Debug, Default)]
pub struct StaticWallet {
    state: RwLock<WalletState>,
}

impl StaticWallet {
    /// A wallet with no account selected
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// A connected wallet with the given account selected
    pub fn connected(actor: impl Into<ActorId>) -> Self {
        Self {
            state: RwLock::new(WalletState {
                connected: true,
                selected: Some(actor.into()),
            }),
        }
    }

    /// Connect and select an account
    pub fn select(&self, actor: impl Into<ActorId>) {
        let actor = actor.into();
        debug!("Selecting wallet account {}", actor);
        let mut state = self.state.write();
        state.connected = true;
        state.selected = Some(actor);
    }

    pub fn disconnect(&self) {
        debug!("Disconnecting wallet");
        let mut state = self.state.write();
        state.connected = false;
        state.selected = None;
    }
}

impl WalletProvider for StaticWallet {
    fn selected_actor(&self) -> Option<ActorId> {
        self.state.read().selected.clone()
    }

    fn is_connected(&self) -> bool {
        self.state.read().connected
    }
}
