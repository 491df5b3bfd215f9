use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

pub use prompterlink_shared::{CLOSE_DISPLAY_REPLACED, CLOSE_DISPLAY_TAKEN};

use prompterlink_shared::{Message, SharedState};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// What the relay does when a display connects while another one holds the slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum DisplayPolicy {
    /// Keep the newcomer, close the previous display.
    Replace,
    /// Keep the incumbent, close the newcomer.
    Reject,
}

/// Frames queued for a connection's writer task.
#[derive(Clone, Debug, PartialEq)]
pub enum Outbound {
    Message(Message),
    Close { code: u16, reason: &'static str },
}

pub type PeerSender = mpsc::UnboundedSender<Outbound>;

pub struct DisplaySlot {
    pub id: Uuid,
    pub tx: PeerSender,
}

/// The relay session: canonical state plus who is connected.
pub struct Relay {
    pub state: SharedState,
    pub display: Option<DisplaySlot>,
    pub remotes: HashMap<Uuid, PeerSender>,
    pub policy: DisplayPolicy,
}

impl Relay {
    pub fn new(policy: DisplayPolicy) -> Self {
        Self {
            state: SharedState::default(),
            display: None,
            remotes: HashMap::new(),
            policy,
        }
    }

    pub fn display_id(&self) -> Option<Uuid> {
        self.display.as_ref().map(|slot| slot.id)
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub public_dir: PathBuf,
    pub lan_ip: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RwLock<Relay>>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig, policy: DisplayPolicy) -> Self {
        Self {
            relay: Arc::new(RwLock::new(Relay::new(policy))),
            config: Arc::new(config),
        }
    }
}
