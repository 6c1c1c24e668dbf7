pub mod blacklist;
pub mod config;
pub mod message;
pub mod network;
pub mod reconciler;
pub mod store;

pub use blacklist::PeerBlacklist;
pub use config::OverlayConfig;
pub use message::{OverlayMessage, Topic};
pub use network::{OverlayCommand, OverlayHandle, OverlayNetwork};
pub use reconciler::{run_reconciler, ReconcileSource};
pub use store::{ContentError, ContentStore};
