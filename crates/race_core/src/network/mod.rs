//! Multiplayer synchronisation: who owns what, and when state goes out.

pub mod identity;
pub mod system;

pub use identity::NetworkIdentityComponent;
pub use system::{NETWORK_PRIORITY, NetworkEvent, NetworkSystem};
