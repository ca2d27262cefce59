//! The transport seam between the simulation and the room relay.

use crate::error::NetError;
use crate::messages::NetworkMessage;

/// A connected room transport.
///
/// Connecting is the async constructor of each concrete implementation
/// ([`NatsTransport::connect`](crate::NatsTransport::connect),
/// [`RelayHub::join`](crate::RelayHub::join)). Once built, a transport is
/// driven synchronously from inside a tick: `send` must not block and
/// `receive` drains whatever has arrived since the previous call.
///
/// Delivery is fire-and-forget. There is no acknowledgement and no retry; a
/// failed send is the caller's to log and drop.
pub trait Transport: Send {
    /// This client's id, stamped as `senderId` on outgoing messages.
    fn local_id(&self) -> &str;

    fn is_connected(&self) -> bool;

    /// Queue `message` for every other participant of the room.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Disconnected`] once the transport is closed.
    fn send(&mut self, message: &NetworkMessage) -> Result<(), NetError>;

    /// Take every message received since the last call, in arrival order.
    fn receive(&mut self) -> Vec<NetworkMessage>;

    /// Leave the room. Further sends fail; further receives return nothing.
    fn disconnect(&mut self);
}

/// Generate a fresh random client id.
#[must_use]
pub fn new_client_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
