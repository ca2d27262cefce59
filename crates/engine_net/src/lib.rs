//! # engine_net
//!
//! Room-scoped networking for synchronised race worlds.
//!
//! This crate provides:
//!
//! - [`messages`]: the tagged [`NetworkMessage`] wire model.
//! - [`codec`]: JSON and MessagePack encoding.
//! - [`transport`]: the [`Transport`] seam the simulation drives.
//! - [`relay`]: an in-process [`RelayHub`] room registry.
//! - [`connection`]: a NATS-backed [`NatsTransport`].
//! - [`subjects`]: NATS subject builders.
//! - [`error`]: network-layer error types.

pub mod codec;
pub mod connection;
pub mod error;
pub mod messages;
pub mod relay;
pub mod subjects;
pub mod transport;

pub use codec::{WireFormat, decode, decode_json, encode, encode_json};
pub use connection::{NatsConfig, NatsTransport};
pub use error::NetError;
pub use messages::{
    CheckpointData, LapData, MessagePayload, NetworkMessage, PlayerData, RaceEndData,
    RaceStartData, TransformData, VehicleData, WireQuat, WireVec3,
};
pub use relay::{MemoryTransport, RelayHub};
pub use transport::{Transport, new_client_id};
