//! Wire codecs.
//!
//! Browser peers speak JSON; native peers may opt into MessagePack for
//! compact binary frames. Both go through the same serde model, so a
//! malformed or mis-shaped payload is rejected here, at the decode boundary,
//! and never reaches the simulation.

use serde::{Deserialize, Serialize};

use crate::error::NetError;

/// Encode a value to MessagePack bytes.
///
/// # Errors
///
/// Returns [`NetError::Encode`] if serialisation fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, NetError> {
    rmp_serde::to_vec_named(value).map_err(NetError::Encode)
}

/// Decode a value from MessagePack bytes.
///
/// # Errors
///
/// Returns [`NetError::Decode`] if deserialisation fails.
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, NetError> {
    rmp_serde::from_slice(bytes).map_err(NetError::Decode)
}

/// Encode a value to JSON bytes.
///
/// # Errors
///
/// Returns [`NetError::Json`] if serialisation fails.
pub fn encode_json<T: Serialize>(value: &T) -> Result<Vec<u8>, NetError> {
    serde_json::to_vec(value).map_err(NetError::Json)
}

/// Decode a value from JSON bytes.
///
/// # Errors
///
/// Returns [`NetError::Json`] if the input is not valid JSON of the expected
/// shape.
pub fn decode_json<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, NetError> {
    serde_json::from_slice(bytes).map_err(NetError::Json)
}

/// Which encoding a transport puts on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// UTF-8 JSON, the format browser clients use.
    #[default]
    Json,
    /// MessagePack with named fields.
    MessagePack,
}

impl WireFormat {
    /// Encode `value` in this format.
    ///
    /// # Errors
    ///
    /// Returns [`NetError`] if serialisation fails.
    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>, NetError> {
        match self {
            Self::Json => encode_json(value),
            Self::MessagePack => encode(value),
        }
    }

    /// Decode `bytes` in this format.
    ///
    /// # Errors
    ///
    /// Returns [`NetError`] if the bytes are malformed.
    pub fn decode<'a, T: Deserialize<'a>>(self, bytes: &'a [u8]) -> Result<T, NetError> {
        match self {
            Self::Json => decode_json(bytes),
            Self::MessagePack => decode(bytes),
        }
    }
}
