//! Messages exchanged between race clients through the room relay.
//!
//! Every frame on the wire has the shape
//!
//! ```text
//! { "type": "<kind>", "senderId": "...", "entityId": "...", "timestamp": 0.0, "data": { ... } }
//! ```
//!
//! `type` selects the [`MessagePayload`] variant and `data` carries that
//! variant's statically shaped body. Vectors travel as `{x,y,z}` and
//! quaternions as `{x,y,z,w}`.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

// ── Envelope ────────────────────────────────────────────────────────────────

/// A single relayed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMessage {
    /// Client id of the peer that produced the message.
    pub sender_id: String,
    /// Network id of the entity the message is about.
    pub entity_id: String,
    /// Sender's wall-clock time in milliseconds.
    pub timestamp: f64,
    /// Kind tag plus body.
    #[serde(flatten)]
    pub payload: MessagePayload,
}

impl NetworkMessage {
    #[must_use]
    pub fn new(
        sender_id: impl Into<String>,
        entity_id: impl Into<String>,
        timestamp: f64,
        payload: MessagePayload,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            entity_id: entity_id.into(),
            timestamp,
            payload,
        }
    }

    /// The wire name of this message's kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

// ── Payloads ────────────────────────────────────────────────────────────────

/// Message body, keyed by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum MessagePayload {
    TransformUpdate(TransformData),
    VehicleUpdate(VehicleData),
    PlayerJoin(PlayerData),
    PlayerLeave(PlayerData),
    RaceStart(RaceStartData),
    RaceEnd(RaceEndData),
    CheckpointPassed(CheckpointData),
    LapCompleted(LapData),
}

impl MessagePayload {
    /// The wire name of this kind, as it appears in the `type` field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TransformUpdate(_) => "transform-update",
            Self::VehicleUpdate(_) => "vehicle-update",
            Self::PlayerJoin(_) => "player-join",
            Self::PlayerLeave(_) => "player-leave",
            Self::RaceStart(_) => "race-start",
            Self::RaceEnd(_) => "race-end",
            Self::CheckpointPassed(_) => "checkpoint-passed",
            Self::LapCompleted(_) => "lap-completed",
        }
    }

    /// Whether this is one of the race-progress notifications.
    #[must_use]
    pub fn is_race_notification(&self) -> bool {
        matches!(
            self,
            Self::RaceStart(_) | Self::RaceEnd(_) | Self::CheckpointPassed(_) | Self::LapCompleted(_)
        )
    }
}

/// Body of `transform-update`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformData {
    pub position: WireVec3,
    pub rotation: WireQuat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<WireVec3>,
}

/// Body of `vehicle-update`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleData {
    pub velocity: WireVec3,
    pub steering_angle: f32,
    pub engine_force: f32,
    pub braking_force: f32,
}

/// Body of `player-join` and `player-leave`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerData {
    pub player_id: String,
    #[serde(default)]
    pub name: String,
}

/// Body of `race-start`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceStartData {
    pub total_laps: u32,
}

/// Body of `race-end`: network ids in finishing order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceEndData {
    pub finish_order: Vec<String>,
}

/// Body of `checkpoint-passed`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointData {
    pub checkpoint_index: u32,
}

/// Body of `lap-completed`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LapData {
    pub lap: u32,
    /// Lap duration in milliseconds.
    pub lap_time: f64,
}

// ── Wire math ───────────────────────────────────────────────────────────────

/// A vector as `{x, y, z}`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WireVec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3> for WireVec3 {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<WireVec3> for Vec3 {
    fn from(v: WireVec3) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

/// A quaternion as `{x, y, z, w}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WireQuat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for WireQuat {
    fn default() -> Self {
        Quat::IDENTITY.into()
    }
}

impl From<Quat> for WireQuat {
    fn from(q: Quat) -> Self {
        Self {
            x: q.x,
            y: q.y,
            z: q.z,
            w: q.w,
        }
    }
}

impl From<WireQuat> for Quat {
    /// Normalised on the way in; the sender's float error is not trusted.
    fn from(q: WireQuat) -> Self {
        Quat::from_xyzw(q.x, q.y, q.z, q.w).normalize()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::codec::{decode, decode_json, encode, encode_json};

    fn transform_message() -> NetworkMessage {
        NetworkMessage::new(
            "client-a",
            "car-1",
            1_000.0,
            MessagePayload::TransformUpdate(TransformData {
                position: Vec3::new(1.0, 0.0, 2.0).into(),
                rotation: Quat::IDENTITY.into(),
                scale: None,
            }),
        )
    }

    #[test]
    fn test_transform_update_wire_shape() {
        let value: serde_json::Value =
            serde_json::from_slice(&encode_json(&transform_message()).unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "transform-update",
                "senderId": "client-a",
                "entityId": "car-1",
                "timestamp": 1000.0,
                "data": {
                    "position": { "x": 1.0, "y": 0.0, "z": 2.0 },
                    "rotation": { "x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0 }
                }
            })
        );
    }

    #[test]
    fn test_vehicle_update_from_browser_json() {
        let raw = br#"{
            "type": "vehicle-update",
            "senderId": "browser",
            "entityId": "car-2",
            "timestamp": 12.5,
            "data": {
                "velocity": { "x": 0, "y": 0, "z": 10 },
                "steeringAngle": 0.1,
                "engineForce": 4000,
                "brakingForce": 0
            }
        }"#;
        let msg: NetworkMessage = decode_json(raw).unwrap();
        assert_eq!(msg.kind(), "vehicle-update");
        let MessagePayload::VehicleUpdate(data) = msg.payload else {
            panic!("expected vehicle-update");
        };
        assert_eq!(Vec3::from(data.velocity), Vec3::new(0.0, 0.0, 10.0));
        assert_eq!(data.engine_force, 4000.0);
    }

    #[test]
    fn test_malformed_messages_rejected() {
        // Unknown kind.
        assert!(decode_json::<NetworkMessage>(
            br#"{"type":"teleport","senderId":"a","entityId":"b","timestamp":0,"data":{}}"#
        )
        .is_err());
        // Body shaped for a different kind.
        assert!(decode_json::<NetworkMessage>(
            br#"{"type":"transform-update","senderId":"a","entityId":"b","timestamp":0,"data":{"lap":1}}"#
        )
        .is_err());
        // Missing envelope field.
        assert!(decode_json::<NetworkMessage>(
            br#"{"type":"race-end","entityId":"b","timestamp":0,"data":{"finishOrder":[]}}"#
        )
        .is_err());
    }

    #[test]
    fn test_messagepack_carries_same_model() {
        let msg = NetworkMessage::new(
            "client-a",
            "car-1",
            5.0,
            MessagePayload::LapCompleted(LapData {
                lap: 2,
                lap_time: 61_250.0,
            }),
        );
        let restored: NetworkMessage = decode(&encode(&msg).unwrap()).unwrap();
        assert_eq!(restored, msg);
    }

    #[test]
    fn test_race_notification_classification() {
        assert!(MessagePayload::RaceEnd(RaceEndData::default()).is_race_notification());
        assert!(!MessagePayload::PlayerJoin(PlayerData::default()).is_race_notification());
        assert!(!transform_message().payload.is_race_notification());
    }
}
