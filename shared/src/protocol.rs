//! JSON wire protocol.
//!
//! Every WebSocket text frame carries one envelope `{"type": ..., "payload":
//! {...}}`. Both directions are closed sum types, so dispatch is an
//! exhaustive `match` rather than string comparison on the type field.

use crate::player::Facing;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinPayload {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedPayload {
    pub name: String,
    pub color: String,
}

/// Advisory self-report of a client's predicted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionPayload {
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub facing: Facing,
    pub on_ground: bool,
    /// Accepted for compatibility and ignored by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<u32>,
}

impl PositionPayload {
    /// Rejects reports carrying NaN or infinities.
    pub fn is_finite(&self) -> bool {
        [self.x, self.y, self.vel_x, self.vel_y]
            .iter()
            .all(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirePayload {
    pub x: f32,
    pub y: f32,
    pub direction: Facing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub name: String,
    pub color: String,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub facing: Facing,
    pub on_ground: bool,
    pub health: u32,
    pub kill_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletState {
    pub id: String,
    pub owner_name: String,
    pub x: f32,
    pub y: f32,
    pub direction: Facing,
}

/// Full canonical snapshot broadcast once per server tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatePayload {
    pub players: Vec<PlayerState>,
    pub bullets: Vec<BulletState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum ClientMessage {
    Join(JoinPayload),
    Position(PositionPayload),
    Fire(FirePayload),
    Leave,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum ServerMessage {
    Joined(JoinedPayload),
    State(StatePayload),
    Error(ErrorPayload),
}

impl ServerMessage {
    /// Shorthand for an `error` message.
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorPayload {
            message: message.into(),
        })
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("binary frames are not supported")]
    BinaryFrame,
}

pub fn encode_client(msg: &ClientMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(msg)?)
}

pub fn encode_server(msg: &ServerMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(msg)?)
}

/// Parses one text frame. Unknown types and malformed payloads are errors.
pub fn decode_client(text: &str) -> Result<ClientMessage, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

pub fn decode_server(text: &str) -> Result<ServerMessage, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_envelope() {
        let msg = decode_client(r#"{"type":"join","payload":{"name":"alice"}}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Join(JoinPayload {
                name: "alice".into()
            })
        );
    }

    #[test]
    fn test_position_uses_camel_case_and_optional_health() {
        let text = r#"{"type":"position","payload":{"x":1.5,"y":2,"velX":-3,"velY":4,"facing":-1,"onGround":true}}"#;
        match decode_client(text).unwrap() {
            ClientMessage::Position(p) => {
                assert_eq!((p.x, p.y, p.vel_x, p.vel_y), (1.5, 2.0, -3.0, 4.0));
                assert_eq!(p.facing, Facing::Left);
                assert!(p.on_ground);
                assert_eq!(p.health, None);
            }
            other => panic!("unexpected message {other:?}"),
        }

        let with_health = r#"{"type":"position","payload":{"x":0,"y":0,"velX":0,"velY":0,"facing":1,"onGround":false,"health":3}}"#;
        match decode_client(with_health).unwrap() {
            ClientMessage::Position(p) => assert_eq!(p.health, Some(3)),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_leave_without_payload() {
        assert_eq!(decode_client(r#"{"type":"leave"}"#).unwrap(), ClientMessage::Leave);
    }

    #[test]
    fn test_invalid_facing_is_rejected() {
        let text = r#"{"type":"fire","payload":{"x":0,"y":0,"direction":0}}"#;
        assert!(matches!(decode_client(text), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(decode_client(r#"{"type":"teleport","payload":{}}"#).is_err());
        assert!(decode_client("not json").is_err());
    }

    #[test]
    fn test_state_wire_shape() {
        let msg = ServerMessage::State(StatePayload {
            players: vec![PlayerState {
                name: "bob".into(),
                color: "#4ECDC4".into(),
                x: 10.0,
                y: 20.0,
                vel_x: 0.0,
                vel_y: 0.0,
                facing: Facing::Right,
                on_ground: true,
                health: 3,
                kill_count: 1,
            }],
            bullets: vec![BulletState {
                id: "bob_1".into(),
                owner_name: "bob".into(),
                x: 50.0,
                y: 30.0,
                direction: Facing::Left,
            }],
        });
        let value: serde_json::Value = serde_json::from_str(&encode_server(&msg).unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "state",
                "payload": {
                    "players": [{
                        "name": "bob", "color": "#4ECDC4", "x": 10.0, "y": 20.0,
                        "velX": 0.0, "velY": 0.0, "facing": 1, "onGround": true,
                        "health": 3, "killCount": 1
                    }],
                    "bullets": [{
                        "id": "bob_1", "ownerName": "bob", "x": 50.0, "y": 30.0, "direction": -1
                    }]
                }
            })
        );
    }

    #[test]
    fn test_error_envelope() {
        let text = encode_server(&ServerMessage::error("Name must not be empty")).unwrap();
        assert_eq!(
            text,
            r#"{"type":"error","payload":{"message":"Name must not be empty"}}"#
        );
        assert_eq!(
            decode_server(&text).unwrap(),
            ServerMessage::error("Name must not be empty")
        );
    }
}
