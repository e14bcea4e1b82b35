//! Wire messages exchanged between the arena server and its clients.
//!
//! Every gameplay message is a JSON object tagged by a `type` field and sent
//! as one line over TCP. Discovery announcements use the same encoding in a
//! single UDP datagram.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::num::ParseIntError;

pub type Color = [u8; 3];

/// Server-assigned player identity. Encoded on the wire as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PlayerId(u32);

impl PlayerId {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<PlayerId> for String {
    fn from(id: PlayerId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for PlayerId {
    type Error = ParseIntError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.trim().parse().map(PlayerId)
    }
}

/// Server-assigned bullet identity, encoded like [`PlayerId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct BulletId(u32);

impl BulletId {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for BulletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<BulletId> for String {
    fn from(id: BulletId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for BulletId {
    type Error = ParseIntError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.trim().parse().map(BulletId)
    }
}

/// Messages a client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<Color>,
    },
    Update {
        x: f32,
        y: f32,
    },
    /// Direction to fire in; need not be normalized.
    Shoot {
        #[serde(default)]
        dx: f32,
        #[serde(default)]
        dy: f32,
    },
    Quit,
}

/// Messages the server sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    JoinAck { id: PlayerId },
    State(WorldSnapshot),
}

/// Public fields of a player as seen by every client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub color: Color,
    pub hp: i32,
    pub kills: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletView {
    pub id: BulletId,
    pub x: f32,
    pub y: f32,
    pub owner: PlayerId,
}

/// One consistent read of the authoritative world.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    #[serde(default)]
    pub players: BTreeMap<PlayerId, PlayerView>,
    #[serde(default)]
    pub bullets: Vec<BulletView>,
    /// Seconds since the Unix epoch when the snapshot was taken.
    #[serde(default)]
    pub time: f64,
}

/// Datagrams on the discovery port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscoveryMessage {
    ServerAnnounce(ServerAnnounce),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerAnnounce {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,
    #[serde(default)]
    pub name: String,
}

fn default_tcp_port() -> u16 {
    crate::TCP_PORT
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_parses_with_and_without_fields() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"join","name":"ana","color":[1,2,3]}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Join {
                name: Some("ana".to_string()),
                color: Some([1, 2, 3]),
            }
        );

        let bare: ClientMessage = serde_json::from_str(r#"{"type":"join"}"#).unwrap();
        assert_eq!(
            bare,
            ClientMessage::Join {
                name: None,
                color: None
            }
        );
    }

    #[test]
    fn test_quit_and_shoot_shapes() {
        let quit = serde_json::to_value(ClientMessage::Quit).unwrap();
        assert_eq!(quit, json!({"type": "quit"}));

        let shoot: ClientMessage = serde_json::from_str(r#"{"type":"shoot","dx":100}"#).unwrap();
        assert_eq!(shoot, ClientMessage::Shoot { dx: 100.0, dy: 0.0 });
    }

    #[test]
    fn test_unknown_type_and_bad_fields_are_errors() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"dance"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"update","x":"a","y":1}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"x":1,"y":2}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>("not json").is_err());
    }

    #[test]
    fn test_join_ack_carries_string_id() {
        let ack = ServerMessage::JoinAck {
            id: PlayerId::new(3),
        };
        assert_eq!(
            serde_json::to_value(&ack).unwrap(),
            json!({"type": "join_ack", "id": "3"})
        );
    }

    #[test]
    fn test_state_shape_uses_string_keys() {
        let mut snapshot = WorldSnapshot {
            time: 12.5,
            ..Default::default()
        };
        snapshot.players.insert(
            PlayerId::new(7),
            PlayerView {
                name: "bo".to_string(),
                x: 1.0,
                y: 2.0,
                color: [9, 8, 7],
                hp: 75,
                kills: 2,
            },
        );
        snapshot.bullets.push(BulletView {
            id: BulletId::new(11),
            x: 3.0,
            y: 4.0,
            owner: PlayerId::new(7),
        });

        let value = serde_json::to_value(ServerMessage::State(snapshot.clone())).unwrap();
        assert_eq!(value["type"], "state");
        assert_eq!(value["players"]["7"]["hp"], 75);
        assert_eq!(value["players"]["7"]["kills"], 2);
        assert_eq!(value["bullets"][0]["id"], "11");
        assert_eq!(value["bullets"][0]["owner"], "7");
        assert_eq!(value["time"], 12.5);

        let back: ServerMessage = serde_json::from_value(value).unwrap();
        assert_eq!(back, ServerMessage::State(snapshot));
    }

    #[test]
    fn test_announce_defaults() {
        let msg: DiscoveryMessage =
            serde_json::from_str(r#"{"type":"server_announce","host":"10.0.0.2"}"#).unwrap();
        let DiscoveryMessage::ServerAnnounce(announce) = msg;
        assert_eq!(announce.host.as_deref(), Some("10.0.0.2"));
        assert_eq!(announce.tcp_port, crate::TCP_PORT);

        assert!(serde_json::from_str::<DiscoveryMessage>(r#"{"type":"hello"}"#).is_err());
    }

    #[test]
    fn test_player_id_ordering_and_parse() {
        assert!(PlayerId::new(2) < PlayerId::new(10));
        assert_eq!(PlayerId::try_from("42".to_string()).unwrap(), PlayerId::new(42));
        assert!(PlayerId::try_from("abc".to_string()).is_err());
    }
}
