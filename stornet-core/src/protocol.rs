//! Registration messages exchanged with the node-registration transport.
//! The transport itself (sockets, keep-alive) lives in the host.

use serde::{Deserialize, Serialize};

/// Status string of a successful registration.
pub const STATUS_CONNECTED: &str = "connected";
/// Status string of a refused registration.
pub const STATUS_REJECTED: &str = "rejected";

/// What a node announces when it joins. Capacities are in GB, as entered by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    #[serde(alias = "node_id")]
    pub id: String,
    #[serde(alias = "node_name")]
    pub name: String,
    pub storage_capacity: u64,
    pub cpu_cores: u32,
    pub memory: u64,
    #[serde(default)]
    pub node_type: Option<String>,
    /// Sender's local time, `%Y-%m-%d %H:%M:%S`. Opaque to the engine.
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationAck {
    pub status: String,
    pub message: String,
}

impl RegistrationAck {
    pub fn connected() -> Self {
        Self {
            status: STATUS_CONNECTED.to_string(),
            message: "Node successfully registered".to_string(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            status: STATUS_REJECTED.to_string(),
            message: reason.into(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == STATUS_CONNECTED
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub node_id: String,
    pub timestamp: String,
}

/// All registration messages. Written as JSON with a `type` tag; see the wire module
/// for reading the untagged forms the node client sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Register(NodeDescriptor),
    Heartbeat(Heartbeat),
    Ack(RegistrationAck),
}

/// Any message the engine accepts. The node client sends its descriptor as a bare
/// object and the hub answers with a bare `{status, message}`; neither carries `type`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Inbound {
    Tagged(Message),
    Register(NodeDescriptor),
    Ack(RegistrationAck),
}

impl From<Inbound> for Message {
    fn from(inbound: Inbound) -> Self {
        match inbound {
            Inbound::Tagged(m) => m,
            Inbound::Register(d) => Message::Register(d),
            Inbound::Ack(a) => Message::Ack(a),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_accepts_hub_field_names() {
        let json = r#"{
            "type": "register",
            "node_id": "1a2b3c4d",
            "node_name": "edge-1",
            "storage_capacity": 50,
            "cpu_cores": 4,
            "memory": 8,
            "node_type": "storage",
            "timestamp": "2024-01-01 12:00:00"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        match msg {
            Message::Register(d) => {
                assert_eq!(d.id, "1a2b3c4d");
                assert_eq!(d.name, "edge-1");
                assert_eq!(d.storage_capacity, 50);
                assert_eq!(d.node_type.as_deref(), Some("storage"));
            }
            other => panic!("expected Register, got {other:?}"),
        }
    }

    #[test]
    fn node_type_is_optional() {
        let json = r#"{"type":"register","id":"x","name":"n","storage_capacity":1,
            "cpu_cores":1,"memory":1,"timestamp":"t"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, Message::Register(NodeDescriptor { node_type: None, .. })));
    }

    #[test]
    fn bare_client_descriptor_is_a_register() {
        let json = r#"{"node_id": "1a2b3c4d", "node_name": "edge-1", "storage_capacity": 50,
            "cpu_cores": 4, "memory": 8, "timestamp": "2024-01-01 12:00:00"}"#;
        assert!(serde_json::from_str::<Message>(json).is_err());
        let msg: Message = serde_json::from_str::<Inbound>(json).unwrap().into();
        match msg {
            Message::Register(d) => {
                assert_eq!(d.id, "1a2b3c4d");
                assert_eq!(d.name, "edge-1");
                assert_eq!(d.memory, 8);
                assert_eq!(d.node_type, None);
            }
            other => panic!("expected Register, got {other:?}"),
        }
    }

    #[test]
    fn bare_hub_ack_and_tagged_heartbeat() {
        let ack: Message = serde_json::from_str::<Inbound>(
            r#"{"status": "connected", "message": "Node successfully registered"}"#,
        )
        .unwrap()
        .into();
        assert_eq!(ack, Message::Ack(RegistrationAck::connected()));

        let hb: Message = serde_json::from_str::<Inbound>(
            r#"{"type": "heartbeat", "node_id": "1a2b3c4d", "timestamp": "2024-01-01 12:00:30"}"#,
        )
        .unwrap()
        .into();
        assert!(matches!(hb, Message::Heartbeat(Heartbeat { ref node_id, .. }) if node_id == "1a2b3c4d"));
    }

    #[test]
    fn ack_shape() {
        let v = serde_json::to_value(Message::Ack(RegistrationAck::connected())).unwrap();
        assert_eq!(v["type"], "ack");
        assert_eq!(v["status"], "connected");
        assert_eq!(v["message"], "Node successfully registered");
        assert!(!RegistrationAck::rejected("no").is_connected());
    }
}
