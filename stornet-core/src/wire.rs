//! Registration stream format: JSON objects written back to back, no length prefix.
//! A reader keeps appending received bytes until one complete object parses, which is
//! how the node client and the hub talk. Incoming objects may omit the `type` tag.

use crate::protocol::{Inbound, Message};

/// Largest single message accepted or produced.
pub const MAX_MESSAGE_LEN: usize = 64 * 1024;

/// Serialize `msg` as one tagged JSON object.
pub fn encode_frame(msg: &Message) -> Result<Vec<u8>, FrameEncodeError> {
    let out = serde_json::to_vec(msg)?;
    if out.len() > MAX_MESSAGE_LEN {
        return Err(FrameEncodeError::TooLarge(out.len()));
    }
    Ok(out)
}

#[derive(Debug, thiserror::Error)]
pub enum FrameEncodeError {
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("message of {0} bytes exceeds the {MAX_MESSAGE_LEN} byte limit")]
    TooLarge(usize),
}

/// Read the first complete message in `buf`, skipping leading whitespace.
/// Returns the message and how many bytes it used; `NeedMore` while the object is
/// still incomplete.
pub fn decode_frame(buf: &[u8]) -> Result<(Message, usize), FrameDecodeError> {
    let mut stream = serde_json::Deserializer::from_slice(buf).into_iter::<Inbound>();
    match stream.next() {
        None => Err(FrameDecodeError::NeedMore),
        Some(Ok(inbound)) => {
            let used = stream.byte_offset();
            if used > MAX_MESSAGE_LEN {
                return Err(FrameDecodeError::TooLarge);
            }
            Ok((inbound.into(), used))
        }
        Some(Err(e)) if e.is_eof() => {
            if buf.len() > MAX_MESSAGE_LEN {
                Err(FrameDecodeError::TooLarge)
            } else {
                Err(FrameDecodeError::NeedMore)
            }
        }
        Some(Err(e)) => Err(FrameDecodeError::Decode(e)),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameDecodeError {
    #[error("incomplete message")]
    NeedMore,
    #[error("message exceeds the {MAX_MESSAGE_LEN} byte limit")]
    TooLarge,
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Heartbeat, NodeDescriptor, RegistrationAck};

    fn descriptor(name: &str) -> NodeDescriptor {
        NodeDescriptor {
            id: "1a2b3c4d".into(),
            name: name.into(),
            storage_capacity: 50,
            cpu_cores: 4,
            memory: 8,
            node_type: None,
            timestamp: "2024-01-01 12:00:00".into(),
        }
    }

    #[test]
    fn register_decodes() {
        let msg = Message::Register(descriptor("edge-1"));
        let bytes = encode_frame(&msg).unwrap();
        let (decoded, n) = decode_frame(&bytes).unwrap();
        assert_eq!(n, bytes.len());
        assert_eq!(decoded, msg);
    }

    #[test]
    fn client_registration_bytes() {
        // Exactly what the node client writes: no type tag, no framing.
        let raw = br#"{"node_id": "1a2b3c4d", "node_name": "edge-1", "storage_capacity": 50, "cpu_cores": 4, "memory": 8, "timestamp": "2024-01-01 12:00:00"}"#;
        let (msg, n) = decode_frame(raw).unwrap();
        assert_eq!(n, raw.len());
        assert_eq!(msg, Message::Register(descriptor("edge-1")));
    }

    #[test]
    fn incomplete_object_needs_more() {
        let bytes = encode_frame(&Message::Register(descriptor("edge-1"))).unwrap();
        assert!(matches!(decode_frame(b""), Err(FrameDecodeError::NeedMore)));
        assert!(matches!(decode_frame(b"  \n"), Err(FrameDecodeError::NeedMore)));
        assert!(matches!(
            decode_frame(&bytes[..bytes.len() - 1]),
            Err(FrameDecodeError::NeedMore)
        ));
    }

    #[test]
    fn oversized_message_rejected_both_ways() {
        let big = Message::Register(descriptor(&"x".repeat(MAX_MESSAGE_LEN)));
        assert!(matches!(encode_frame(&big), Err(FrameEncodeError::TooLarge(_))));

        let raw = serde_json::to_vec(&big).unwrap();
        assert!(matches!(decode_frame(&raw), Err(FrameDecodeError::TooLarge)));
        assert!(matches!(
            decode_frame(&raw[..raw.len() - 1]),
            Err(FrameDecodeError::TooLarge)
        ));
    }

    #[test]
    fn malformed_payload() {
        assert!(matches!(decode_frame(b"nope!"), Err(FrameDecodeError::Decode(_))));
        assert!(matches!(
            decode_frame(br#"{"status": "connected"}"#),
            Err(FrameDecodeError::Decode(_))
        ));
    }

    #[test]
    fn back_to_back_messages() {
        let a = Message::Register(descriptor("edge-1"));
        let b = Message::Heartbeat(Heartbeat {
            node_id: "1a2b3c4d".into(),
            timestamp: "2024-01-01 12:00:30".into(),
        });
        let mut buf = Vec::new();
        for m in [&a, &b] {
            buf.extend_from_slice(&encode_frame(m).unwrap());
        }
        buf.extend_from_slice(br#" {"status": "connected", "message": "Node successfully registered"}"#);

        let (m1, n1) = decode_frame(&buf).unwrap();
        let (m2, n2) = decode_frame(&buf[n1..]).unwrap();
        let (m3, n3) = decode_frame(&buf[n1 + n2..]).unwrap();
        assert_eq!(n1 + n2 + n3, buf.len());
        assert_eq!(m1, a);
        assert_eq!(m2, b);
        assert_eq!(m3, Message::Ack(RegistrationAck::connected()));
    }
}
