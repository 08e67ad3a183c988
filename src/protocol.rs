use serde::{Deserialize, Serialize};

use crate::events::RewardEvent;
use crate::types::Timestamp;

// ============================================================================
// Server -> Client Messages
// ============================================================================

/// Frames pushed over the event WebSocket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ServerMessage {
    /// First frame after connecting; `account` echoes the subscription filter
    Welcome {
        account: Option<String>,
        timestamp: Timestamp,
    },

    Event { event: RewardEvent },

    /// The subscriber fell behind and `missed` events were dropped
    Lagged { missed: u64 },
}

impl ServerMessage {
    pub fn msg_type(&self) -> &'static str {
        match self {
            ServerMessage::Welcome { .. } => "welcome",
            ServerMessage::Event { .. } => "event",
            ServerMessage::Lagged { .. } => "lagged",
        }
    }
}

/// Encode a frame as MessagePack with named fields
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, String> {
    rmp_serde::to_vec_named(msg)
        .map_err(|e| format!("Failed to encode {}: {}", msg.msg_type(), e))
}

pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, String> {
    rmp_serde::from_slice(data).map_err(|e| format!("Failed to decode MessagePack: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;

    #[test]
    fn test_event_frame_survives_msgpack() {
        let msg = ServerMessage::Event {
            event: RewardEvent::QuestCompleted {
                user: Address::from_low_u64(7),
                quest_id: "daily_check_in".into(),
                reward: 10_000_000_000,
                streak: 3,
                timestamp: 1_700_000_000,
            },
        };
        let bytes = encode_server_message(&msg).unwrap();
        assert_eq!(decode_server_message(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_frames_use_named_fields() {
        let bytes = encode_server_message(&ServerMessage::Lagged { missed: 4 }).unwrap();
        let value: serde_json::Value = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(value["kind"], "lagged");
        assert_eq!(value["missed"], 4);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(decode_server_message(&[0xc1, 0x00]).is_err());
    }
}
