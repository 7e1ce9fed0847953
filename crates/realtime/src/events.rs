//! Wire events exchanged over a realtime connection.
//!
//! JSON text frames, discriminated by a `type` field whose values match the
//! protocol the clients speak (`message:send`, `contact:online`, ...).
//! Payload fields are camelCase.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use parley_store::{Attachment, Message, MessageKind, Profile};

/// Ephemeral identifier of one live transport session.
pub type ConnectionId = Uuid;

/// Events a client may send after the handshake.
///
/// Deserialization is hand-rolled: frames are tagged by a `type` field, but
/// a `message:send` payload also uses `type` for the message kind, which
/// derive-based internal tagging cannot express. The tag is read first and
/// the remaining fields are parsed from the same object; when a client
/// writes both, JSON keeps the last occurrence, so the kind value lands in
/// the `type` slot and doubles as the tag.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    JoinConversation {
        conversation_id: String,
    },
    LeaveConversation {
        conversation_id: String,
    },
    TypingStart {
        conversation_id: String,
    },
    TypingStop {
        conversation_id: String,
    },
    MessageSend {
        conversation_id: String,
        text: Option<String>,
        kind: Option<MessageKind>,
        attachments: Vec<Attachment>,
    },
    MessageSeen {
        conversation_id: String,
        message_id: String,
    },
}

const CLIENT_EVENT_NAMES: &[&str] = &[
    "join_conversation",
    "leave_conversation",
    "typing:start",
    "typing:stop",
    "message:send",
    "message:seen",
];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConversationRef {
    conversation_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeenFields {
    conversation_id: String,
    message_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendFields {
    conversation_id: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    attachments: Vec<Attachment>,
}

impl<'de> Deserialize<'de> for ClientEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        fn fields<T, E>(value: Value) -> Result<T, E>
        where
            T: DeserializeOwned,
            E: de::Error,
        {
            serde_json::from_value(value).map_err(de::Error::custom)
        }

        let value = Value::deserialize(deserializer)?;
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| de::Error::missing_field("type"))?
            .to_string();

        match tag.as_str() {
            "join_conversation" => {
                let f: ConversationRef = fields(value)?;
                Ok(ClientEvent::JoinConversation {
                    conversation_id: f.conversation_id,
                })
            }
            "leave_conversation" => {
                let f: ConversationRef = fields(value)?;
                Ok(ClientEvent::LeaveConversation {
                    conversation_id: f.conversation_id,
                })
            }
            "typing:start" => {
                let f: ConversationRef = fields(value)?;
                Ok(ClientEvent::TypingStart {
                    conversation_id: f.conversation_id,
                })
            }
            "typing:stop" => {
                let f: ConversationRef = fields(value)?;
                Ok(ClientEvent::TypingStop {
                    conversation_id: f.conversation_id,
                })
            }
            "message:seen" => {
                let f: SeenFields = fields(value)?;
                Ok(ClientEvent::MessageSeen {
                    conversation_id: f.conversation_id,
                    message_id: f.message_id,
                })
            }
            other => {
                let kind = match other {
                    "message:send" => None,
                    "text" | "image" | "file" | "audio" | "document" | "system" => {
                        Some(MessageKind::from(other))
                    }
                    _ => return Err(de::Error::unknown_variant(other, CLIENT_EVENT_NAMES)),
                };
                let f: SendFields = fields(value)?;
                Ok(ClientEvent::MessageSend {
                    conversation_id: f.conversation_id,
                    text: f.text,
                    kind,
                    attachments: f.attachments,
                })
            }
        }
    }
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "contact:online", rename_all = "camelCase")]
    ContactOnline { user_id: String },

    #[serde(rename = "contact:offline", rename_all = "camelCase")]
    ContactOffline { user_id: String, last_seen: String },

    #[serde(rename = "message:new")]
    MessageNew { message: MessageView },

    /// Direct acknowledgment of a `message:send`, delivered only to the
    /// sending connection. Carries the same payload as the room broadcast.
    #[serde(rename = "message:ack")]
    MessageAck {
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<MessageView>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "message:seen", rename_all = "camelCase")]
    MessageSeen { message_id: String, user_id: String },

    #[serde(rename = "typing:start", rename_all = "camelCase")]
    TypingStart {
        conversation_id: String,
        user_id: String,
    },

    #[serde(rename = "typing:stop", rename_all = "camelCase")]
    TypingStop {
        conversation_id: String,
        user_id: String,
    },

    #[serde(rename = "conversation:joined", rename_all = "camelCase")]
    Joined { conversation_id: String },

    #[serde(rename = "conversation:left", rename_all = "camelCase")]
    Left { conversation_id: String },

    #[serde(rename = "error")]
    Error { error: String, message: String },
}

/// A message as broadcast to rooms and acknowledged to senders, with the
/// sender resolved to a minimal public profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub conversation_id: String,
    pub sender: Profile,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
    pub read_by: Vec<String>,
    pub created_at: String,
}

impl MessageView {
    pub fn from_message(message: Message, sender: Profile) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender,
            kind: message.kind,
            text: message.text,
            attachments: message.attachments,
            read_by: message.read_by,
            created_at: message.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_store::AttachmentKind;

    #[test]
    fn client_events_parse_protocol_type_names() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"type": "message:send", "conversationId": "c1", "text": "hi"}"#,
        )
        .unwrap();
        match event {
            ClientEvent::MessageSend {
                conversation_id,
                text,
                kind,
                attachments,
            } => {
                assert_eq!(conversation_id, "c1");
                assert_eq!(text.as_deref(), Some("hi"));
                assert!(kind.is_none());
                assert!(attachments.is_empty());
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let event: ClientEvent =
            serde_json::from_str(r#"{"type": "typing:start", "conversationId": "c1"}"#).unwrap();
        assert!(matches!(event, ClientEvent::TypingStart { .. }));

        let event: ClientEvent = serde_json::from_str(
            r#"{"type": "message:seen", "conversationId": "c1", "messageId": "m1"}"#,
        )
        .unwrap();
        assert!(matches!(event, ClientEvent::MessageSeen { .. }));
    }

    #[test]
    fn message_send_kind_can_share_the_type_slot() {
        // A client that sets an explicit kind writes `type` twice; JSON
        // keeps the last occurrence, so the kind value arrives as the tag.
        let event: ClientEvent = serde_json::from_str(
            r#"{
                "type": "message:send",
                "conversationId": "c1",
                "attachments": [{"url": "/uploads/a.png", "type": "image", "filename": "a.png"}],
                "type": "image"
            }"#,
        )
        .unwrap();

        match event {
            ClientEvent::MessageSend {
                conversation_id,
                kind,
                attachments,
                ..
            } => {
                assert_eq!(conversation_id, "c1");
                assert_eq!(kind, Some(MessageKind::Image));
                assert_eq!(attachments.len(), 1);
                assert_eq!(attachments[0].kind, AttachmentKind::Image);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_and_untagged_frames_are_rejected() {
        assert!(
            serde_json::from_str::<ClientEvent>(r#"{"type": "bogus", "conversationId": "c1"}"#)
                .is_err()
        );
        assert!(serde_json::from_str::<ClientEvent>(r#"{"conversationId": "c1"}"#).is_err());
    }

    #[test]
    fn server_events_serialize_camel_case_payloads() {
        let event = ServerEvent::ContactOffline {
            user_id: "u1".to_string(),
            last_seen: "2026-01-01T00:00:00+00:00".to_string(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "contact:offline");
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["lastSeen"], "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn ack_omits_absent_fields() {
        let event = ServerEvent::MessageAck {
            ok: false,
            message: None,
            error: Some("Not a member".to_string()),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message:ack");
        assert_eq!(json["ok"], false);
        assert!(json.get("message").is_none());
    }
}
