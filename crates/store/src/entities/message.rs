use serde::{Deserialize, Serialize};

/// Message kind. Attachment-led messages take their kind from the first
/// attachment when the sender supplied none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    File,
    Audio,
    Document,
    System,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::File => "file",
            MessageKind::Audio => "audio",
            MessageKind::Document => "document",
            MessageKind::System => "system",
        }
    }
}

impl From<&str> for MessageKind {
    fn from(s: &str) -> Self {
        match s {
            "image" => MessageKind::Image,
            "file" => MessageKind::File,
            "audio" => MessageKind::Audio,
            "document" => MessageKind::Document,
            "system" => MessageKind::System,
            _ => MessageKind::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Audio,
    Document,
}

/// Descriptor for an uploaded attachment; the blob itself lives elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub filename: Option<String>,
    pub size: Option<i64>,
    pub mime_type: Option<String>,
}

/// A persisted message. Immutable except for the read-set, which only grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
    pub read_by: Vec<String>,
    pub created_at: String,
}

/// Fields for creating a message; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: String,
    pub sender_id: String,
    pub kind: MessageKind,
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_kind_defaults_to_text() {
        assert_eq!(MessageKind::from("image"), MessageKind::Image);
        assert_eq!(MessageKind::from("voice"), MessageKind::Text);
    }

    #[test]
    fn attachment_serializes_with_wire_field_names() {
        let attachment = Attachment {
            url: "/uploads/a.png".to_string(),
            kind: AttachmentKind::Image,
            filename: Some("a.png".to_string()),
            size: Some(1024),
            mime_type: Some("image/png".to_string()),
        };

        let json = serde_json::to_value(&attachment).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["mimeType"], "image/png");
    }
}
