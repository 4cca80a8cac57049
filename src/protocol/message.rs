//! Inbound message envelopes.
//!
//! Field names follow the service's camelCase JSON so adapters can
//! deserialize batches directly.

use serde::{Deserialize, Serialize};

/// Discriminator on an inbound batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertKind {
    /// Newly arrived messages.
    Notify,
    /// Historical sync or backfill.
    Append,
}

/// A batch of envelopes delivered in one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBatch {
    #[serde(rename = "type")]
    pub kind: UpsertKind,
    pub messages: Vec<MessageEnvelope>,
}

impl MessageBatch {
    pub fn notify(messages: Vec<MessageEnvelope>) -> Self {
        Self {
            kind: UpsertKind::Notify,
            messages,
        }
    }

    pub fn append(messages: Vec<MessageEnvelope>) -> Self {
        Self {
            kind: UpsertKind::Append,
            messages,
        }
    }

    pub fn is_live(&self) -> bool {
        self.kind == UpsertKind::Notify
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageKey {
    pub remote_jid: Option<String>,
    pub from_me: bool,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageEnvelope {
    pub key: MessageKey,
    /// Absent for protocol/system stubs.
    pub message: Option<MessageContent>,
    pub push_name: Option<String>,
}

impl MessageEnvelope {
    /// Plain text message from `remote_jid`.
    pub fn text(remote_jid: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: MessageKey {
                remote_jid: Some(remote_jid.into()),
                ..MessageKey::default()
            },
            message: Some(MessageContent {
                conversation: Some(text.into()),
                ..MessageContent::default()
            }),
            push_name: None,
        }
    }

    /// Mark the envelope as sent by this account.
    pub fn from_me(mut self) -> Self {
        self.key.from_me = true;
        self
    }
}

/// Message payload. Only the text-bearing variants are modelled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageContent {
    pub conversation: Option<String>,
    pub extended_text_message: Option<ExtendedText>,
    pub image_message: Option<CaptionedMedia>,
    pub video_message: Option<CaptionedMedia>,
    pub document_message: Option<CaptionedMedia>,
    pub buttons_response_message: Option<ButtonsResponse>,
    pub template_button_reply_message: Option<TemplateButtonReply>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtendedText {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionedMedia {
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ButtonsResponse {
    pub selected_button_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateButtonReply {
    pub selected_id: Option<String>,
}
