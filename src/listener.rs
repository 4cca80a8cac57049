//! Inbound message listener.
//!
//! Turns live message batches into one `New message from ...` line per
//! displayable envelope. Backfill batches, self-echoes, and envelopes
//! without text are dropped silently.

use tracing::trace;

use crate::output::OutputSink;
use crate::protocol::{MessageBatch, MessageContent, MessageEnvelope};
use crate::Result;

/// Address shown when an envelope carries none.
pub const UNKNOWN_SENDER: &str = "unknown";

type TextExtractor = fn(&MessageContent) -> Option<&str>;

fn conversation(m: &MessageContent) -> Option<&str> {
    m.conversation.as_deref()
}

fn extended_text(m: &MessageContent) -> Option<&str> {
    m.extended_text_message.as_ref()?.text.as_deref()
}

fn image_caption(m: &MessageContent) -> Option<&str> {
    m.image_message.as_ref()?.caption.as_deref()
}

fn video_caption(m: &MessageContent) -> Option<&str> {
    m.video_message.as_ref()?.caption.as_deref()
}

fn document_caption(m: &MessageContent) -> Option<&str> {
    m.document_message.as_ref()?.caption.as_deref()
}

fn button_reply(m: &MessageContent) -> Option<&str> {
    m.buttons_response_message
        .as_ref()?
        .selected_button_id
        .as_deref()
}

fn template_button_reply(m: &MessageContent) -> Option<&str> {
    m.template_button_reply_message
        .as_ref()?
        .selected_id
        .as_deref()
}

/// Text sources in priority order.
const TEXT_EXTRACTORS: &[TextExtractor] = &[
    conversation,
    extended_text,
    image_caption,
    video_caption,
    document_caption,
    button_reply,
    template_button_reply,
];

/// First non-blank text in `content`, trimmed.
pub fn message_text(content: &MessageContent) -> Option<String> {
    TEXT_EXTRACTORS
        .iter()
        .filter_map(|extract| extract(content))
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_owned)
}

/// Displayable view of one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender_address: String,
    pub text: Option<String>,
    pub is_self: bool,
}

impl InboundMessage {
    /// `None` when the envelope has no payload.
    pub fn from_envelope(envelope: &MessageEnvelope, address_suffix: &str) -> Option<Self> {
        let content = envelope.message.as_ref()?;
        Some(Self {
            sender_address: display_address(envelope.key.remote_jid.as_deref(), address_suffix),
            text: message_text(content),
            is_self: envelope.key.from_me,
        })
    }
}

/// Strip `@<suffix>` from an address for display.
pub fn display_address(remote_jid: Option<&str>, address_suffix: &str) -> String {
    let Some(jid) = remote_jid.filter(|j| !j.is_empty()) else {
        return UNKNOWN_SENDER.to_string();
    };
    jid.strip_suffix(address_suffix)
        .and_then(|rest| rest.strip_suffix('@'))
        .unwrap_or(jid)
        .to_string()
}

/// Reports live inbound messages to the output sink.
#[derive(Debug, Clone)]
pub struct MessageListener {
    address_suffix: String,
}

impl MessageListener {
    pub fn new(address_suffix: impl Into<String>) -> Self {
        Self {
            address_suffix: address_suffix.into(),
        }
    }

    /// Handle one batch. Returns how many lines were written.
    pub fn handle(&self, batch: &MessageBatch, sink: &dyn OutputSink) -> Result<usize> {
        if !batch.is_live() {
            trace!(count = batch.messages.len(), "Skipping backfill batch");
            return Ok(0);
        }

        let mut written = 0;
        for envelope in &batch.messages {
            let Some(message) = InboundMessage::from_envelope(envelope, &self.address_suffix)
            else {
                continue;
            };
            if message.is_self {
                continue;
            }
            let Some(text) = message.text else {
                trace!(from = %message.sender_address, "Skipping non-text message");
                continue;
            };

            sink.line(&format!(
                "New message from {}: {}",
                message.sender_address, text
            ))?;
            written += 1;
        }
        Ok(written)
    }
}
