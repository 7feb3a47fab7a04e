//! The `Channel` trait and the event type channels produce.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChannelError;
use crate::render::Outgoing;
use crate::store::{ChatId, UserId};

/// What the user did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A text message, including commands and reply-keyboard labels.
    TextMessage { text: String },
    /// An inline button press carrying its raw callback data.
    ButtonPress { callback_data: String },
}

/// One inbound user action, normalised across channels.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Name of the channel that produced the event.
    pub channel: String,
    pub user_id: UserId,
    pub chat_id: ChatId,
    /// Display handle, used only when the profile is first created.
    pub handle: String,
    pub kind: EventKind,
    /// Transport-specific identifiers (message id, callback query id).
    pub metadata: serde_json::Value,
}

impl InboundEvent {
    pub fn text(
        channel: impl Into<String>,
        user_id: UserId,
        chat_id: ChatId,
        text: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            user_id,
            chat_id,
            handle: String::new(),
            kind: EventKind::TextMessage { text: text.into() },
            metadata: serde_json::json!({}),
        }
    }

    pub fn button(
        channel: impl Into<String>,
        user_id: UserId,
        chat_id: ChatId,
        callback_data: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            user_id,
            chat_id,
            handle: String::new(),
            kind: EventKind::ButtonPress {
                callback_data: callback_data.into(),
            },
            metadata: serde_json::json!({}),
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = handle.into();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Stream of inbound events from a channel.
pub type EventStream = Pin<Box<dyn Stream<Item = InboundEvent> + Send>>;

/// A transport that delivers user actions and renders replies.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Start receiving events.
    async fn start(&self) -> Result<EventStream, ChannelError>;

    /// Deliver the replies produced for `event`, in order.
    async fn respond(&self, event: &InboundEvent, replies: Vec<Outgoing>)
    -> Result<(), ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_fill_event() {
        let event = InboundEvent::button("telegram", 7, 70, "back")
            .with_handle("@ann")
            .with_metadata(serde_json::json!({ "message_id": 5 }));
        assert_eq!(event.user_id, 7);
        assert_eq!(event.chat_id, 70);
        assert_eq!(event.handle, "@ann");
        assert_eq!(
            event.kind,
            EventKind::ButtonPress {
                callback_data: "back".into()
            }
        );
        assert_eq!(event.metadata["message_id"], 5);
    }
}
