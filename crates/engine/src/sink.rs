//! Delivery collaborator interface.

use async_trait::async_trait;
use poolwatch_core::{MediaRef, SubscriberId};
use thiserror::Error;

/// Deep-link button attached below an alert.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertButton {
    pub label: String,
    pub url: String,
}

/// A fully composed alert, ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertPayload {
    /// HTML-formatted message body.
    pub text: String,
    pub media: Option<MediaRef>,
    pub buttons: Vec<AlertButton>,
}

impl AlertPayload {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media: None,
            buttons: Vec::new(),
        }
    }
}

/// Delivery failures, classified by what the broadcaster should do next.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// The destination no longer exists; evict the subscriber.
    #[error("destination gone: {0}")]
    Gone(String),

    /// The attached media was rejected; demote it and send plain.
    #[error("media rejected: {0}")]
    MediaRejected(String),

    /// Anything recoverable; the alert is dropped, nothing else changes.
    #[error("delivery failed: {0}")]
    Transient(String),
}

/// One capability: deliver a payload to a subscriber, fire-and-forget with
/// a success/failure result.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, to: SubscriberId, payload: &AlertPayload) -> Result<(), DeliveryError>;
}
