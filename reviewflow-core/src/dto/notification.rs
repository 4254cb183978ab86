//! Notification payloads

use serde::{Deserialize, Serialize};

/// Message published to the message bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    pub topic: String,
    pub subject: String,
    pub body: String,
}

/// Chat webhook body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub attachments: Vec<WebhookAttachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookAttachment {
    pub color: String,
    pub title: String,
    pub text: String,
    pub fields: Vec<WebhookField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

impl WebhookField {
    pub fn new(title: impl Into<String>, value: impl Into<String>, short: bool) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
            short,
        }
    }
}
