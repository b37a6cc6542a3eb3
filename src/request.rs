use serde::Serialize;

use crate::session::{Message, Role};
use crate::settings::SessionConfig;

/// Body of a Messages API call. Field order is the wire order.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RequestPayload {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<PayloadMessage>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PayloadMessage {
    pub role: Role,
    pub content: String,
}

/// Maps the whole history onto the request, one entry per message, untouched.
pub fn build_request(history: &[Message], config: &SessionConfig) -> RequestPayload {
    RequestPayload {
        model: config.model.as_str().to_string(),
        max_tokens: config.max_tokens,
        messages: history
            .iter()
            .map(|m| PayloadMessage { role: m.role, content: m.content.clone() })
            .collect(),
    }
}
