use crate::settings::{SessionConfig, SessionConfigPatch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Conversation history and configuration for one browser session.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    config: SessionConfig,
    messages: Vec<Message>,
    generation: u64,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self { config, messages: Vec::new(), generation: 0 }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn set_config(&mut self, patch: SessionConfigPatch) {
        self.config.apply_patch(patch);
    }

    pub fn api_key_configured(&self) -> bool {
        self.config.api_key_configured()
    }

    pub fn append_message(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    /// Drops all history. Bumps the generation so replies to earlier turns are not attached.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
