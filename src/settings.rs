use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIN_MAX_TOKENS: u32 = 100;
pub const MAX_MAX_TOKENS: u32 = 4000;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Claude models offered in the sidebar, in display order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ModelId {
    #[default]
    #[serde(rename = "claude-3-7-sonnet-20250219")]
    Claude37Sonnet,
    #[serde(rename = "claude-3-5-sonnet-20240229")]
    Claude35Sonnet,
    #[serde(rename = "claude-3-opus-20240229")]
    Claude3Opus,
    #[serde(rename = "claude-3-5-haiku-20240307")]
    Claude35Haiku,
}

impl ModelId {
    pub const ALL: [ModelId; 4] = [
        ModelId::Claude37Sonnet,
        ModelId::Claude35Sonnet,
        ModelId::Claude3Opus,
        ModelId::Claude35Haiku,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Claude37Sonnet => "claude-3-7-sonnet-20250219",
            ModelId::Claude35Sonnet => "claude-3-5-sonnet-20240229",
            ModelId::Claude3Opus => "claude-3-opus-20240229",
            ModelId::Claude35Haiku => "claude-3-5-haiku-20240307",
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelId::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unsupported model: '{s}'"))
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub api_key: String,
    pub model: ModelId,
    pub max_tokens: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: ModelId::default(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

// Keeps the key out of logs.
impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl SessionConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), ..Self::default() }
    }

    pub fn api_key_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Applies the fields present in `patch`; `max_tokens` is clamped to the slider range.
    pub fn apply_patch(&mut self, patch: SessionConfigPatch) {
        if let Some(key) = patch.api_key {
            self.api_key = key;
        }
        if let Some(model) = patch.model {
            self.model = model;
        }
        if let Some(max_tokens) = patch.max_tokens {
            self.max_tokens = max_tokens.clamp(MIN_MAX_TOKENS, MAX_MAX_TOKENS);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SessionConfigPatch {
    pub api_key: Option<String>,
    pub model: Option<ModelId>,
    pub max_tokens: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pick_first_model_and_thousand_tokens() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.model, ModelId::ALL[0]);
        assert_eq!(cfg.model.as_str(), "claude-3-7-sonnet-20250219");
        assert_eq!(cfg.max_tokens, 1000);
        assert!(!cfg.api_key_configured());
    }

    #[test]
    fn partial_patch_only_touches_given_fields() {
        let mut cfg = SessionConfig::with_api_key("sk-test");
        cfg.apply_patch(SessionConfigPatch {
            model: Some(ModelId::Claude3Opus),
            ..Default::default()
        });
        assert_eq!(cfg.api_key, "sk-test");
        assert_eq!(cfg.model, ModelId::Claude3Opus);
        assert_eq!(cfg.max_tokens, DEFAULT_MAX_TOKENS);

        cfg.apply_patch(SessionConfigPatch { api_key: Some(String::new()), ..Default::default() });
        assert!(!cfg.api_key_configured());
        assert_eq!(cfg.model, ModelId::Claude3Opus);
    }

    #[test]
    fn max_tokens_is_clamped_to_slider_range() {
        let mut cfg = SessionConfig::default();
        cfg.apply_patch(SessionConfigPatch { max_tokens: Some(5), ..Default::default() });
        assert_eq!(cfg.max_tokens, 100);
        cfg.apply_patch(SessionConfigPatch { max_tokens: Some(99_999), ..Default::default() });
        assert_eq!(cfg.max_tokens, 4000);
        cfg.apply_patch(SessionConfigPatch { max_tokens: Some(2500), ..Default::default() });
        assert_eq!(cfg.max_tokens, 2500);
    }

    #[test]
    fn model_ids_parse_and_serialize_as_identifiers() {
        for m in ModelId::ALL {
            assert_eq!(m.as_str().parse::<ModelId>().unwrap(), m);
            assert_eq!(serde_json::to_value(m).unwrap(), serde_json::json!(m.as_str()));
        }
        assert!("gpt-4".parse::<ModelId>().is_err());

        let patch: SessionConfigPatch =
            serde_json::from_str(r#"{"model":"claude-3-5-haiku-20240307"}"#).unwrap();
        assert_eq!(patch.model, Some(ModelId::Claude35Haiku));
        assert!(patch.api_key.is_none());
    }

    #[test]
    fn debug_output_hides_api_key() {
        let cfg = SessionConfig::with_api_key("sk-ant-secret");
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("sk-ant-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
