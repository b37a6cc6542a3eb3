use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::RemoteCallFailure;
use crate::request::RequestPayload;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const API_VERSION: &str = "2023-06-01";

/// A remote model that answers a whole conversation with one complete reply.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        api_key: &str,
        req: &RequestPayload,
    ) -> Result<String, RemoteCallFailure>;
}

#[derive(Clone)]
pub struct AnthropicClient {
    base_url: String,
    http: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), http: reqwest::Client::new() }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

fn first_text(resp: MessagesResponse) -> Result<String, RemoteCallFailure> {
    match resp.content.into_iter().next() {
        Some(ContentBlock::Text { text }) => Ok(text),
        Some(ContentBlock::Other) => {
            Err(RemoteCallFailure::Malformed("first content block is not text".into()))
        }
        None => Err(RemoteCallFailure::Malformed("response has no content blocks".into())),
    }
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[async_trait]
impl ChatModel for AnthropicClient {
    async fn complete(
        &self,
        api_key: &str,
        req: &RequestPayload,
    ) -> Result<String, RemoteCallFailure> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        debug!(
            model = %req.model,
            max_tokens = req.max_tokens,
            messages = req.messages.len(),
            "calling messages API"
        );
        let resp = self
            .http
            .post(url)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(req)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "messages API call failed");
            return Err(RemoteCallFailure::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }
        let bytes = resp.bytes().await?;
        let parsed: MessagesResponse = serde_json::from_slice(&bytes)
            .map_err(|e| RemoteCallFailure::Malformed(e.to_string()))?;
        first_text(parsed)
    }
}
