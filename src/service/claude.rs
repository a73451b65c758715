//! Outbound client for the Claude messages API.

use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Assistant;
use crate::config::ClaudeConfig;
use crate::context::Context;
use crate::error::Error;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 1],
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: String,
}

/// [`Assistant`] backed by the Claude API.
///
/// One POST per question, no retries. The configured timeout bounds the
/// whole exchange; a deadline in the caller's context can cut it shorter.
#[derive(Clone, Debug)]
pub struct ClaudeClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl ClaudeClient {
    pub fn new(cfg: &ClaudeConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            base_url: cfg.base_url.clone(),
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
        })
    }

    fn request_body<'a>(&'a self, question: &'a str) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            messages: [Message { role: "user", content: question }],
            max_tokens: self.max_tokens,
        }
    }

    async fn exchange(&self, question: &str) -> Result<String, Error> {
        let resp = self
            .http
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(question))
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(Error::UpstreamStatus(status.as_u16()));
        }

        first_text(resp.json().await?)
    }
}

fn first_text(resp: MessagesResponse) -> Result<String, Error> {
    resp.content
        .into_iter()
        .find(|block| block.kind == "text" || block.kind.is_empty())
        .map(|block| block.text)
        .filter(|text| !text.is_empty())
        .ok_or(Error::EmptyAnswer)
}

#[async_trait]
impl Assistant for ClaudeClient {
    async fn ask(&self, ctx: &Context, question: &str) -> Result<String, Error> {
        debug!(model = %self.model, "asking claude");
        ctx.within_deadline(self.exchange(question)).await?
    }
}
