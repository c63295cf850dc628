//! Ollama client for query generation.
//!
//! Uses the native `/api/chat` endpoint with `format: "json"` and streaming
//! disabled, so each prompt yields exactly one reply body.

use crate::config::{Config, DEFAULT_HOST};
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Anything that can turn a prompt into raw model text.
pub trait QueryGenerator {
    fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Serialize, Debug)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize, Debug)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    message: ReplyMessage,
}

#[derive(Deserialize, Debug)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

/// Empty → default host; bare `host:port` gets `http://`; trailing `/` dropped.
pub fn normalize_host(host: &str) -> Result<String> {
    let mut h = host.trim().to_string();
    if h.is_empty() {
        h = DEFAULT_HOST.to_string();
    }
    if !h.starts_with("http://") && !h.starts_with("https://") {
        h = format!("http://{}", h);
    }
    let h = h.trim_end_matches('/').to_string();
    url::Url::parse(&h).map_err(|source| Error::InvalidHost { host: host.to_string(), source })?;
    Ok(h)
}

pub struct OllamaClient {
    http: Client,
    host: String,
    model: String,
    system_prompt: Option<String>,
    temperature: Option<f32>,
}

impl OllamaClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(Error::HttpClient)?;
        Ok(Self {
            http,
            host: normalize_host(&cfg.host)?,
            model: cfg.model.clone(),
            system_prompt: cfg.system_prompt.clone(),
            temperature: cfg.temperature,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.host)
    }

    /// True when `GET /api/tags` answers with a success status.
    pub fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.host);
        self.http
            .get(&url)
            .timeout(Duration::from_secs(2))
            .send()
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    pub fn chat(&self, prompt: &str) -> Result<String> {
        let user = prompt.trim();
        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = self.system_prompt.as_deref() {
            messages.push(ChatMessage { role: "system", content: sys });
        }
        messages.push(ChatMessage { role: "user", content: user });
        let body = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            format: "json",
            options: self.temperature.map(|temperature| ChatOptions { temperature }),
        };

        let url = self.chat_url();
        info!(model = %self.model, chars = user.len(), "sending prompt");
        debug!(prompt = user, "prompt text");
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .map_err(|source| Error::ModelUnreachable { url: url.clone(), source })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(Error::ModelStatus { status: status.as_u16(), body: excerpt(&text, 300) });
        }
        let parsed: ChatResponse = resp
            .json()
            .map_err(|e| Error::ModelProtocol(e.to_string()))?;
        debug!(reply = %parsed.message.content, "model reply");
        Ok(parsed.message.content)
    }
}

impl QueryGenerator for OllamaClient {
    fn generate(&self, prompt: &str) -> Result<String> {
        self.chat(prompt)
    }
}

fn excerpt(s: &str, max_chars: usize) -> String {
    let s = s.trim();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push('…');
    out
}
