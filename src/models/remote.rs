use std::io::{BufRead, BufReader};
use std::time::Duration;

use anyhow::{anyhow, Context};
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::Deserialize;

pub const DEFAULT_BACKEND_NAME: &str = "openai";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo-16k";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct RemoteModelConfig {
    pub name: String,
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

/// Streaming chat-completion seam. Fragments are delivered to the callback in
/// arrival order; the accumulated text is returned once the stream ends.
pub trait ChatStream {
    fn stream_chat(
        &mut self,
        system: Option<&str>,
        user: &str,
        on_fragment: &mut dyn FnMut(&str) -> anyhow::Result<()>,
    ) -> anyhow::Result<String>;
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completions backend over HTTP with server-sent
/// events. Request establishment is retried with exponential backoff; once the
/// stream is open a failure aborts the call (no mid-stream recovery).
pub struct RemoteChatModel {
    cfg: RemoteModelConfig,
    api_key: String,
    agent: ureq::Agent,
}

impl RemoteChatModel {
    /// Reads the API key from the configured environment variable.
    pub fn new(cfg: RemoteModelConfig) -> anyhow::Result<Self> {
        let key = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "{} is not set (backend {} reads its API key from it)",
                    cfg.api_key_env,
                    cfg.name
                )
            })?;
        Ok(Self::with_api_key(cfg, key))
    }

    /// Bypasses environment lookup (mock servers, tests).
    pub fn with_api_key(cfg: RemoteModelConfig, api_key: String) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(cfg.connect_timeout)
            .timeout_read(cfg.read_timeout)
            .timeout_write(cfg.read_timeout)
            .build();
        Self {
            cfg,
            api_key,
            agent,
        }
    }

    fn build_payload(&self, system: Option<&str>, user: &str) -> serde_json::Value {
        let mut messages = Vec::new();
        if let Some(sys) = system {
            if !sys.trim().is_empty() {
                messages.push(serde_json::json!({"role": "system", "content": sys}));
            }
        }
        messages.push(serde_json::json!({"role": "user", "content": user}));

        let mut payload = serde_json::json!({
            "model": self.cfg.model,
            "messages": messages,
            "stream": true,
        });
        if let Some(t) = self.cfg.temperature {
            payload["temperature"] = serde_json::json!(t);
        }
        if let Some(m) = self.cfg.max_tokens {
            payload["max_tokens"] = serde_json::json!(m);
        }
        payload
    }

    fn send_with_retry(&self, url: &str, payload: &serde_json::Value) -> anyhow::Result<ureq::Response> {
        let mut policy = ExponentialBackoff {
            current_interval: self.cfg.initial_backoff,
            initial_interval: self.cfg.initial_backoff,
            randomization_factor: 0.3,
            multiplier: 2.0,
            max_interval: self.cfg.max_backoff,
            max_elapsed_time: None,
            ..Default::default()
        };
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let failure = match self
                .agent
                .post(url)
                .set("Authorization", &format!("Bearer {}", self.api_key))
                .send_json(payload)
            {
                Ok(resp) => return Ok(resp),
                Err(ureq::Error::Status(code, resp)) => {
                    if !is_retryable(code) || attempt >= self.cfg.max_attempts {
                        let body = resp.into_string().unwrap_or_else(|_| "(no body)".into());
                        return Err(anyhow!(
                            "{}: chat completion failed (status {code}): {body}",
                            self.cfg.name
                        ));
                    }
                    format!("status {code}")
                }
                Err(ureq::Error::Transport(t)) => {
                    if attempt >= self.cfg.max_attempts {
                        return Err(anyhow!(
                            "{}: chat completion request failed: {t}",
                            self.cfg.name
                        ));
                    }
                    t.to_string()
                }
            };
            let delay = policy.next_backoff().unwrap_or(self.cfg.max_backoff);
            eprintln!(
                "[warn] {}: {failure} (attempt {attempt}), retrying in {}ms",
                self.cfg.name,
                delay.as_millis()
            );
            std::thread::sleep(delay);
        }
    }
}

impl ChatStream for RemoteChatModel {
    fn stream_chat(
        &mut self,
        system: Option<&str>,
        user: &str,
        on_fragment: &mut dyn FnMut(&str) -> anyhow::Result<()>,
    ) -> anyhow::Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.cfg.base_url.trim_end_matches('/')
        );
        let payload = self.build_payload(system, user);
        let resp = self.send_with_retry(&url, &payload)?;

        let reader = BufReader::new(resp.into_reader());
        let mut accumulated = String::new();
        for line in reader.lines() {
            let line = line.with_context(|| format!("{}: read stream", self.cfg.name))?;
            let Some(data) = line.strip_prefix("data: ") else {
                continue;
            };
            if data == "[DONE]" {
                break;
            }
            // Malformed data lines are skipped, matching the lenient consumers
            // other OpenAI-compatible endpoints get away with.
            let chunk: StreamChunk = match serde_json::from_str(data) {
                Ok(c) => c,
                Err(_) => continue,
            };
            if let Some(content) = chunk
                .choices
                .first()
                .and_then(|c| c.delta.content.as_deref())
            {
                if content.is_empty() {
                    continue;
                }
                on_fragment(content)?;
                accumulated.push_str(content);
            }
        }
        Ok(accumulated)
    }
}

fn is_retryable(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}
