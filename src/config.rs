use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::Deserialize;

use crate::models::remote::{self, RemoteModelConfig};

pub const CONFIG_FILENAME: &str = "md-translator.toml";
pub const CONFIG_ENV: &str = "MD_TRANSLATOR_CONFIG";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub prompts: PromptsSection,
    #[serde(default)]
    pub backends: HashMap<String, BackendSection>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PipelineSection {
    /// Backend name to translate with (a key under [backends]).
    #[serde(default)]
    pub backend: Option<String>,

    /// Suppress the streamed echo of the translation on stdout.
    #[serde(default)]
    pub silent: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PromptsSection {
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub translate: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct BackendSection {
    /// Chat-completions API root, e.g. "https://api.openai.com/v1".
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,

    /// Environment variable holding the API key (never the key itself).
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub read_timeout_secs: Option<u64>,

    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub initial_backoff_ms: Option<u64>,
    #[serde(default)]
    pub max_backoff_secs: Option<u64>,
}

pub fn find_file_upwards(start: &Path, filename: &str, max_hops: usize) -> Option<PathBuf> {
    let mut dir = Some(start.to_path_buf());
    for _ in 0..=max_hops {
        let d = dir?;
        let cand = d.join(filename);
        if cand.is_file() {
            return Some(cand);
        }
        dir = d.parent().map(|p| p.to_path_buf());
    }
    None
}

pub fn find_default_config() -> Option<PathBuf> {
    if let Some(p) = std::env::var_os(CONFIG_ENV) {
        let p = PathBuf::from(p);
        if p.is_file() {
            return Some(p);
        }
    }
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, CONFIG_FILENAME, 8) {
            return Some(p);
        }
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, CONFIG_FILENAME, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}

pub fn resolve_backend(cfg: &AppConfig, name: &str) -> anyhow::Result<RemoteModelConfig> {
    let section = match cfg.backends.get(name) {
        Some(b) => b.clone(),
        None if name == remote::DEFAULT_BACKEND_NAME => BackendSection::default(),
        None => {
            return Err(anyhow!(
                "backend not configured: {} (add a [backends.{}] section)",
                name,
                name
            ))
        }
    };

    Ok(RemoteModelConfig {
        name: name.to_string(),
        base_url: section
            .base_url
            .unwrap_or_else(|| remote::DEFAULT_BASE_URL.to_string()),
        model: section
            .model
            .unwrap_or_else(|| remote::DEFAULT_MODEL.to_string()),
        api_key_env: section
            .api_key_env
            .unwrap_or_else(|| remote::DEFAULT_API_KEY_ENV.to_string()),
        temperature: section.temperature,
        max_tokens: section.max_tokens,
        connect_timeout: Duration::from_secs(
            section
                .connect_timeout_secs
                .unwrap_or(remote::DEFAULT_CONNECT_TIMEOUT_SECS),
        ),
        read_timeout: Duration::from_secs(
            section
                .read_timeout_secs
                .unwrap_or(remote::DEFAULT_READ_TIMEOUT_SECS),
        ),
        max_attempts: section.max_attempts.unwrap_or(remote::DEFAULT_MAX_ATTEMPTS).max(1),
        initial_backoff: Duration::from_millis(
            section
                .initial_backoff_ms
                .unwrap_or(remote::DEFAULT_INITIAL_BACKOFF_MS),
        ),
        max_backoff: Duration::from_secs(
            section
                .max_backoff_secs
                .unwrap_or(remote::DEFAULT_MAX_BACKOFF_SECS),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::{load_config, resolve_backend, AppConfig};
    use crate::models::remote;

    #[test]
    fn empty_config_parses() {
        let cfg: AppConfig = toml::from_str("").expect("parse");
        assert!(cfg.backends.is_empty());
        assert!(cfg.pipeline.backend.is_none());
    }

    #[test]
    fn full_config_parses() {
        let text = r#"
[pipeline]
backend = "openai"
silent = true

[prompts]
system = "prompts/system.txt"
translate = "prompts/translate.txt"

[backends.openai]
base_url = "https://api.openai.com/v1"
model = "gpt-3.5-turbo-16k"
api_key_env = "OPENAI_API_KEY"
temperature = 0.2
connect_timeout_secs = 5
read_timeout_secs = 60
max_attempts = 4
"#;
        let cfg: AppConfig = toml::from_str(text).expect("parse");
        assert_eq!(cfg.pipeline.backend.as_deref(), Some("openai"));
        assert_eq!(cfg.pipeline.silent, Some(true));
        let b = cfg.backends.get("openai").expect("backend section");
        assert_eq!(b.model.as_deref(), Some("gpt-3.5-turbo-16k"));
        assert_eq!(b.max_attempts, Some(4));
    }

    #[test]
    fn default_backend_resolves_without_a_section() {
        let cfg = AppConfig::default();
        let resolved = resolve_backend(&cfg, remote::DEFAULT_BACKEND_NAME).expect("resolve");
        assert_eq!(resolved.base_url, remote::DEFAULT_BASE_URL);
        assert_eq!(resolved.model, remote::DEFAULT_MODEL);
        assert_eq!(resolved.api_key_env, remote::DEFAULT_API_KEY_ENV);
        assert!(resolved.temperature.is_none());
    }

    #[test]
    fn unknown_backend_is_an_error() {
        let cfg = AppConfig::default();
        let err = resolve_backend(&cfg, "missing").unwrap_err();
        assert!(err.to_string().contains("backend not configured: missing"));
    }

    #[test]
    fn section_overrides_win_over_defaults() {
        let text = r#"
[backends.proxy]
base_url = "http://127.0.0.1:8080/v1"
api_key_env = "PROXY_KEY"
"#;
        let cfg: AppConfig = toml::from_str(text).expect("parse");
        let resolved = resolve_backend(&cfg, "proxy").expect("resolve");
        assert_eq!(resolved.base_url, "http://127.0.0.1:8080/v1");
        assert_eq!(resolved.api_key_env, "PROXY_KEY");
        assert_eq!(resolved.model, remote::DEFAULT_MODEL);
    }

    #[test]
    fn load_config_reports_path_on_missing_file() {
        let err = load_config(std::path::Path::new("no-such-config.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("no-such-config.toml"));
    }
}
