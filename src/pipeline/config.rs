use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};

use crate::config::{find_default_config, load_config, resolve_backend, CONFIG_FILENAME};
use crate::models::remote::{self, RemoteModelConfig};

use super::prompts::{default_prompt_files, PromptSet, DEFAULT_PROMPTS_DIR};

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub language_code: String,
    pub silent: bool,
    pub backend: RemoteModelConfig,
    pub prompts: PromptSet,
    pub config_path: Option<PathBuf>,
}

impl PipelineConfig {
    /// Merge the discovered/explicit config file with CLI overrides. With no
    /// config file anywhere, compiled-in defaults make the tool usable as-is.
    pub fn from_args(
        language_code: String,
        config: Option<PathBuf>,
        backend: Option<String>,
        silent: bool,
    ) -> anyhow::Result<Self> {
        let config_path = config.or_else(find_default_config);

        match config_path {
            Some(path) => {
                let cfg = load_config(&path)?;
                let backend_name = backend
                    .or_else(|| cfg.pipeline.backend.clone())
                    .unwrap_or_else(|| remote::DEFAULT_BACKEND_NAME.to_string());
                let resolved = resolve_backend(&cfg, &backend_name)
                    .with_context(|| format!("config: {}", path.display()))?;
                let prompts = PromptSet::load(&path, &cfg)?;
                Ok(Self {
                    language_code,
                    silent: silent || cfg.pipeline.silent.unwrap_or(false),
                    backend: resolved,
                    prompts,
                    config_path: Some(path),
                })
            }
            None => {
                if let Some(name) = backend {
                    if name != remote::DEFAULT_BACKEND_NAME {
                        return Err(anyhow!(
                            "backend {name} requires a config file (run: md-translator --init-config)"
                        ));
                    }
                }
                let cfg = crate::config::AppConfig::default();
                let resolved = resolve_backend(&cfg, remote::DEFAULT_BACKEND_NAME)?;
                Ok(Self {
                    language_code,
                    silent,
                    backend: resolved,
                    prompts: PromptSet::defaults(),
                    config_path: None,
                })
            }
        }
    }
}

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILENAME);

    let prompts_dir = dir.join(DEFAULT_PROMPTS_DIR);
    std::fs::create_dir_all(&prompts_dir)
        .with_context(|| format!("create prompts dir: {}", prompts_dir.display()))?;

    for (fname, body) in default_prompt_files() {
        let p = prompts_dir.join(fname);
        if p.exists() && !force {
            continue;
        }
        std::fs::write(&p, body).with_context(|| format!("write prompt: {}", p.display()))?;
    }

    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }

    let cfg_text = r#"[pipeline]
backend = "openai"
silent = false

[prompts]
system = "prompts/system.txt"
translate = "prompts/translate.txt"

[backends.openai]
base_url = "https://api.openai.com/v1"
model = "gpt-3.5-turbo-16k"
api_key_env = "OPENAI_API_KEY"
connect_timeout_secs = 10
read_timeout_secs = 120
max_attempts = 3
initial_backoff_ms = 500
max_backoff_secs = 30
# temperature = 0.2
# max_tokens = 4096
"#;
    std::fs::write(&cfg_path, cfg_text)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}
