use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};

use crate::config::{AppConfig, PromptsSection};

pub const DEFAULT_PROMPTS_DIR: &str = "prompts";

pub const DEFAULT_SYSTEM: &str = "system.txt";
pub const DEFAULT_TRANSLATE: &str = "translate.txt";

#[derive(Clone, Debug)]
pub struct PromptSet {
    pub system: String,
    pub translate: String,
}

impl PromptSet {
    pub fn load(config_path: &Path, cfg: &AppConfig) -> anyhow::Result<Self> {
        let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
        let p = cfg.prompts.clone();
        Ok(Self {
            system: read_prompt(config_dir, &p, "system", DEFAULT_SYSTEM)?,
            translate: read_prompt(config_dir, &p, "translate", DEFAULT_TRANSLATE)?,
        })
    }

    /// Compiled-in texts, used when no config file is in play.
    pub fn defaults() -> Self {
        Self {
            system: DEFAULT_SYSTEM_TEXT.to_string(),
            translate: DEFAULT_TRANSLATE_TEXT.to_string(),
        }
    }
}

fn read_prompt(
    config_dir: &Path,
    p: &PromptsSection,
    key: &str,
    default_filename: &str,
) -> anyhow::Result<String> {
    let rel = format!("{DEFAULT_PROMPTS_DIR}/{default_filename}");
    let path = match key {
        "system" => p.system.clone().unwrap_or(rel),
        "translate" => p.translate.clone().unwrap_or(rel),
        other => return Err(anyhow!("unknown prompt key: {other}")),
    };

    let mut p = PathBuf::from(path);
    if p.is_relative() {
        p = config_dir.join(&p);
    }
    if !p.exists() {
        return Err(anyhow!(
            "prompt file not found for {key}: {} (run: md-translator --init-config)",
            p.display()
        ));
    }
    let text =
        std::fs::read_to_string(&p).with_context(|| format!("read prompt: {}", p.display()))?;
    Ok(text)
}

pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (k, v) in vars {
        let pat = format!("{{{{{k}}}}}");
        out = out.replace(&pat, v);
    }
    out
}

pub fn default_prompt_files() -> Vec<(&'static str, &'static str)> {
    vec![
        (DEFAULT_SYSTEM, DEFAULT_SYSTEM_TEXT),
        (DEFAULT_TRANSLATE, DEFAULT_TRANSLATE_TEXT),
    ]
}

pub const DEFAULT_SYSTEM_TEXT: &str = "You are a multilingual expert developer.\n";

pub const DEFAULT_TRANSLATE_TEXT: &str = r#"I have a markdown file:

<markdown>
{{content}}
</markdown>

Please translate this markdown to {{language_code}} (that's an ISO language code).
Notice that the label text contained in `mermaid` blocks also needs to be translated
(but don't translate labels like A, B, C).
Output the translated markdown ONLY and NOTHING ELSE.
DO NOT INCLUDE <markdown> and </markdown>.

Notice that, if there are special "developer" terms
(like "abstractions", or "compiler", sometimes but not always in bold face),
you should not only translate but also provide the original English properly,
e.g., "compiler" --> "编译器（compiler）".

Note, "ja" is not the code for Chinese!
"#;
