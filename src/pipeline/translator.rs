use std::io::{self, Write};
use std::path::Path;

use anyhow::Context;

use crate::models::remote::ChatStream;
use crate::progress::ConsoleProgress;
use crate::textutil::strip_response_wrapper;
use crate::touch::touch_file;

use super::config::PipelineConfig;
use super::prompts::render_template;

pub struct TranslatorPipeline {
    cfg: PipelineConfig,
    backend: Box<dyn ChatStream>,
    progress: ConsoleProgress,
}

impl TranslatorPipeline {
    pub fn new(cfg: PipelineConfig, backend: Box<dyn ChatStream>, progress: ConsoleProgress) -> Self {
        Self {
            cfg,
            backend,
            progress,
        }
    }

    /// Read the input file, stream the translated completion, return the
    /// accumulated text. Fragments echo to stdout as they arrive unless the
    /// pipeline is silent. Fails before any network traffic if the input is
    /// unreadable; a mid-stream failure discards the partial accumulator.
    pub fn translate(&mut self, input: &Path) -> anyhow::Result<String> {
        let content = std::fs::read_to_string(input)
            .with_context(|| format!("read input: {}", input.display()))?;
        self.progress
            .info(format!("read {} ({} bytes)", input.display(), content.len()));

        let user = render_template(
            &self.cfg.prompts.translate,
            &[
                ("language_code", self.cfg.language_code.as_str()),
                ("content", content.as_str()),
            ],
        );

        self.progress.info(format!(
            "translating to {} via {} ({})",
            self.cfg.language_code, self.cfg.backend.name, self.cfg.backend.model
        ));

        let silent = self.cfg.silent;
        let mut stdout = io::stdout().lock();
        let raw = self.backend.stream_chat(
            Some(self.cfg.prompts.system.as_str()),
            &user,
            &mut |fragment| {
                if !silent {
                    stdout
                        .write_all(fragment.as_bytes())
                        .context("write stdout")?;
                    stdout.flush().context("flush stdout")?;
                }
                Ok(())
            },
        )?;
        drop(stdout);
        if !silent {
            println!();
        }

        let text = strip_response_wrapper(&raw);
        self.progress.done("translation complete", text.len());
        Ok(text)
    }

    /// Translate `input` and persist the result to `output`, overwriting any
    /// previous content. The output file is only created once the full
    /// translation is in hand.
    pub fn translate_to_path(&mut self, input: &Path, output: &Path) -> anyhow::Result<()> {
        let text = self.translate(input)?;
        touch_file(output)?;
        std::fs::write(output, &text)
            .with_context(|| format!("write output: {}", output.display()))?;
        self.progress.info(format!("wrote {}", output.display()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::TranslatorPipeline;
    use crate::config::{resolve_backend, AppConfig};
    use crate::models::remote::{self, ChatStream};
    use crate::pipeline::{PipelineConfig, PromptSet};
    use crate::progress::ConsoleProgress;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct FakeStream {
        fragments: Vec<String>,
        calls: Arc<AtomicUsize>,
        last_user_prompt: Arc<Mutex<String>>,
    }

    impl FakeStream {
        fn new(fragments: &[&str]) -> (Self, Arc<AtomicUsize>, Arc<Mutex<String>>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let last_user_prompt = Arc::new(Mutex::new(String::new()));
            (
                Self {
                    fragments: fragments.iter().map(|s| s.to_string()).collect(),
                    calls: calls.clone(),
                    last_user_prompt: last_user_prompt.clone(),
                },
                calls,
                last_user_prompt,
            )
        }
    }

    impl ChatStream for FakeStream {
        fn stream_chat(
            &mut self,
            _system: Option<&str>,
            user: &str,
            on_fragment: &mut dyn FnMut(&str) -> anyhow::Result<()>,
        ) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_user_prompt.lock().expect("lock") = user.to_string();
            let mut accumulated = String::new();
            for f in &self.fragments {
                on_fragment(f)?;
                accumulated.push_str(f);
            }
            Ok(accumulated)
        }
    }

    fn test_pipeline(fragments: &[&str]) -> (TranslatorPipeline, Arc<AtomicUsize>, Arc<Mutex<String>>) {
        let (fake, calls, prompt) = FakeStream::new(fragments);
        let cfg = PipelineConfig {
            language_code: "ja".into(),
            silent: true,
            backend: resolve_backend(&AppConfig::default(), remote::DEFAULT_BACKEND_NAME)
                .expect("default backend"),
            prompts: PromptSet::defaults(),
            config_path: None,
        };
        let pipeline = TranslatorPipeline::new(cfg, Box::new(fake), ConsoleProgress::new(false));
        (pipeline, calls, prompt)
    }

    #[test]
    fn writes_accumulated_fragments_to_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("doc.md");
        let output = dir.path().join("doc.ja.md");
        fs::write(&input, "# Hello\n").expect("write input");

        let (mut pipeline, calls, _) = test_pipeline(&["Hola", " ", "Mundo"]);
        pipeline.translate_to_path(&input, &output).expect("translate");

        assert_eq!(fs::read_to_string(&output).expect("read output"), "Hola Mundo");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn second_run_overwrites_instead_of_appending() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("doc.md");
        let output = dir.path().join("doc.ja.md");
        fs::write(&input, "# Hello\n").expect("write input");

        let (mut pipeline, _, _) = test_pipeline(&["Hola", " ", "Mundo"]);
        pipeline.translate_to_path(&input, &output).expect("first run");
        pipeline.translate_to_path(&input, &output).expect("second run");

        assert_eq!(fs::read_to_string(&output).expect("read output"), "Hola Mundo");
    }

    #[test]
    fn missing_input_fails_before_backend_and_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("missing.md");
        let output = dir.path().join("out.md");

        let (mut pipeline, calls, _) = test_pipeline(&["unused"]);
        let err = pipeline.translate_to_path(&input, &output).unwrap_err();

        assert!(format!("{err:#}").contains("read input"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!output.exists());
    }

    #[test]
    fn echoed_wrapper_is_stripped_before_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("doc.md");
        let output = dir.path().join("out.md");
        fs::write(&input, "# Hello\n").expect("write input");

        let (mut pipeline, _, _) = test_pipeline(&["<markdown>\n", "Hola", "\n</markdown>"]);
        pipeline.translate_to_path(&input, &output).expect("translate");

        assert_eq!(fs::read_to_string(&output).expect("read output"), "Hola");
    }

    #[test]
    fn prompt_embeds_content_and_language() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("doc.md");
        fs::write(&input, "# A very specific heading\n").expect("write input");

        let (mut pipeline, _, prompt) = test_pipeline(&["ok"]);
        pipeline.translate(&input).expect("translate");

        let sent = prompt.lock().expect("lock").clone();
        assert!(sent.contains("# A very specific heading"));
        assert!(sent.contains("translate this markdown to ja"));
        assert!(!sent.contains("{{content}}"));
        assert!(!sent.contains("{{language_code}}"));
    }
}
