use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser};

use md_translator::models::remote::RemoteChatModel;
use md_translator::pipeline::{init_default_config, PipelineConfig, TranslatorPipeline};
use md_translator::progress::ConsoleProgress;

#[derive(Parser, Debug)]
#[command(name = "md-translator")]
#[command(about = "Markdown translator (streaming chat-completion backends)", long_about = None)]
struct Args {
    /// Generate default config + prompt files, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write config/prompt files (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite existing config/prompt files when used with --init-config
    #[arg(long)]
    force: bool,

    /// Target language code (e.g. zh, ja, fr)
    #[arg(value_name = "LANG")]
    language_code: Option<String>,

    /// Input markdown file
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Output path for the translated markdown
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Config file path (default: search for md-translator.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend name from config (e.g. openai)
    #[arg(long)]
    backend: Option<String>,

    /// Suppress the streamed echo of the translation on stdout
    #[arg(long)]
    silent: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let progress = ConsoleProgress::new(true);

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let (language_code, input, output) = match (args.language_code, args.input, args.output) {
        (Some(l), Some(i), Some(o)) => (l, i, o),
        _ => {
            let mut cmd = Args::command();
            cmd.print_help().context("print help")?;
            eprintln!(
                "\n\nUSAGE:\n  md-translator <lang> <input.md> <output.md>\n\nTIPS:\n  - The API key is read from OPENAI_API_KEY (or the api_key_env of your backend).\n  - Default config search: md-translator.toml (upwards), or set MD_TRANSLATOR_CONFIG.\n"
            );
            return Ok(());
        }
    };

    let cfg = PipelineConfig::from_args(language_code, args.config, args.backend, args.silent)
        .context("build config")?;

    let backend = RemoteChatModel::new(cfg.backend.clone())?;
    let mut pipeline = TranslatorPipeline::new(cfg, Box::new(backend), progress);
    pipeline.translate_to_path(&input, &output)?;
    Ok(())
}
