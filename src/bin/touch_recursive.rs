use std::path::PathBuf;

use clap::Parser;

use md_translator::touch::touch_recursive;

#[derive(Parser, Debug)]
#[command(name = "touch-recursive")]
#[command(about = "Refresh file timestamps under a path, creating missing files", long_about = None)]
struct Args {
    /// Path to touch (directories are walked, files get fresh timestamps)
    #[arg(value_name = "PATH")]
    path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    touch_recursive(&args.path)
}
