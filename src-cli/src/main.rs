use std::path::PathBuf;

use clap::Parser;
use recipe_stream_lib::{RunOptions, EXIT_FAILURE};

#[derive(Parser, Debug)]
#[command(name = "recipe-stream")]
#[command(about = "Extract a recipe from a cooking video with live progress")]
struct Args {
    /// Video URL
    url: String,

    /// Your location, used for ingredient cost estimates
    location: String,

    /// Use the single request/response endpoint (no progress, not cancellable)
    #[arg(long)]
    regular: bool,

    /// Extraction backend base URL (overrides settings and RECIPE_BACKEND_URL)
    #[arg(long, value_name = "URL")]
    backend: Option<String>,

    /// Settings file (default: ~/.config/recipe-stream/settings.json)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Only report the outcome
    #[arg(long, short)]
    quiet: bool,
}

fn main() {
    let args = Args::parse();

    recipe_stream_lib::init_logging(&["recipe_stream=info", "recipe_stream_core=info"]);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create Tokio runtime: {}", e);
            std::process::exit(EXIT_FAILURE);
        }
    };

    let options = RunOptions {
        url: args.url,
        location: args.location,
        regular: args.regular,
        backend: args.backend,
        config: args.config,
        quiet: args.quiet,
    };

    let code = match rt.block_on(recipe_stream_lib::run(options)) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            EXIT_FAILURE
        }
    };
    drop(rt);
    std::process::exit(code);
}
