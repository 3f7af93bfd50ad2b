//! One-shot render: run the pipeline once from the command line.

use clap::Parser;
use edureel::adapters::local::events::EventHub;
use edureel::app::build_pipeline;
use edureel::application::GenerationRequest;
use edureel::{AppConfig, OutputStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "edureel-render", about = "Render one educational video")]
struct Args {
    /// Story summary the script is written from
    #[arg(long)]
    summary: String,

    /// Language of the narration
    #[arg(long)]
    language: String,

    /// Reference picture of the main character
    #[arg(long)]
    image: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("edureel=info")),
        )
        .init();

    let args = Args::parse();
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(image) = &args.image {
        if !image.is_file() {
            eprintln!("Image not found: {}", image.display());
            std::process::exit(2);
        }
    }

    let store = OutputStore::new(config.output_dir.clone());
    if let Err(e) = store.ensure_dirs().await {
        eprintln!("Failed to create output directories: {}", e);
        std::process::exit(1);
    }

    let pipeline = build_pipeline(&config, Arc::new(EventHub::new()));
    let request = GenerationRequest {
        run_id: uuid::Uuid::new_v4().simple().to_string(),
        summary: args.summary,
        language: args.language,
        reference_image: args.image,
    };

    match pipeline.run(request).await {
        Ok(output) => println!("{}", output.video_path.display()),
        Err(e) => {
            eprintln!("Generation failed: {}", e);
            std::process::exit(1);
        }
    }
}
