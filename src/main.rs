use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;

use clonevox::AppConfig;
use clonevox::services::VoiceCloner;
use clonevox::services::batch::run_batch;
use clonevox::services::tts::HttpModelBackend;
use clonevox::utils::logger::init_logger;

/// Озвучка директории текстов клонированным голосом
#[derive(Parser, Debug)]
#[command(name = "clonevox", version, about = "Synthesize a directory of texts in a cloned voice")]
struct Args {
    /// Path to the JSON config file
    #[arg(short, long, default_value = "clonevox.json")]
    config: PathBuf,

    /// Reference audio of the voice to clone
    #[arg(short, long)]
    reference: PathBuf,

    /// Transcript of the reference audio; transcribed by the model server when omitted
    #[arg(long)]
    reference_text: Option<String>,

    /// Keep the whole reference clip, overriding `reference.clip_short` from the config
    #[arg(long)]
    no_clip: bool,

    /// Directory with .txt files to synthesize
    #[arg(short, long)]
    input_dir: PathBuf,

    /// Where the WAV files are written
    #[arg(short, long, default_value = "audio")]
    output_dir: PathBuf,

    /// Skip texts whose output file already exists
    #[arg(long)]
    skip_existing: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();

    let config = AppConfig::load(&args.config).context("failed to load config")?;
    info!("Using model server at {}", config.backend.url);

    let backend = Arc::new(HttpModelBackend::new(&config.backend));
    let transcribe = config.backend.transcribe;
    let mut builder = VoiceCloner::builder(backend.clone(), config);
    if transcribe {
        builder = builder.transcriber(backend);
    }
    let cloner = builder.build();

    info!("Processing the reference voice...");
    cloner
        .preprocess_reference_file(&args.reference, args.reference_text.as_deref(), args.no_clip.then_some(false))
        .await
        .context("failed to prepare reference voice")?;
    if let Some(duration) = cloner.reference_duration().await {
        info!("Reference audio duration used: {:.2} seconds", duration);
    }

    let report = run_batch(&cloner, &args.input_dir, &args.output_dir, args.skip_existing).await?;
    info!(
        "Done: {} written, {} skipped, {} failed",
        report.written.len(),
        report.skipped.len(),
        report.failed.len()
    );

    for (path, failure) in &report.failed {
        error!("{}: [{}] {} ({})", path.display(), failure.category, failure.message, failure.hint);
    }
    if cloner.state().is_fatal() {
        bail!("model backend entered a fatal state; restart required");
    }
    Ok(())
}
