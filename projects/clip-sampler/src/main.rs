mod cli;
mod logging;
mod pipeline;
mod run_artifacts;
mod run_context;
mod video;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use pipeline::classifier::OnnxClassifier;
use pipeline::driver::SamplingDriver;
use pipeline::orchestrator::run_batch;
use pipeline::transform::CropTransform;
use run_artifacts::{write_summary, RunSummary};
use run_context::RunContext;
use std::sync::Arc;
use std::time::Instant;
use video::ffmpeg_source::FfmpegVideoSource;

fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    let args = Args::parse_args();
    let ctx = RunContext::from_args(&args)?;
    let _log_guard = logging::init_logging(&ctx.save_dir, &args.logging_file)?;

    tracing::info!("{}", serde_json::to_string(&args)?);
    tracing::info!("Found {} videos to process", ctx.videos.len());

    let config = ctx
        .params
        .clone()
        .validate()
        .context("Invalid sampling configuration")?;
    let transform = CropTransform::from_config(&config).context("Invalid crop size")?;
    let driver = Arc::new(SamplingDriver::new(config, Box::new(transform))?);

    let mut classifier = OnnxClassifier::new(&ctx.model_path, ctx.threads)?;
    let opener = FfmpegVideoSource::opener(ctx.new_width, ctx.new_height);

    let started_at = Utc::now();
    let start = Instant::now();
    let records = run_batch(&ctx, driver, opener, &mut classifier)?;

    let summary = RunSummary::new(
        &ctx.model_name,
        ctx.num_classes,
        started_at,
        ctx.params.clone(),
        records,
    );
    write_summary(&ctx.save_dir, &summary)?;

    tracing::info!(
        "Total inference time is {:.4} minutes ({} succeeded, {} failed)",
        start.elapsed().as_secs_f64() / 60.0,
        summary.succeeded,
        summary.failed
    );

    Ok(())
}
