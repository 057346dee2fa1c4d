//! Highlight reel batch runner binary.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_worker::{metrics, Pipeline, RunRequest, ShortsMode, WorkerConfig};

/// Compile a manifest of clips into a branded video, thumbnail and shorts.
#[derive(Debug, Parser)]
#[command(name = "reel-worker", version)]
struct Args {
    /// JSON array of clip descriptors
    #[arg(long, short = 'm')]
    manifest: PathBuf,

    /// Title for the compilation; dated default when omitted
    #[arg(long, short = 't')]
    title: Option<String>,

    /// Most clips to include
    #[arg(long)]
    max_videos: Option<usize>,

    /// Which shorts to produce
    #[arg(long, value_enum, default_value_t = ShortsMode::None)]
    shorts: ShortsMode,

    /// Root for compilations, thumbnails and shorts
    #[arg(long, env = "REEL_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["reel=info", "reel_media=info", "reel_worker=info"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = WorkerConfig::from_env().context("loading worker configuration")?;
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    info!("Worker config: {:?}", config);
    let settings = config.media_settings().context("loading media settings")?;

    let metrics_handle = match &config.metrics_file {
        Some(_) => match metrics::init_metrics() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Metrics disabled: {}", e);
                None
            }
        },
        None => None,
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, stopping after the current step");
            let _ = cancel_tx.send(true);
        }
    });

    let metrics_file = config.metrics_file.clone();
    let pipeline = Pipeline::new(config, settings).with_cancel(cancel_rx);
    let request = RunRequest {
        manifest: args.manifest,
        title: args.title,
        max_videos: args.max_videos,
        shorts: args.shorts,
    };
    let outcome = pipeline.run(&request).await;

    metrics::record_run(match &outcome {
        Ok(_) => "success",
        Err(e) if e.is_cancelled() => "cancelled",
        Err(_) => "failure",
    });
    if let (Some(handle), Some(path)) = (&metrics_handle, &metrics_file) {
        if let Err(e) = metrics::write_snapshot(handle, path).await {
            warn!(path = %path.display(), "Could not write metrics snapshot: {}", e);
        }
    }

    let summary = outcome.context("compilation run failed")?;
    info!(
        run_id = %summary.run_id,
        compilation = %summary.compilation.output_path.display(),
        thumbnail = ?summary.thumbnail,
        shorts = summary.shorts.len(),
        "Run finished"
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing();

    info!("Starting reel-worker");

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
