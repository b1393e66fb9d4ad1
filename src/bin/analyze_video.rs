//! Detect poses in a video file and score the movement.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use movement_analyzer::analysis::MetricEngine;
use movement_analyzer::config::Config;
use movement_analyzer::pose::BlazePoseDetector;
use movement_analyzer::report;
use movement_analyzer::video::{detect_sequence, VideoSource};

#[derive(Parser, Debug)]
#[command(name = "analyze_video", version = env!("GIT_VERSION"))]
struct Args {
    /// Input video
    video: PathBuf,

    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Write the detected landmark sequence as JSON
    #[arg(long)]
    landmarks: Option<PathBuf>,

    /// Write a copy of the video with the skeleton drawn
    #[arg(long)]
    annotate: Option<PathBuf>,

    /// Print the text report instead of JSON
    #[arg(long)]
    text: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = Config::load_or_default(&args.config);
    info!("Analyze Video ({})", env!("GIT_VERSION"));

    let mut detector = BlazePoseDetector::load(&config.video.model_path)?;
    let mut source = VideoSource::open(&args.video, &config.video)?;
    let sequence = detect_sequence(
        &mut source,
        &mut detector,
        args.annotate.as_deref(),
        config.scoring.visibility_threshold,
    )?;

    if let Some(path) = &args.landmarks {
        std::fs::write(path, serde_json::to_string(&sequence)?)?;
        info!(path = %path.display(), "landmarks written");
    }

    let result = MetricEngine::new(config.scoring).analyze(&sequence);
    if args.text {
        print!("{}", report::generate_report(&result));
    } else {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}
