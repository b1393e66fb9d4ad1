//! Compare a new performance video against a reference video.

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use movement_analyzer::compare::compare;
use movement_analyzer::config::Config;
use movement_analyzer::pose::{BlazePoseDetector, Sequence};
use movement_analyzer::report;
use movement_analyzer::video::{detect_sequence, VideoSource};

#[derive(Parser, Debug)]
#[command(name = "compare_videos", version = env!("GIT_VERSION"))]
struct Args {
    reference: PathBuf,
    new: PathBuf,

    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Print the text report instead of JSON
    #[arg(long)]
    text: bool,
}

fn load(path: &Path, detector: &mut BlazePoseDetector, config: &Config) -> Result<Sequence> {
    let mut source = VideoSource::open(path, &config.video)?;
    detect_sequence(&mut source, detector, None, config.scoring.visibility_threshold)
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = Config::load_or_default(&args.config);
    info!("Compare Videos ({})", env!("GIT_VERSION"));

    let mut detector = BlazePoseDetector::load(&config.video.model_path)?;
    let reference = load(&args.reference, &mut detector, &config)?;
    let new = load(&args.new, &mut detector, &config)?;

    let result = compare(&reference, &new, &config.scoring);
    if args.text {
        print!("{}", report::comparison_report(&result));
    } else {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}
