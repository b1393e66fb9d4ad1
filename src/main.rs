use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use movement_analyzer::analysis::MetricEngine;
use movement_analyzer::compare::compare;
use movement_analyzer::config::Config;
use movement_analyzer::pose::{
    classify, BodyMeasurements, CentroidClassifier, Classification, Frame, PoseClass,
    PoseClassifier, Sequence,
};
use movement_analyzer::report;
use movement_analyzer::triangulation::Triangulator;

const CONFIG_PATH: &str = "config.toml";

/// Movement quality analysis on pose landmark sequences
#[derive(Parser, Debug)]
#[command(name = "movement-analyzer")]
#[command(version = env!("GIT_VERSION"), about)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = Format::Json)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score a single landmark sequence
    Analyze {
        /// Sequence JSON ({"frames": [...], "fps": 30})
        sequence: PathBuf,
    },
    /// Compare a new sequence against a reference
    Compare {
        reference: PathBuf,
        new: PathBuf,
    },
    /// Reconstruct 3D landmarks from per-view detections
    Triangulate {
        /// One Frame JSON per view (or one Sequence JSON per view with --sequence)
        #[arg(required = true)]
        views: Vec<PathBuf>,

        /// Treat inputs as sequences and score the reconstructed 3D sequence
        #[arg(long)]
        sequence: bool,
    },
    /// Check whether per-view detections are usable for 3D
    ValidateViews {
        #[arg(required = true)]
        views: Vec<PathBuf>,
    },
    /// Classify the pose of a single frame
    Classify {
        /// Frame JSON (array of 33 landmarks)
        frame: PathBuf,

        /// Trained classifier model (JSON centroids)
        #[arg(long)]
        model: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct PoseSummary {
    pose: Option<PoseClass>,
    measurements: BodyMeasurements,
    model: Option<Classification>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config);
    info!(version = env!("GIT_VERSION"), "movement-analyzer");

    match cli.command {
        Commands::Analyze { sequence } => {
            let sequence: Sequence = read_json(&sequence)?;
            let result = MetricEngine::new(config.scoring).analyze(&sequence);
            match cli.format {
                Format::Json => print_json(&result)?,
                Format::Text => print!("{}", report::generate_report(&result)),
            }
        }
        Commands::Compare { reference, new } => {
            let reference: Sequence = read_json(&reference)?;
            let new: Sequence = read_json(&new)?;
            let result = compare(&reference, &new, &config.scoring);
            match cli.format {
                Format::Json => print_json(&result)?,
                Format::Text => print!("{}", report::comparison_report(&result)),
            }
        }
        Commands::Triangulate { views, sequence: false } => {
            let frames = views.iter().map(|p| read_json::<Frame>(p)).collect::<Result<Vec<_>>>()?;
            let reconstruction = Triangulator::new(config.triangulation).triangulate_views(&frames)?;
            match cli.format {
                Format::Json => print_json(&reconstruction)?,
                Format::Text => print!("{}", report::reconstruction_report(&reconstruction)),
            }
        }
        Commands::Triangulate { views, sequence: true } => {
            let sequences = views.iter().map(|p| read_json::<Sequence>(p)).collect::<Result<Vec<_>>>()?;
            let sequence_3d = Triangulator::new(config.triangulation).triangulate_sequence(&sequences)?;
            let result = MetricEngine::new(config.scoring).analyze(&sequence_3d);
            match cli.format {
                Format::Json => print_json(&result)?,
                Format::Text => print!("{}", report::generate_report(&result)),
            }
        }
        Commands::ValidateViews { views } => {
            let frames = views.iter().map(|p| read_json::<Frame>(p)).collect::<Result<Vec<_>>>()?;
            let validation = Triangulator::new(config.triangulation).validate_views(&frames);
            match cli.format {
                Format::Json => print_json(&validation)?,
                Format::Text => {
                    for view in &validation.views {
                        println!(
                            "view {}: {} (confidence {:.2}, {} landmarks)",
                            view.index,
                            if view.valid { "ok" } else { "invalid" },
                            view.confidence,
                            view.landmarks_detected
                        );
                    }
                    println!(
                        "{}/{} valid, quality {:?}, ready for 3D: {}",
                        validation.valid_views, validation.total_views, validation.quality, validation.ready_for_3d
                    );
                }
            }
        }
        Commands::Classify { frame, model } => {
            let frame: Frame = read_json(&frame)?;
            let threshold = config.scoring.visibility_threshold;
            let classifier = model.as_deref().map(CentroidClassifier::load).transpose()?;
            let summary = PoseSummary {
                pose: classify(&frame, threshold),
                measurements: BodyMeasurements::from_frame(&frame, threshold),
                model: match &classifier {
                    Some(c) => c.classify(&frame)?,
                    None => None,
                },
            };
            match cli.format {
                Format::Json => print_json(&summary)?,
                Format::Text => {
                    match summary.pose {
                        Some(pose) => println!("pose: {}", pose),
                        None => println!("pose: not enough visible landmarks"),
                    }
                    let m = &summary.measurements;
                    for (name, value) in [
                        ("shoulder width", m.shoulder_width),
                        ("hip width", m.hip_width),
                        ("body height", m.body_height),
                    ] {
                        if let Some(v) = value {
                            println!("{}: {:.3}", name, v);
                        }
                    }
                    if let Some(c) = &summary.model {
                        println!("model: {} ({:.0}%)", c.pose, c.confidence * 100.0);
                    }
                }
            }
        }
    }

    Ok(())
}
