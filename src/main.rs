//! Capture Integrity CLI
//!
//! Command-line interface for scoring, stripping and signing captures,
//! and for demonstrating the live quality loop against a mock source.

use capture_integrity::{
    capture::{FrameSource, ImageFrame, MockFrameSource, MockPattern},
    metrics::MetricsRegistry,
    quality::{MonitorEvent, QualityAnalyzer, QualityMonitor},
    signing::{CaptureContext, Ed25519ClientSigner, Ed25519UserSigner, OsRandom, SessionId},
    strip::{self, ContainerFormat},
    CapturePipeline, FileConfig,
};
use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "capture-integrity", version, about = "Capture quality, metadata stripping and signing")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode an image and print its quality report as JSON.
    Analyze { image: PathBuf },
    /// Strip metadata from an image and write the cleaned bytes.
    Strip { input: PathBuf, output: PathBuf },
    /// Report whether an image carries strippable metadata.
    Inspect { image: PathBuf },
    /// Strip and sign an image with ephemeral demo keys; prints the package.
    Sign {
        image: PathBuf,
        #[arg(long, default_value = "cli-device")]
        device: String,
        #[arg(long, default_value = "document")]
        subject: String,
        /// Refuse to sign when the quality analysis does not pass.
        #[arg(long)]
        require_quality: bool,
    },
    /// Print a fresh capture session id.
    SessionId,
    /// Run the quality loop against a mock frame source.
    Monitor {
        /// Stop after this many ticks (runs until Ctrl-C when omitted).
        #[arg(long)]
        ticks: Option<u64>,
        #[arg(long, default_value_t = 1280)]
        width: u32,
        #[arg(long, default_value_t = 960)]
        height: u32,
        #[arg(long, value_enum, default_value_t = PatternArg::Checkerboard)]
        pattern: PatternArg,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum PatternArg {
    Uniform,
    Checkerboard,
    VerticalEdge,
}

impl From<PatternArg> for MockPattern {
    fn from(arg: PatternArg) -> Self {
        match arg {
            PatternArg::Uniform => MockPattern::Uniform,
            PatternArg::Checkerboard => MockPattern::Checkerboard,
            PatternArg::VerticalEdge => MockPattern::VerticalEdge,
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };

    let result = match cli.command {
        Command::Analyze { image } => analyze(&config, &image),
        Command::Strip { input, output } => strip_file(&input, &output),
        Command::Inspect { image } => inspect(&image),
        Command::Sign {
            image,
            device,
            subject,
            require_quality,
        } => sign(&config, &image, device, subject, require_quality).await,
        Command::SessionId => session_id(),
        Command::Monitor {
            ticks,
            width,
            height,
            pattern,
        } => monitor(&config, ticks, width, height, pattern.into()).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn analyze(config: &FileConfig, path: &Path) -> CliResult {
    let frame = ImageFrame::decode(&std::fs::read(path)?)?;
    let report = QualityAnalyzer::new(config.quality.clone()).analyze(&frame);
    info!(
        score = report.score,
        passed = report.passed,
        issues = report.issues.len(),
        "Analysis complete"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn strip_file(input: &Path, output: &Path) -> CliResult {
    let result = strip::strip(&std::fs::read(input)?)?;
    std::fs::write(output, result.image().as_bytes())?;

    info!(
        original = result.original_size(),
        cleaned = result.cleaned_size(),
        truncated = result.truncated(),
        "Wrote stripped image"
    );
    for category in result.removed_categories() {
        println!("removed: {}", category);
    }
    Ok(())
}

fn inspect(path: &Path) -> CliResult {
    let bytes = std::fs::read(path)?;
    println!("format: {}", ContainerFormat::detect(&bytes));
    println!("has_metadata: {}", strip::has_metadata(&bytes));
    Ok(())
}

async fn sign(
    config: &FileConfig,
    path: &Path,
    device: String,
    subject: String,
    require_quality: bool,
) -> CliResult {
    let bytes = std::fs::read(path)?;
    let frame = ImageFrame::decode(&bytes)?;
    let report = QualityAnalyzer::new(config.quality.clone()).analyze(&frame);
    if !report.passed {
        warn!(score = report.score, "Image did not pass quality analysis");
    }

    let now = chrono::Utc::now();
    let context = CaptureContext {
        device_fingerprint: device,
        client_version: capture_integrity::VERSION.to_string(),
        captured_at: now,
        subject_type: subject,
        quality_score: report.score,
        session_id: SessionId::generate(now.timestamp_millis(), &mut OsRandom)?,
    };

    // Ephemeral demo keys; real deployments supply their own signers.
    let client = Ed25519ClientSigner::generate(&mut OsRandom, "capture-integrity-cli", capture_integrity::VERSION)?;
    let user = Ed25519UserSigner::generate(&mut OsRandom)?;

    let mut pipeline = CapturePipeline::from_config(config);
    let outcome = if require_quality {
        pipeline
            .process_checked(&report, &bytes, &context, &client, &user)
            .await?
    } else {
        pipeline.process(&bytes, &context, &client, &user).await?
    };

    println!("{}", outcome.package.to_json()?);
    Ok(())
}

fn session_id() -> CliResult {
    let id = SessionId::generate(chrono::Utc::now().timestamp_millis(), &mut OsRandom)?;
    println!("{}", id);
    Ok(())
}

async fn monitor(
    config: &FileConfig,
    ticks: Option<u64>,
    width: u32,
    height: u32,
    pattern: MockPattern,
) -> CliResult {
    let metrics = Arc::new(MetricsRegistry::new()?);
    start_metrics_server(config, &metrics);

    let mut source = MockFrameSource::new(width, height, pattern);
    source.open()?;

    let (stop_tx, mut stop_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(true);
    })?;

    let (event_tx, mut events) = mpsc::unbounded_channel();
    let monitor = QualityMonitor::spawn(
        config.monitor.clone(),
        QualityAnalyzer::new(config.quality.clone()),
        source,
        move |event| {
            let _ = event_tx.send(event);
        },
    );

    loop {
        let event = tokio::select! {
            _ = stop_rx.changed() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match &event {
            MonitorEvent::Quick { tick, assessment } => {
                metrics.record_quick_check(assessment);
                match &assessment.main_issue {
                    Some(issue) => println!("tick {:>4}  quick  {}", tick, issue),
                    None => println!("tick {:>4}  quick  ok", tick),
                }
            }
            MonitorEvent::Full { tick, result } => {
                metrics.record_analysis(result);
                println!(
                    "tick {:>4}  full   score={} passed={} issues={}",
                    tick,
                    result.score,
                    result.passed,
                    result.issues.len()
                );
            }
            MonitorEvent::SourceError { tick, message } => {
                warn!(tick, message = message.as_str(), "Frame source error");
            }
        }

        if ticks.is_some_and(|limit| event.tick() >= limit) {
            break;
        }
    }

    let taken = monitor.stop().await;
    info!(ticks = taken, "Monitor finished");
    Ok(())
}

#[cfg(feature = "metrics")]
fn start_metrics_server(config: &FileConfig, metrics: &Arc<MetricsRegistry>) {
    use capture_integrity::metrics::{MetricsServer, MetricsServerConfig};

    if config.output.metrics_port == 0 {
        return;
    }
    let server = MetricsServer::new(
        MetricsServerConfig::with_port(config.output.metrics_port),
        Arc::clone(metrics),
    );
    tokio::spawn(async move {
        if let Err(e) = server.run().await {
            warn!(error = %e, "Metrics server stopped");
        }
    });
}

#[cfg(not(feature = "metrics"))]
fn start_metrics_server(_config: &FileConfig, _metrics: &Arc<MetricsRegistry>) {}
