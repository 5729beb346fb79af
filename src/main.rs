//! Relume Capture CLI
//!
//! Runs the supervised acquisition loop against the simulated camera and
//! pushes every frame through the preprocessing pipeline.

use clap::Parser;
use relume_capture::{
    capture::{FileConfig, Frame, MockDevice},
    metrics::MetricsRegistry,
    preprocess::{Preprocessor, Stage},
    supervisor::CaptureSupervisor,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "relume-capture", version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Frames to deliver before stopping (0 runs until Ctrl+C)
    #[arg(short, long)]
    frames: Option<u64>,

    /// Skip the preprocessing pipeline
    #[arg(long)]
    no_preprocess: bool,

    /// Log statistics for every pipeline stage
    #[arg(long)]
    inspect_stages: bool,

    /// Make every Nth simulated read fail
    #[arg(long, default_value_t = 0)]
    fail_every: u64,

    /// Print Prometheus metrics on exit
    #[arg(long)]
    metrics: bool,
}

fn mean(frame: &Frame) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum: u64 = frame.pixels().iter().map(|&p| u64::from(p)).sum();
    sum as f64 / frame.pixels().len() as f64
}

/// `RUST_LOG` directives when set and valid, `info` otherwise.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn main() {
    // Initialize logging
    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(rust_log.as_deref()))
        .init();

    let args = Args::parse();
    info!("Relume Capture v{}", relume_capture::VERSION);

    let mut config = match &args.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };
    if let Some(frames) = args.frames {
        config.output.frame_count = frames;
    }
    if args.no_preprocess {
        config.output.preprocess = false;
    }
    if args.inspect_stages {
        config.output.inspect_stages = true;
    }

    let preprocessor = match Preprocessor::new(config.pipeline.clone()) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Invalid pipeline parameters: {}", e);
            std::process::exit(1);
        }
    };
    let metrics = match MetricsRegistry::new() {
        Ok(m) => Arc::new(m),
        Err(e) => {
            eprintln!("Failed to create metrics registry: {}", e);
            std::process::exit(1);
        }
    };

    let device = MockDevice::new();
    device.handle().fail_every(args.fail_every);
    let mut supervisor =
        match CaptureSupervisor::new(device, config.camera.clone(), config.supervisor.clone()) {
            Ok(s) => s.with_observer(metrics.clone()),
            Err(e) => {
                eprintln!("Failed to create supervisor: {}", e);
                std::process::exit(1);
            }
        };

    let delivered = Arc::new(AtomicU64::new(0));
    {
        let delivered = delivered.clone();
        let metrics = metrics.clone();
        let output = config.output.clone();
        supervisor.register_consumer(move |frame| {
            delivered.fetch_add(1, Ordering::SeqCst);
            if !output.preprocess {
                return Ok(());
            }

            let enhanced = if output.inspect_stages {
                preprocessor.process_inspected(&frame, &mut |stage: Stage, out: &Frame| {
                    info!(
                        sequence = out.sequence(),
                        %stage,
                        mean = mean(out),
                        "Stage output"
                    );
                })?
            } else {
                preprocessor.process(&frame)?
            };
            metrics.record_processed();
            info!(
                sequence = enhanced.sequence(),
                width = enhanced.width(),
                height = enhanced.height(),
                mean = mean(&enhanced),
                "Frame preprocessed"
            );
            Ok(())
        });
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        if let Err(err) = ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        }) {
            warn!("Failed to install Ctrl+C handler: {err}");
        }
    }

    if let Err(e) = supervisor.start() {
        eprintln!("Failed to start capture: {}", e);
        std::process::exit(1);
    }
    info!("Capturing... (press Ctrl+C to stop)");

    let target = config.output.frame_count;
    while running.load(Ordering::SeqCst) {
        if target > 0 && delivered.load(Ordering::SeqCst) >= target {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    supervisor.release();
    info!(
        "Delivered {} frames ({} read failures, {} reinitializations)",
        delivered.load(Ordering::SeqCst),
        metrics.read_failures_total(),
        metrics.reinitializations_total()
    );

    if args.metrics {
        match metrics.encode() {
            Ok(text) => println!("{}", text),
            Err(e) => warn!("Failed to encode metrics: {}", e),
        }
    }
}
