use std::path::PathBuf;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cpu_burner::{Event, SessionController, SessionState, TestConfig, UtilizationMonitor};

/// Saturate CPU cores for stress and burn-in testing.
///
/// High load raises CPU temperature; make sure cooling works before long
/// runs.
#[derive(Parser)]
#[command(name = "cpu-burner", version)]
struct Args {
    /// Number of worker processes (defaults to the logical core count)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Compute speed percentage (1-100); lower values widen the idle gap
    /// between bursts
    #[arg(short, long, default_value_t = 100)]
    speed: u32,

    /// Target duty cycle percentage per worker (1-100)
    #[arg(short, long, default_value_t = 100)]
    max_usage: u32,

    /// Test duration in seconds
    #[arg(short, long, default_value = "30")]
    duration: String,

    /// Read the test parameters from a JSON file instead of flags
    #[arg(long, conflicts_with_all = ["workers", "speed", "max_usage", "duration"])]
    config: Option<PathBuf>,

    /// Print a CPU utilization sample every second
    #[arg(long)]
    show_usage: bool,
}

fn print_event(event: &Event) {
    println!("[{}] {}", event.timestamp.format("%H:%M:%S"), event.message);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = match build_config(&args) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(1);
        }
    };

    let (controller, events) = SessionController::new();
    let show_usage = args.show_usage;
    let monitor = UtilizationMonitor::start(move |usage| {
        if show_usage {
            println!("CPU usage: {usage:.1}%");
        }
    });

    if let Err(err) = controller.start_session(config) {
        eprintln!("failed to start stress test: {err}");
        std::process::exit(1);
    }

    loop {
        match events.recv_timeout(Duration::from_millis(500)) {
            Ok(event) => print_event(&event),
            Err(RecvTimeoutError::Timeout) => {
                if controller.state() == SessionState::Idle {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    for event in events.try_iter() {
        print_event(&event);
    }

    println!("Final CPU usage: {:.1}%", monitor.latest());
    monitor.stop();
    controller.shutdown();
}

fn build_config(args: &Args) -> Result<TestConfig, String> {
    if let Some(path) = &args.config {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
        return serde_json::from_str(&raw).map_err(|err| format!("invalid config file: {err}"));
    }

    let duration = TestConfig::parse_duration(&args.duration)
        .map_err(|err| format!("invalid duration: {err}"))?;
    Ok(TestConfig {
        worker_count: args.workers.unwrap_or_else(num_cpus::get),
        speed_factor: args.speed,
        max_usage: args.max_usage,
        duration,
    })
}
