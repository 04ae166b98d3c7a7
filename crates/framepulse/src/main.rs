//! Framepulse CLI.
//!
//! `fp simulate` drives the full agent pipeline with a synthetic frame
//! trace against a real ingestion endpoint - useful for smoke-testing a
//! server deployment or watching the pipeline behave under jank and
//! failure. `fp check-config` validates a TOML config file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use framepulse_core::logging::{LogConfig, LogFormat, init_logging};
use framepulse_core::{Agent, AgentConfig, HostInfo, LogSeverity, SharedClock, SystemClock};

#[derive(Parser)]
#[command(name = "fp", version, about = "Framepulse telemetry agent CLI")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drive the pipeline with a synthetic frame trace
    Simulate {
        /// Ingestion endpoint base URL
        #[arg(long, default_value = "http://localhost:8080")]
        server: String,

        /// Application key for the X-App-Key header
        #[arg(long, default_value = "")]
        app_key: String,

        /// Reported application version
        #[arg(long, default_value = "0.0.0-sim")]
        app_version: String,

        /// Number of frames to simulate
        #[arg(long, default_value_t = 600)]
        frames: u32,

        /// Baseline frame rate
        #[arg(long, default_value_t = 60.0)]
        fps: f64,

        /// Inject a 120ms spike every N frames (0 = disable)
        #[arg(long, default_value_t = 90)]
        spike_every: u32,

        /// Also raise a synthetic exception every N frames (0 = disable)
        #[arg(long, default_value_t = 0)]
        throw_every: u32,

        /// Data directory (defaults to a temp dir so runs are isolated)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Validate a TOML config file and print the resolved settings
    CheckConfig {
        /// Path to the config file
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_logging(&LogConfig {
        level: cli.log_level.clone(),
        format,
        file: None,
    })
    .context("failed to initialize logging")?;

    match cli.command {
        Command::Simulate {
            server,
            app_key,
            app_version,
            frames,
            fps,
            spike_every,
            throw_every,
            data_dir,
        } => {
            simulate(
                server,
                app_key,
                app_version,
                frames,
                fps,
                spike_every,
                throw_every,
                data_dir,
            )
            .await
        }
        Command::CheckConfig { path } => check_config(&path),
    }
}

#[allow(clippy::too_many_arguments)]
async fn simulate(
    server: String,
    app_key: String,
    app_version: String,
    frames: u32,
    fps: f64,
    spike_every: u32,
    throw_every: u32,
    data_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let data_dir = match data_dir {
        Some(dir) => dir,
        None => tempdir()?,
    };

    let config = AgentConfig {
        server_url: server,
        app_key,
        app_version,
        data_dir: Some(data_dir),
        batch_size: 20,
        flush_interval_secs: 5.0,
        ..AgentConfig::default()
    };
    config.validate().context("invalid simulation config")?;

    let clock: SharedClock = Arc::new(SystemClock::new());
    let agent = Agent::new(config, host_info(), clock).context("failed to start agent")?;

    let frame_ms = 1000.0 / fps;
    println!("simulating {frames} frames at {fps:.0} fps (spike every {spike_every})");

    agent.scene_activated("SimulatedScene");
    for i in 1..=frames {
        let this_frame = if spike_every > 0 && i % spike_every == 0 {
            agent.note_event(&format!("spike at frame {i}"));
            120.0
        } else {
            frame_ms
        };
        agent.record_frame(this_frame);
        agent.record_memory_sample(64 * 1024 * 1024 + u64::from(i) * 1024, u64::from(i / 300));

        if throw_every > 0 && i % throw_every == 0 {
            agent.record_log_message(
                "SimulatedException: injected failure",
                "at fp::simulate ()",
                LogSeverity::Exception,
            );
        }

        if i == 30 {
            agent.mark_time_to_interactive();
        }

        tokio::time::sleep(Duration::from_secs_f64(this_frame / 1000.0)).await;
    }

    agent.flush();
    // Give the last request a moment to settle before reading stats
    tokio::time::sleep(Duration::from_millis(500)).await;

    println!("queue depth:       {}", agent.queue_depth());
    println!("offline records:   {}", agent.offline_record_count());
    println!("offline bytes:     {}", agent.offline_bytes());
    if let Some(stats) = agent.reporter_stats() {
        println!(
            "reporter:          failures={} backoff={}x",
            stats.consecutive_failures, stats.backoff_multiplier
        );
    }
    println!("--- network log ---");
    for entry in agent.network_logs().iter().rev().take(10).rev() {
        println!("[{}] {}", entry.unix_ms, entry.message);
    }

    agent.shutdown();
    Ok(())
}

fn check_config(path: &PathBuf) -> anyhow::Result<()> {
    let config = AgentConfig::load(path)
        .with_context(|| format!("config rejected: {}", path.display()))?;
    println!("config ok: {}", path.display());
    println!("  server:          {}", config.ingest_url());
    println!("  batch size:      {}", config.batch_size);
    println!("  queue capacity:  {}", config.max_queue_size);
    println!("  flush interval:  {}s", config.flush_interval_secs);
    println!(
        "  jank thresholds: {}ms / {}ms sustained",
        config.jank_threshold_ms, config.sustained_jank_threshold_ms
    );
    println!(
        "  offline storage: {} ({} bytes)",
        if config.enable_offline_storage {
            "enabled"
        } else {
            "disabled"
        },
        config.max_offline_storage_bytes
    );
    Ok(())
}

fn host_info() -> HostInfo {
    HostInfo {
        platform: std::env::consts::OS.to_string(),
        device_model: std::env::consts::ARCH.to_string(),
        os_version: std::env::consts::OS.to_string(),
    }
}

fn tempdir() -> anyhow::Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("framepulse-sim-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
