#![warn(missing_docs)]
//! # live-sight binary
//!
//! Terminal entry point: streams sampled frames to the analysis service,
//! logs display status lines and reads operator commands from stdin.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use live_sight_app::{APP_VERSION, AppConfig, Command, ConfigOverrides, LiveSession, init_logging};
use live_sight_capture::{CaptureBackend, SyntheticCaptureBackend};
use live_sight_core::ModeSelection;
use live_sight_stream::{WsConnector, redacted_endpoint};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Capture backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    /// Deterministic generated frames.
    Synthetic,
    /// Local camera (requires the `webcam` feature).
    Webcam,
}

/// Live capture-and-stream analysis client.
#[derive(Debug, Parser)]
#[command(name = "live-sight", version = APP_VERSION)]
struct Cli {
    /// Stream endpoint (`ws://` or `wss://`).
    #[arg(long)]
    endpoint: Option<String>,
    /// Milliseconds between capture ticks.
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Height frames are scaled down to before encoding.
    #[arg(long)]
    target_height: Option<u32>,
    /// JPEG quality, 1-100.
    #[arg(long)]
    jpeg_quality: Option<u8>,
    /// Milliseconds a request may stay unanswered.
    #[arg(long)]
    result_timeout_ms: Option<u64>,
    /// Initial mode: surveillance, assistive or self_driving.
    #[arg(long)]
    mode: Option<ModeSelection>,
    /// Video device index.
    #[arg(long)]
    device_index: Option<u32>,
    /// Capture backend.
    #[arg(long, value_enum, default_value_t = BackendKind::Synthetic)]
    backend: BackendKind,
    /// Wait for a `start` command instead of streaming immediately.
    #[arg(long)]
    no_autostart: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            endpoint: self.endpoint.clone(),
            interval_ms: self.interval_ms,
            target_height: self.target_height,
            jpeg_quality: self.jpeg_quality,
            result_timeout_ms: self.result_timeout_ms,
            mode: self.mode,
            device_index: self.device_index,
        }
    }
}

/// CLI entry point.
fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(error) = init_logging() {
        eprintln!("failed to initialise logging: {error}");
        return ExitCode::FAILURE;
    }

    let loaded = AppConfig::from_env().and_then(|config| config.with_overrides(cli.overrides()));
    let config = match loaded {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(stage = "config", action = "load_failed", %error);
            return ExitCode::FAILURE;
        }
    };

    let backend = match capture_backend(cli.backend) {
        Ok(backend) => backend,
        Err(detail) => {
            tracing::error!(stage = "capture", action = "backend_unavailable", %detail);
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            tracing::error!(stage = "runtime", action = "build_failed", %error);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        stage = "app",
        action = "launch",
        version = APP_VERSION,
        endpoint = %redacted_endpoint(&config.endpoint),
        backend = ?cli.backend,
        capture_enabled = config.capture_enabled,
    );

    runtime.block_on(async move {
        let mut session = LiveSession::new(
            config.session_settings(),
            backend,
            Arc::new(WsConnector::new()),
        );
        let (command_tx, mut command_rx) = mpsc::unbounded_channel();

        if !cli.no_autostart {
            let _ = command_tx.send(Command::Start);
        }
        spawn_stdin_reader(command_tx.clone());
        spawn_ctrl_c_watcher(command_tx);

        session.run(&mut command_rx).await;
    });

    tracing::info!(stage = "app", action = "exit");
    ExitCode::SUCCESS
}

fn capture_backend(kind: BackendKind) -> Result<Box<dyn CaptureBackend>, String> {
    match kind {
        BackendKind::Synthetic => Ok(Box::new(SyntheticCaptureBackend::new())),
        #[cfg(feature = "webcam")]
        BackendKind::Webcam => Ok(Box::new(live_sight_capture::WebcamCaptureBackend::new())),
        #[cfg(not(feature = "webcam"))]
        BackendKind::Webcam => Err("binary was built without the `webcam` feature".to_string()),
    }
}

fn spawn_stdin_reader(commands: mpsc::UnboundedSender<Command>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match line.parse::<Command>() {
                    Ok(command) => {
                        if commands.send(command).is_err() {
                            break;
                        }
                    }
                    Err(error) => {
                        tracing::warn!(stage = "input", action = "rejected", %error);
                    }
                },
                Ok(None) => {
                    tracing::info!(
                        stage = "input",
                        action = "closed",
                        "stdin closed; Ctrl-C quits"
                    );
                    break;
                }
                Err(error) => {
                    tracing::warn!(stage = "input", action = "read_failed", %error);
                    break;
                }
            }
        }
    });
}

fn spawn_ctrl_c_watcher(commands: mpsc::UnboundedSender<Command>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!(stage = "app", action = "interrupt");
            let _ = commands.send(Command::Quit);
        }
    });
}
