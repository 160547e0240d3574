//! # Ground Monitor
//!
//! Ground-station telemetry monitor for a rocket flight computer.
//!
//! Reads telemetry frames from the serial radio link, keeps rolling plot
//! channels for every field, and sends payload release commands typed on
//! stdin.

use anyhow::Result;
use std::io::BufRead;
use std::path::Path;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ground_monitor::acquisition::{AcquisitionTask, CommandDispatcher, IntentMask};
use ground_monitor::config::{Config, LoggingConfig};
use ground_monitor::monitor::GroundStation;
use ground_monitor::serial::port_trait::LinkTransport;
use ground_monitor::serial::SerialLink;
use ground_monitor::telemetry::log::open_session_log;
use ground_monitor::telemetry::protocol::MissionClock;
use ground_monitor::telemetry::store::ChannelStore;

/// Configuration file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// File name prefix of the daily application log
const APP_LOG_FILE: &str = "ground-monitor.log";

/// Depth of the operator command queue
const COMMAND_QUEUE_DEPTH: usize = 16;

/// Operator input from stdin
#[derive(Debug, Clone, Copy, PartialEq)]
enum OperatorCommand {
    Release,
    Cancel,
    Logging(bool),
    WindowSpan(f64),
    Quit,
}

/// Parse one line of operator input
fn parse_command(line: &str) -> Option<OperatorCommand> {
    let mut words = line.split_whitespace();
    let command = match (words.next()?, words.next()) {
        ("r" | "release", None) => OperatorCommand::Release,
        ("u" | "cancel", None) => OperatorCommand::Cancel,
        ("log", Some("on")) => OperatorCommand::Logging(true),
        ("log", Some("off")) => OperatorCommand::Logging(false),
        ("span", Some(seconds)) => OperatorCommand::WindowSpan(seconds.parse().ok()?),
        ("q" | "quit", None) => OperatorCommand::Quit,
        _ => return None,
    };
    match words.next() {
        Some(_) => None,
        None => Some(command),
    }
}

/// Main entry point for the ground monitor
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or `config/default.toml`)
///    - Set up logging with tracing subscriber
///    - Open the serial link; if absent, keep retrying in the background
///    - Open the session log
///
/// 2. **Main Loop** (one iteration per display frame)
///    - Poll the acquisition task without blocking; on completion ingest the
///      result and relaunch it
///    - Apply operator commands from stdin
///    - Log a status line every `status_interval_frames` frames
///
/// 3. **Graceful Shutdown**
///    - Wait for the in-flight cycle (bounded by the read timeout)
///    - Flush the session log
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config_found = Path::new(&config_path).exists();
    let config = if config_found {
        Config::load(&config_path)?
    } else {
        Config::default()
    };

    let _log_guard = init_logging(&config.logging);

    info!("Ground Monitor v{} starting...", env!("CARGO_PKG_VERSION"));
    if config_found {
        info!("Configuration loaded from {}", config_path);
    } else {
        warn!("No configuration at {}, using defaults", config_path);
    }

    // Serial link
    let link: Box<dyn LinkTransport> = match SerialLink::open(&config.link) {
        Ok(link) => {
            info!("Telemetry link opened at: {}", link.device_path());
            Box::new(link)
        }
        Err(e) => {
            warn!("{}; will keep retrying", e);
            Box::new(SerialLink::detached(&config.link))
        }
    };

    // Channels and session log
    let store = ChannelStore::with_capacity(config.display.window_span_s, config.display.channel_capacity)?;
    let mut station = GroundStation::new(store);
    match open_session_log(&config.session_log) {
        Ok((sink, _path)) => {
            station = station.with_session_log(sink, config.session_log.enabled);
        }
        Err(e) => warn!("Session log unavailable: {}", e),
    }

    let intents = IntentMask::new();
    let mut task = AcquisitionTask::new(
        link,
        CommandDispatcher::new(config.link.read_timeout(), config.link.frame_format),
        intents.clone(),
        MissionClock::start(),
    );

    let mut commands = spawn_operator_input();

    let mut frame_interval = interval(config.display.frame_period());
    frame_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "Display loop at {}Hz, window span {} s",
        config.display.frame_rate_hz, config.display.window_span_s
    );
    info!("Commands: r=release, u=cancel, log on|off, span <s>, q=quit");

    let mut frame_count: u64 = 0;

    // Main display loop
    loop {
        tokio::select! {
            _ = frame_interval.tick() => {
                if let Err(e) = station.tick(&mut task) {
                    error!("Acquisition stopped: {}", e);
                    break;
                }

                frame_count += 1;
                if frame_count % config.display.status_interval_frames == 0 {
                    info!("{}", station.status_line());
                }
            }

            Some(command) = commands.recv() => {
                match command {
                    OperatorCommand::Release => {
                        info!("Payload release requested");
                        intents.request_release();
                    }
                    OperatorCommand::Cancel => {
                        info!("Payload release cancel requested");
                        intents.request_cancel();
                    }
                    OperatorCommand::Logging(enabled) => station.set_logging(enabled),
                    OperatorCommand::WindowSpan(seconds) => {
                        if let Err(e) = station.set_window_span(seconds) {
                            warn!("{}", e);
                        }
                    }
                    OperatorCommand::Quit => {
                        info!("Quit requested, shutting down...");
                        break;
                    }
                }
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    task.shutdown().await;
    station.close();

    let stats = station.stats();
    info!(
        "Frames accepted: {}, rejected: {}, empty reads: {}",
        stats.accepted, stats.rejected, stats.empty_reads
    );

    Ok(())
}

/// Install the console subscriber, plus a daily file log if configured
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let (file_layer, guard) = if config.directory.is_empty() {
        (None, None)
    } else {
        let appender = tracing_appender::rolling::daily(&config.directory, APP_LOG_FILE);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Read operator commands from stdin on a plain thread
///
/// A blocked stdin read must not hold up runtime shutdown, so this stays off
/// the tokio blocking pool.
fn spawn_operator_input() -> mpsc::Receiver<OperatorCommand> {
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match parse_command(&line) {
                Some(command) => {
                    if tx.blocking_send(command).is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => eprintln!("Unknown command: {}", line.trim()),
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload_commands() {
        assert_eq!(parse_command("r"), Some(OperatorCommand::Release));
        assert_eq!(parse_command("release"), Some(OperatorCommand::Release));
        assert_eq!(parse_command("  u \n"), Some(OperatorCommand::Cancel));
        assert_eq!(parse_command("cancel"), Some(OperatorCommand::Cancel));
    }

    #[test]
    fn test_parse_logging_and_span() {
        assert_eq!(parse_command("log on"), Some(OperatorCommand::Logging(true)));
        assert_eq!(parse_command("log off"), Some(OperatorCommand::Logging(false)));
        assert_eq!(parse_command("span 30"), Some(OperatorCommand::WindowSpan(30.0)));
        assert_eq!(parse_command("span 2.5"), Some(OperatorCommand::WindowSpan(2.5)));
        assert_eq!(parse_command("q"), Some(OperatorCommand::Quit));
    }

    #[test]
    fn test_parse_rejects_unknown_input() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("launch"), None);
        assert_eq!(parse_command("log maybe"), None);
        assert_eq!(parse_command("span wide"), None);
        assert_eq!(parse_command("r now"), None);
        assert_eq!(parse_command("span 10 20"), None);
    }

    #[test]
    fn test_default_config_path() {
        assert_eq!(DEFAULT_CONFIG_PATH, "config/default.toml");
        assert!(APP_LOG_FILE.ends_with(".log"));
    }

    #[test]
    fn test_default_frame_period() {
        let config = Config::default();
        let period = config.display.frame_period();
        assert_eq!(period.as_micros(), 16_666, "60Hz display loop");
    }
}
