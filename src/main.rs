// src/main.rs
//! Run Tracker - live run tracking from gpsd, a serial receiver or a simulated path

use anyhow::Context;
use clap::{Parser, Subcommand};
use run_tracker::{
    background::{BackgroundBridge, FileStore, ForegroundOnly},
    display::TerminalDisplay,
    gps::{nmea, GpsdProvider, PositionProvider, SerialNmeaProvider},
    RunController, TrackerConfig, TrackerError, TrackerSettings, TrackerStatus,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "run-tracker", version, about = "Track a run from live GPS fixes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a run and show the live dashboard
    Run(RunArgs),
    /// Print the effective configuration
    Config,
    /// List available serial ports
    Ports,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Position source: gpsd, serial or simulated
    #[arg(long)]
    source: Option<String>,

    /// Body weight used for the calorie estimate (kg)
    #[arg(long)]
    weight: Option<f64>,

    /// Disable automatic pause/resume
    #[arg(long)]
    no_auto_pause: bool,

    #[arg(long)]
    gpsd_host: Option<String>,

    #[arg(long)]
    gpsd_port: Option<u16>,

    #[arg(long)]
    serial_port: Option<String>,

    #[arg(long)]
    baudrate: Option<u32>,

    /// Persist the resulting configuration
    #[arg(long)]
    save_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = TrackerConfig::load().unwrap_or_else(|e| {
        log::warn!("{}; using defaults", e);
        TrackerConfig::default()
    });

    match cli.command {
        Command::Run(args) => run(config, args).await,
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Command::Ports => {
            let ports = nmea::list_serial_ports().context("Failed to list serial ports")?;
            if ports.is_empty() {
                println!("No serial ports found.");
            } else {
                println!("Available serial ports:");
                for port in ports {
                    println!("  {}", port);
                }
            }
            Ok(())
        }
    }
}

fn apply_args(mut config: TrackerConfig, args: &RunArgs) -> TrackerConfig {
    if let Some(source) = &args.source {
        config.update_source(source);
    }
    if let Some(weight) = args.weight {
        config.update_weight(weight);
    }
    if args.no_auto_pause {
        config.enable_auto_pause = false;
    }
    if args.gpsd_host.is_some() || args.gpsd_port.is_some() {
        let host = args.gpsd_host.clone().or(config.gpsd_host.clone()).unwrap_or_default();
        let port = args.gpsd_port.or(config.gpsd_port).unwrap_or(2947);
        config.update_gpsd(host, port);
    }
    if let Some(port) = &args.serial_port {
        let baudrate = args.baudrate.or(config.serial_baudrate).unwrap_or(nmea::DEFAULT_BAUDRATE);
        config.update_serial(port.clone(), baudrate);
    }
    config
}

fn build_provider(config: &TrackerConfig) -> run_tracker::Result<Option<Arc<dyn PositionProvider>>> {
    match config.source_type.as_str() {
        "gpsd" => {
            let provider = match (&config.gpsd_host, config.gpsd_port) {
                (Some(host), Some(port)) => GpsdProvider::new(host.clone(), port),
                _ => GpsdProvider::default(),
            };
            Ok(Some(Arc::new(provider)))
        }
        "serial" => {
            let port = config
                .serial_port
                .clone()
                .ok_or_else(|| TrackerError::Other("serial source needs --serial-port".to_string()))?;
            let baudrate = config.serial_baudrate.unwrap_or(nmea::DEFAULT_BAUDRATE);
            Ok(Some(Arc::new(SerialNmeaProvider::new(port, baudrate))))
        }
        "simulated" => Ok(None),
        other => Err(TrackerError::Other(format!("Unknown source type: {}", other))),
    }
}

async fn run(config: TrackerConfig, args: RunArgs) -> anyhow::Result<()> {
    let config = apply_args(config, &args);
    if args.save_config {
        config.save().context("Failed to save configuration")?;
    }

    let provider = build_provider(&config)?;
    let buffer_dir = match &config.buffer_dir {
        Some(dir) => dir.into(),
        None => FileStore::default_dir().context("Failed to locate the point buffer directory")?,
    };
    let bridge = BackgroundBridge::new(Arc::new(FileStore::new(buffer_dir)));

    let mut controller = RunController::new(
        TrackerSettings::from(&config),
        provider,
        Arc::new(ForegroundOnly),
        bridge,
    );

    controller.start().await;

    let source = if controller.is_simulated() {
        "simulated".to_string()
    } else {
        config.source_type.clone()
    };
    let display = TerminalDisplay::new(source);
    let updates = controller.subscribe();
    let display_task = tokio::spawn(async move { display.run(updates).await });

    let mut commands = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            // Disabled while paused with nothing to poll; commands still arrive
            Some(event) = controller.next_event() => controller.handle_event(event).await,
            line = commands.next_line() => match line.context("Failed to read command")? {
                Some(line) => handle_command(&mut controller, line.trim()).await,
                None => controller.finish().await,
            },
            _ = &mut ctrl_c => controller.finish().await,
        }

        if controller.state().status == TrackerStatus::Finished {
            break;
        }
    }

    match display_task.await {
        Ok(result) => result.context("Dashboard failed")?,
        Err(e) => log::warn!("Display task failed: {}", e),
    }

    println!("\n{}", serde_json::to_string_pretty(&controller.summary())?);
    Ok(())
}

async fn handle_command(controller: &mut RunController, command: &str) {
    match command {
        "p" | "pause" => controller.pause(),
        "r" | "resume" => controller.resume().await,
        "f" | "q" | "finish" | "quit" => controller.finish().await,
        "" => {}
        other => log::warn!("Unknown command: {}", other),
    }
}
