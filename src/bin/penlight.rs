use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};

use penlight::hardware::{self, CameraProvider, SimulatedCamera};
use penlight::{Color, Intent, LightMode, Logger, Panel, TorchConfig, TorchController, PALETTE};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    /// In-process camera, prints what the torch would do.
    Simulated,
    /// The camera backend of this platform.
    Platform,
}

/// Drive the penlight torch from stdin.
#[derive(Debug, Parser)]
#[command(name = "penlight", version)]
struct Args {
    #[arg(long, value_enum, default_value = "simulated")]
    backend: Backend,

    /// LED class directory for the Linux backend.
    #[cfg(target_os = "linux")]
    #[arg(long)]
    leds_root: Option<PathBuf>,

    /// JSON file with controller settings.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    log_level: log::Level,
}

const HELP: &str = "commands: connect | disconnect | color <#RRGGBB|name|off> | mode <solid|pulse> | status | palette | quit";

fn provider(args: &Args) -> Result<Arc<dyn CameraProvider>, String> {
    match args.backend {
        Backend::Simulated => Ok(Arc::new(SimulatedCamera::new())),
        Backend::Platform => platform(args).ok_or_else(|| "no camera backend for this platform".to_string()),
    }
}

#[cfg(target_os = "linux")]
fn platform(args: &Args) -> Option<Arc<dyn CameraProvider>> {
    match &args.leds_root {
        Some(root) => Some(Arc::new(hardware::SysfsTorch::new(root))),
        None => hardware::platform_camera(),
    }
}

#[cfg(not(target_os = "linux"))]
fn platform(_args: &Args) -> Option<Arc<dyn CameraProvider>> {
    hardware::platform_camera()
}

fn parse(line: &str) -> Result<Intent, String> {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    match command {
        "connect" => Ok(Intent::Connect),
        "disconnect" => Ok(Intent::Disconnect),
        "color" | "colour" => rest.parse::<Color>().map(Intent::SelectColor).map_err(|e| e.to_string()),
        "mode" => rest.parse::<LightMode>().map(Intent::SelectMode).map_err(|e| e.to_string()),
        _ => Err(format!("unknown command {command:?}\n{HELP}")),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    Logger::start(Some(args.log_level));

    let config = match &args.config {
        Some(path) => TorchConfig::load(path)?,
        None => TorchConfig::default(),
    };
    let panel = Panel::new(TorchController::with_config(provider(&args)?, config));

    let mut status = panel.controller().subscribe();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let status = status.borrow_and_update().clone();
            match status.message {
                Some(message) => println!("[{}] {message}", status.state),
                None => println!("[{}]", status.state),
            }
        }
    });

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" => break,
            "status" => println!("{}", serde_json::to_string_pretty(&panel.view())?),
            "palette" => PALETTE.iter().for_each(|swatch| println!("{:<12} {}", swatch.name, swatch.color)),
            "help" => println!("{HELP}"),
            _ => match parse(line) {
                Ok(intent) => panel.handle(intent).await,
                Err(e) => eprintln!("{e}"),
            },
        }
    }
    Ok(())
}
