//! Kalterwind Mapper - command-line front end
//!
//! Lists ports and presets, or runs a preset between two MIDI devices until
//! Ctrl+C.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::*;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kalterwind_mapper::config::{find_preset, load_presets};
use kalterwind_mapper::{MidiBackend, MidirBackend, Router, VirtualPorts};

/// Route MIDI notes and controllers to Control Change messages
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory containing YAML presets
    #[arg(long, default_value = "./presets")]
    presets: String,

    /// Preset to run (file name inside the preset directory, or a path)
    #[arg(short, long)]
    preset: Option<String>,

    /// Input port name, overrides the preset's inputDevice
    #[arg(short, long)]
    input: Option<String>,

    /// Output port name, overrides the preset's outputDevice
    #[arg(short, long)]
    output: Option<String>,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// List presets and their details
    #[arg(long)]
    list_presets: bool,

    /// Publish "KalterwindMapper In/Out" virtual ports
    #[arg(long)]
    virtual_ports: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    let backend = Arc::new(MidirBackend::default());

    // Keep the virtual ports alive for the whole run
    let _virtual_ports = if args.virtual_ports {
        match VirtualPorts::create() {
            Ok(ports) => Some(ports),
            Err(e) => {
                warn!("Failed to create virtual ports: {}", e);
                None
            }
        }
    } else {
        None
    };

    if args.list_ports {
        list_ports(backend.as_ref())?;
        return Ok(());
    }

    let presets = load_presets(&args.presets).await;

    if args.list_presets {
        list_presets(&args.presets, &presets);
        return Ok(());
    }

    let Some(selector) = args.preset.as_deref() else {
        bail!("No preset selected (use --preset, or --list-presets to see what is available)");
    };
    let preset = find_preset(&presets, selector).await?;
    info!("Preset '{}': {}", preset.name, preset.document.description);

    let input_name = args
        .input
        .or_else(|| preset.document.input_device.clone())
        .context("No input device (set inputDevice in the preset or pass --input)")?;
    let output_name = args
        .output
        .or_else(|| preset.document.output_device.clone())
        .context("No output device (set outputDevice in the preset or pass --output)")?;

    let devices = backend.list_devices()?;
    let (input_index, output_index) = devices.resolve_indices(&input_name, &output_name);
    let input_index = input_index.with_context(|| format!("Input port '{}' not found", input_name))?;
    let output_index =
        output_index.with_context(|| format!("Output port '{}' not found", output_name))?;

    let router = Router::new(backend);
    router
        .start(input_index, output_index, preset.mapping.clone())
        .await
        .context("Failed to start routing")?;

    shutdown_signal().await;

    router.stop().await;
    info!("Kalterwind Mapper shutdown complete");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        return;
    }
    info!("Shutdown signal received");
}

fn list_ports(backend: &dyn MidiBackend) -> Result<()> {
    let devices = backend.list_devices()?;

    println!("{}", "MIDI Input Ports:".bold());
    if devices.inputs.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for (i, name) in devices.inputs.iter().enumerate() {
        println!("  [{}] {}", i, name.green());
    }

    println!("{}", "MIDI Output Ports:".bold());
    if devices.outputs.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for (i, name) in devices.outputs.iter().enumerate() {
        println!("  [{}] {}", i, name.red());
    }

    Ok(())
}

fn list_presets(dir: &str, presets: &[kalterwind_mapper::Preset]) {
    if presets.is_empty() {
        println!("{} {}", "No presets found in".yellow(), dir);
        return;
    }

    for preset in presets {
        println!("\n{}", preset.name.bold().cyan());
        for line in preset.info().lines() {
            println!("  {}", line);
        }
        println!("  Mapped triggers: {}", preset.mapping.len().to_string().green());
        for issue in &preset.issues {
            println!("  {} {}", "ignored:".yellow(), issue);
        }
    }
}
