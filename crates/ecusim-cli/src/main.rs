//! ecusim CLI - serve simulated control units on a serial port, a CAN
//! adapter's serial bridge or the ENET network endpoints.
//!
//! The session runs on a worker thread; this front end owns the live
//! toggles and flips them from simple one-letter stdin commands.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ecusim_core::config::{AdapterFlags, ConceptType, ConfigData, Profile};
use ecusim_core::session::{Endpoint, Session};

#[derive(Parser)]
#[command(name = "ecusim")]
#[command(author, version, about = "Vehicle diagnostic bus simulator")]
struct Cli {
    /// Serial port name (e.g. /dev/ttyUSB0 or COM3)
    #[arg(short, long, env = "ECUSIM_PORT", conflicts_with = "enet")]
    port: Option<String>,

    /// Serve the ENET TCP/UDP endpoints instead of a serial port
    #[arg(long)]
    enet: bool,

    /// Protocol concept on the serial port
    #[arg(short = 'C', long, value_enum, default_value = "bmw-fast")]
    concept: ConceptArg,

    /// Built-in vehicle profile
    #[arg(long, value_enum, default_value = "none")]
    profile: ProfileArg,

    /// Response table JSON file
    #[arg(short, long, env = "ECUSIM_CONFIG")]
    config: Option<PathBuf>,

    /// ADS adapter attached (suppresses the request echo)
    #[arg(long)]
    ads: bool,

    /// K-line responder attached (reads back its own wire echo)
    #[arg(long)]
    kline_responder: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ConceptArg {
    BmwFast,
    Kwp2000Bmw,
    Kwp2000s,
    Ds2,
    Concept1,
    Concept3,
    Iso9141,
}

impl From<ConceptArg> for ConceptType {
    fn from(arg: ConceptArg) -> Self {
        match arg {
            ConceptArg::BmwFast => ConceptType::BmwFast,
            ConceptArg::Kwp2000Bmw => ConceptType::Kwp2000Bmw,
            ConceptArg::Kwp2000s => ConceptType::Kwp2000S,
            ConceptArg::Ds2 => ConceptType::Ds2,
            ConceptArg::Concept1 => ConceptType::Concept1,
            ConceptArg::Concept3 => ConceptType::Concept3,
            ConceptArg::Iso9141 => ConceptType::Iso9141,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ProfileArg {
    None,
    E61,
    E90,
}

impl From<ProfileArg> for Profile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::None => Profile::None,
            ProfileArg::E61 => Profile::E61,
            ProfileArg::E90 => Profile::E90,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let config = match &cli.config {
        Some(path) => ConfigData::from_file(path)
            .with_context(|| format!("loading response table {}", path.display()))?,
        None => ConfigData::default(),
    };

    let endpoint = if cli.enet {
        Endpoint::Enet
    } else if let Some(port) = &cli.port {
        Endpoint::Serial(port.clone())
    } else {
        bail!("either --port or --enet is required");
    };

    let flags = AdapterFlags {
        ads_adapter: cli.ads,
        kline_responder: cli.kline_responder,
    };
    let handle = Session::start(
        endpoint,
        cli.concept.into(),
        flags,
        cli.profile.into(),
        config,
    )
    .context("starting session")?;
    let toggles = handle.toggles();

    let running = Arc::new(AtomicBool::new(true));
    let ctrlc_running = Arc::clone(&running);
    ctrlc::set_handler(move || {
        ctrlc_running.store(false, Ordering::Relaxed);
    })
    .context("installing Ctrl-C handler")?;

    println!("commands: i=ignition  m=moving  v=variable values  e=restore errors  q=quit");

    // stdin is read on its own thread so Ctrl-C stays responsive
    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    while running.load(Ordering::Relaxed) {
        let line = match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(line) => line,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };
        match line.trim() {
            "i" => {
                let on = !toggles.ignition_on();
                toggles.set_ignition_on(on);
                println!("ignition {}", if on { "on" } else { "off" });
            }
            "m" => {
                let moving = !toggles.moving();
                toggles.set_moving(moving);
                println!("vehicle {}", if moving { "moving" } else { "stopped" });
            }
            "v" => {
                let variable = !toggles.variable_values();
                toggles.set_variable_values(variable);
                println!(
                    "measurement values {}",
                    if variable { "drifting" } else { "fixed" }
                );
            }
            "e" => {
                toggles.restore_errors();
                println!("error memories restored");
            }
            "q" => break,
            "" => {}
            other => println!("unknown command {:?}", other),
        }
    }

    info!("shutting down");
    handle.stop();
    Ok(())
}
