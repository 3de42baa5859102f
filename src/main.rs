//! sigcan CLI entry point.
//!
//! Provides configuration validation, example generation and an interactive
//! sender that reads `<signal> <value>` updates from stdin and transmits the
//! resulting frames on a SocketCAN interface.

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sigcan::core::config::BusMapping;
use sigcan::{CanSender, SenderConfig};

/// Vehicle-signal CAN sender
#[derive(Parser, Debug)]
#[command(name = "sigcan", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a configuration and print the signal table
    Validate {
        /// Top-level configuration file
        config: String,
    },

    /// Generate example configuration files
    Example,

    /// Send signal updates read from stdin (`<signal> <value>` per line)
    Send {
        /// Top-level configuration file
        config: String,

        /// CAN interface name (overrides the bus mapping file)
        #[arg(short, long)]
        interface: Option<String>,

        /// Bus mapping file with `hs="can0"` lines
        #[arg(short, long)]
        mapping: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::Example => {
            print_example();
            Ok(())
        }
        Commands::Send {
            config,
            interface,
            mapping,
        } => send(&config, interface, mapping).await,
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn validate(path: &str) -> sigcan::Result<()> {
    let config = SenderConfig::from_file(path)?;

    println!("{} signals:", config.signals.len());
    println!();
    for signal in &config.signals {
        println!(
            "  {:<24} {:>8}  CAN-ID {}  bits {}..{}  DLC {}",
            signal.name,
            signal.value_type.as_name(),
            signal.can_id,
            signal.bit_pos,
            signal.bit_pos + signal.bit_size,
            signal.dlc
        );
    }
    Ok(())
}

fn print_example() {
    println!(
        r#"# Top-level configuration (config.json):
{{"wheel_map": "wheel_map.json", "gear_para": "gear_para.json"}}

# Signal map (wheel_map.json):
{{
    "PROPERTYS": [
        {{"PROPERTY": "VehicleSpeed", "TYPE": "uint16_t", "CANID": "048",
         "BIT_POSITION": "8", "BIT_SIZE": "16", "DLC": "4"}},
        {{"PROPERTY": "TurnSignalStatus", "TYPE": "uint8_t", "CANID": "048",
         "BIT_POSITION": "0", "BIT_SIZE": "8", "DLC": "4"}}
    ]
}}

# Gear table (gear_para.json):
{{
    "GEAR_PARA": [
        {{"POS": "First", "VAL": 4.12}},
        {{"POS": "Second", "VAL": 2.84}},
        {{"POS": "Reverse", "VAL": 3.21}}
    ]
}}

# Bus mapping (dev-mapping.conf):
hs="can0"
ls="can1"
"#
    );
}

/// Resolve the transmit interface: explicit flag first, then the high-speed
/// bus from the mapping file, then "can0".
fn resolve_interface(interface: Option<String>, mapping: Option<String>) -> sigcan::Result<String> {
    if let Some(interface) = interface {
        return Ok(interface);
    }
    if let Some(path) = mapping {
        let mapping = BusMapping::from_file(&path)?;
        if let Some(hs) = mapping.hs {
            return Ok(hs);
        }
        warn!(path = %path, "bus mapping has no hs entry, falling back to can0");
    }
    Ok("can0".to_string())
}

async fn send(
    config_path: &str,
    interface: Option<String>,
    mapping: Option<String>,
) -> sigcan::Result<()> {
    let config = SenderConfig::from_file(config_path)?;
    let interface = resolve_interface(interface, mapping)?;

    let mut sender = CanSender::from_config(config);
    #[cfg(target_os = "linux")]
    sender.start(&interface);
    #[cfg(not(target_os = "linux"))]
    warn!(interface = %interface, "SocketCAN is Linux-only, updates are queued but not sent");

    info!(interface = %interface, "reading signal updates from stdin, Ctrl-D to stop");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(name), Some(value)) = (parts.next(), parts.next()) else {
            warn!(line = %line, "expected `<signal> <value>`");
            continue;
        };
        match value.parse::<i32>() {
            Ok(value) => {
                sender.update_value(name, value);
            }
            Err(_) => warn!(value = %value, "value is not an integer"),
        }
    }

    sender.shutdown().await;
    Ok(())
}
