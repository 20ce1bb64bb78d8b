mod config;
mod logging;
mod push;
mod serve;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use gymtrack_core::{LogNotifier, TimerEvent, TimerHost};

use crate::config::ServerConfig;

/// Workout session tracking with a shared rest timer.
#[derive(Parser)]
#[command(name = "gymtrack", version, about = "Workout session and rest timer server")]
struct Cli {
    /// Enable debug logging (RUST_LOG is honoured when set)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gymtrack HTTP API server
    Serve {
        /// Port to listen on (default: config `port`, then 8080)
        #[arg(long)]
        port: Option<u16>,
        /// Path to a TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run a rest countdown in the terminal
    Timer {
        /// Rest length in seconds
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        seconds: u64,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.debug);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {}", e);
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Serve { port, config } => {
            let config = match ServerConfig::load(config.as_deref()) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("error: {}", e);
                    process::exit(1);
                }
            };
            let port = config.port(port);
            if let Err(e) = rt.block_on(serve::start_server(port, config)) {
                eprintln!("Server error: {}", e);
                process::exit(1);
            }
        }
        Commands::Timer { seconds } => {
            if let Err(e) = rt.block_on(cmd_timer(seconds)) {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        }
    }
}

/// Count down in the terminal using the same timer host the server runs.
async fn cmd_timer(seconds: u64) -> Result<(), gymtrack_core::TimerError> {
    let host = TimerHost::spawn(Default::default(), Arc::new(LogNotifier));
    let mut events = host.subscribe("terminal")?;
    host.start(seconds, None)?;

    while let Some(event) = events.next_event().await {
        match event {
            TimerEvent::Tick {
                remaining_seconds, ..
            } => println!("{}", format_remaining(remaining_seconds)),
            TimerEvent::Finished { .. } => {
                println!("Rest finished!");
                break;
            }
        }
    }
    Ok(())
}

/// `m:ss`, as shown on the rest screen.
fn format_remaining(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
