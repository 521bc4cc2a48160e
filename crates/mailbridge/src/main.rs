// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mailbridge - Gmail to HubSpot inbox sync service.
//!
//! This is the binary entry point for the Mailbridge server.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};

mod serve;

/// Mailbridge - Gmail to HubSpot inbox sync service.
#[derive(Parser, Debug)]
#[command(name = "mailbridge", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Mailbridge sync server.
    Serve,
    /// Print the resolved configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match mailbridge_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            mailbridge_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => match toml::to_string_pretty(&config) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                eprintln!("error: failed to render config: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("mailbridge: use --help for available commands");
        }
    }
}
