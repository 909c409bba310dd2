//! webplug: pluggable web host
//!
//! Boots the host from `webplug.toml` (or `--plugins-dir`) and exercises the
//! composed routes without a network listener:
//!
//! ```bash
//! webplug --plugins-dir ./plugins list
//! webplug --plugins-dir ./plugins get /plugins/a/ -i
//! webplug --plugins-dir ./plugins get /plugins/ -H "Accept: application/json"
//! webplug --plugins-dir ./plugins check
//! ```

mod cli;
mod commands;
mod tracing_support;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use std::process::ExitCode;
use tracing_support::{init_subscriber_with_config, TracingConfig};
use webplug_host::Host;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_subscriber_with_config(TracingConfig {
        format: cli.log_format,
        ..Default::default()
    });

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Fatal error");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.host_config()?;
    let host = Host::boot(&config)?;

    match cli.command {
        Command::List { json } => {
            print!("{}", commands::list(&host, json)?);
            if json {
                println!();
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Get {
            target,
            head,
            headers,
            include,
        } => {
            let response = commands::get(&host, &target, head, &headers).await?;
            commands::print_response(&response, include)?;
            Ok(if response.status < 400 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Check => {
            let problems = commands::check(&host);
            for problem in &problems {
                eprintln!("{}", problem);
            }
            if problems.is_empty() {
                println!("OK: {} plugin(s) mounted", host.composition().mounted.len());
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
