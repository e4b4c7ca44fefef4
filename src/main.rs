mod cli;
mod core;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use crate::core::config::Config;

#[derive(Parser)]
#[command(
    name = "llm-usage",
    about = "Terminal dashboard for AI coding assistant usage and rate limits",
    version
)]
struct Cli {
    /// Print one compact status line for status bars and exit
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load().unwrap_or_default();

    if cli.compact {
        if let Err(err) = cli::compact::run(&config).await {
            eprintln!("{} {err:#}", "error:".red());
            std::process::exit(1);
        }
        return Ok(());
    }

    let creds = match crate::core::auth::load_token().await {
        Ok(creds) => creds,
        Err(err) => {
            eprintln!(" {} {err:#}", "✗".red());
            eprintln!("   Run \"claude\" and sign in first.");
            std::process::exit(1);
        }
    };

    cli::dashboard::run(config, creds).await
}
