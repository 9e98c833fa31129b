//! pakhost - package host manifest client

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pakhost_cli::cmd;
use pakhost_cli::{Cli, Commands, Globals};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let globals = Globals::resolve(cli.root, cli.platform);

    match cli.command {
        Commands::Fetch { url, force } => cmd::fetch::fetch(&globals, &url, force),
        Commands::List {
            url,
            name,
            for_platform,
            agnostic,
            all,
            json,
        } => cmd::list::list(
            &globals,
            &url,
            name.as_deref(),
            for_platform,
            agnostic,
            all,
            json,
        ),
        Commands::Info {
            url,
            name,
            version,
            for_platform,
            json,
        } => cmd::info::info(&globals, &url, &name, version.as_deref(), for_platform, json),
        Commands::Remove {
            url,
            name,
            version,
            for_platform,
        } => cmd::remove::remove(&globals, &url, &name, version.as_deref(), for_platform),
        Commands::Hostdir { url } => cmd::hostdir::hostdir(&globals, &url),
    }
}
