use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod hook;

use cli::{Cli, USAGE};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let (Some(vm), Some(action)) = (cli.vm.as_deref(), cli.action.as_deref()) else {
        println!("{USAGE}");
        return Ok(());
    };

    hook::run_hook(&cli, vm, action)
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        tracing::Level::WARN
    } else {
        match cli.verbose {
            0 => tracing::Level::INFO,
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}
