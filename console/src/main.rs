//! FLOWNET console
//!
//! Runs a command script given with `-f`, then (unless the script exited or
//! `--batch` is set) reads commands from standard input.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

mod shell;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::debug;

use flownet_core::RandomSource;

use crate::shell::{Flow, Shell};

#[derive(Parser)]
#[command(name = "flownet")]
#[command(author, version, about = "Maximum-flow solvers on capacitated networks", long_about = None)]
struct Cli {
    /// Command script to run first
    #[arg(short = 'f', long = "file")]
    script: Option<PathBuf>,

    /// Skip the interactive prompt after the script
    #[arg(short, long)]
    batch: bool,

    /// Seed of the generator used by network commands
    #[arg(short, long)]
    seed: Option<u64>,

    /// Log filter when RUST_LOG is unset
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level.as_str()))
        .format_timestamp_millis()
        .init();

    let random = match cli.seed {
        Some(seed) => RandomSource::new(seed),
        None => RandomSource::from_entropy(),
    };
    debug!("Console seed {}", random.seed());

    let stdout = io::stdout();
    let mut shell = Shell::new(stdout.lock(), random);

    if let Some(script) = &cli.script {
        if shell.run_script(script)? == Flow::Exit {
            return Ok(());
        }
    }
    if !cli.batch {
        let stdin = io::stdin();
        shell.run_interactive(stdin.lock())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
        let cli = Cli::parse_from(["flownet", "-f", "run.fns", "--batch", "--seed", "7"]);
        assert_eq!(cli.script, Some(PathBuf::from("run.fns")));
        assert!(cli.batch);
        assert_eq!(cli.seed, Some(7));
        assert_eq!(cli.log_level, "info");
    }
}
