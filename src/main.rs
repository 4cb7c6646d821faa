mod cli_main;

use std::fs::File;
use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use cli_main::{Cli, Commands, MergeArgs};
use pairmerge::errors::{Error, Result};
use pairmerge::pipeline::mergepairs::merge_pairs;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Setting tracing default failed");
    }

    match cli.command {
        Commands::Mergepairs(args) => {
            let mut log = match args.log.as_deref().map(File::create).transpose() {
                Ok(log) => log,
                Err(e) => {
                    eprintln!("Fatal error: Unable to open log file for writing: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            match run_mergepairs(&args, log.as_mut()) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("\nFatal error: {}", e);
                    if let Some(log) = log.as_mut() {
                        let _ = writeln!(log, "\nFatal error: {}", e);
                    }
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn run_mergepairs(args: &MergeArgs, log: Option<&mut File>) -> Result<()> {
    let job = args.to_job()?;
    let stats = merge_pairs(&job)?;

    let report = match log {
        Some(file) => stats.write_report(file),
        None => stats.write_report(&mut io::stderr().lock()),
    };
    report.map_err(|source| Error::WriteIo {
        file: args.log.clone().unwrap_or_else(|| "stderr".to_string()),
        source,
    })?;

    if let Some(path) = &args.summary_json {
        stats.write_json(path)?;
        info!("Summary written to {}", path);
    }
    Ok(())
}
