//! CLI for the UMD chapter download manager.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use umd_core::config;

use commands::{run_completions, run_config, run_download, DownloadArgs};

/// Top-level CLI for the UMD download manager.
#[derive(Debug, Parser)]
#[command(name = "umd")]
#[command(about = "UMD: concurrent manga chapter downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one or more chapters.
    Download {
        /// Chapter page URLs.
        #[arg(required = true, num_args = 1..)]
        urls: Vec<String>,

        /// Directory chapter folders are created in (overrides config).
        #[arg(long, short, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Chapters downloaded in parallel (1-10).
        #[arg(long, value_name = "N")]
        chapter_workers: Option<usize>,

        /// Image downloads per chapter (1-32).
        #[arg(long, value_name = "N")]
        image_workers: Option<usize>,

        /// Skip the CBZ archive.
        #[arg(long)]
        no_cbz: bool,

        /// Skip the SHA-256 manifest.
        #[arg(long)]
        no_checksums: bool,
    },

    /// Print the config file path and effective settings.
    Config,

    /// Generate shell completions on stdout.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Download {
                urls,
                output,
                chapter_workers,
                image_workers,
                no_cbz,
                no_checksums,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_download(
                    cfg,
                    DownloadArgs {
                        urls,
                        output,
                        chapter_workers,
                        image_workers,
                        no_cbz,
                        no_checksums,
                    },
                )?;
            }
            CliCommand::Config => run_config()?,
            CliCommand::Completions { shell } => run_completions(shell),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
