//! Command-line interface for subsync-cli.
//!
//! A single-purpose tool: given a speech-accurate reference SRT and a
//! candidate SRT, analyze how well they line up and, if warranted,
//! re-time the candidate. Unlike a multi-command suite, there is exactly
//! one thing to do here, so there is exactly one [`Cli`] struct rather
//! than a `Commands` enum.
//!
//! # Examples
//!
//! ```bash
//! subsync-cli reference.srt candidate.srt --out candidate.synced.srt
//! ```

use std::path::PathBuf;

use clap::Parser;

/// Re-time a candidate subtitle against a speech-accurate reference.
#[derive(Parser, Debug)]
#[command(name = "subsync-cli")]
#[command(about = "Re-time a candidate subtitle against a speech-accurate reference")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Path to the speech-accurate reference SRT.
    pub reference: PathBuf,

    /// Path to the candidate SRT to analyze and, if warranted, re-time.
    pub candidate: PathBuf,

    /// Write the resulting candidate SRT here. If omitted, only the
    /// decision line is printed and no file is written.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Video duration in seconds, used only to size the comparator's tail
    /// checks. `0` disables them.
    #[arg(long, default_value_t = 0)]
    pub duration: u64,

    /// Print the anomaly log and matched-point diagnostics in addition to
    /// the decision line.
    #[arg(long)]
    pub verbose: bool,
}

/// Execute the CLI's one job against an already-parsed [`Cli`] and a
/// configuration service. Parsing lives in `main` so a usage error can be
/// reported with the exit code spec.md §6 reserves for it, independent of
/// how command execution errors are mapped.
pub fn run(cli: Cli, config_service: &dyn crate::config::ConfigService) -> crate::Result<()> {
    crate::commands::sync_command::execute(&cli, config_service)
}
