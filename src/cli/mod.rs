// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command-line interface code. More specific options for `rawacf-uptime`
//! subcommands are contained in modules.
//!
//! All booleans must have `#[serde(default)]` annotated, and anything that
//! isn't a boolean must be optional. This allows all arguments to be optional
//! *and* usable in an arguments file.
//!
//! Only 3 things should be public in this module: `Uptime`, `Uptime::run`,
//! and `UptimeError`.

#[macro_use]
mod common;
mod batch;
mod error;
mod ingest;
mod quarantine;
mod stats;

pub use error::UptimeError;

use std::{path::PathBuf, sync::Arc};

use clap::{AppSettings, Args, Parser, Subcommand};
use crossbeam_utils::atomic::AtomicCell;
use log::{info, warn};

use common::RunOpts;

// Add build-time information from the "built" crate.
include!(concat!(env!("OUT_DIR"), "/built.rs"));

#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    about = "Ingest SuperDARN rawacf session metadata and report radar uptime."
)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_subcommands = true)]
#[clap(propagate_version = true)]
#[clap(infer_long_args = true)]
pub struct Uptime {
    #[clap(flatten)]
    global_opts: GlobalArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Don't draw progress bars.
    #[clap(long)]
    #[clap(global = true)]
    no_progress_bars: bool,

    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences))]
    #[clap(global = true)]
    verbosity: u8,

    /// Only verify that arguments were correctly ingested and print out
    /// high-level information.
    #[clap(long)]
    #[clap(global = true)]
    dry_run: bool,

    /// Save the input arguments into a new TOML file that can be used to
    /// reproduce this run.
    #[clap(long)]
    #[clap(global = true)]
    save_toml: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
#[clap(arg_required_else_help = true)]
enum Command {
    #[clap(about = "Decode rawacf files and store their sessions.")]
    Ingest(ingest::IngestArgs),

    #[clap(alias = "uptime")]
    #[clap(about = "Report radar uptime from the stored sessions.")]
    Stats(stats::StatsArgs),

    #[clap(
        about = "Ingest a range of days from an endpoint, optionally with daily statistics."
    )]
    Batch(batch::BatchArgs),

    #[clap(about = "Print the files that couldn't be ingested.")]
    Quarantine(quarantine::QuarantineArgs),
}

impl Uptime {
    pub fn run(self) -> Result<(), UptimeError> {
        // Set up logging.
        let GlobalArgs {
            verbosity,
            dry_run,
            no_progress_bars,
            save_toml,
        } = self.global_opts;
        // JSON on stdout shouldn't be interleaved with log messages.
        let log_target = match &self.command {
            Command::Stats(args) if args.json => env_logger::Target::Stderr,
            _ => env_logger::Target::Stdout,
        };
        if let Err(e) = setup_logging(verbosity, log_target) {
            eprintln!("Failed to initialise logging: {e}");
        }

        // Print the version of rawacf-uptime and its build-time information.
        let sub_command = match &self.command {
            Command::Ingest(_) => "ingest",
            Command::Stats(_) => "stats",
            Command::Batch(_) => "batch",
            Command::Quarantine(_) => "quarantine",
        };
        info!("rawacf-uptime {} {}", sub_command, env!("CARGO_PKG_VERSION"));
        display_build_info();

        let cancel = Arc::new(AtomicCell::new(false));
        {
            let cancel = Arc::clone(&cancel);
            if let Err(e) = ctrlc::set_handler(move || {
                eprintln!("Stopping after the files in progress...");
                cancel.store(true);
            }) {
                warn!("Couldn't install a Ctrl-C handler: {e}");
            }
        }
        let opts = RunOpts {
            dry_run,
            progress_bars: !no_progress_bars,
            cancel,
        };

        macro_rules! merge_save_run {
            ($args:expr) => {{
                let args = $args.merge()?;
                if let Some(toml) = save_toml {
                    use std::{
                        fs::File,
                        io::{BufWriter, Write},
                    };

                    let mut f = BufWriter::new(File::create(toml)?);
                    let toml_str = toml::to_string(&args)
                        .map_err(|e| UptimeError::Generic(e.to_string()))?;
                    f.write_all(toml_str.as_bytes())?;
                }
                args.run(&opts)?;
            }};
        }

        match self.command {
            Command::Ingest(args) => {
                merge_save_run!(args)
            }

            Command::Stats(args) => {
                merge_save_run!(args)
            }

            Command::Batch(args) => {
                merge_save_run!(args)
            }

            Command::Quarantine(args) => args.run()?,
        }

        info!("rawacf-uptime {} complete.", sub_command);
        Ok(())
    }
}

/// Activate a logger. `env_logger` automatically only uses colours and fancy
/// symbols if we're on a tty (e.g. a terminal); piped output will be
/// formatted sensibly. Source code lines are displayed in log messages when
/// verbosity >= 3.
fn setup_logging(verbosity: u8, target: env_logger::Target) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(target);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        2 => builder.filter_level(log::LevelFilter::Trace),
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
            builder.format(|buf, record| {
                use std::io::Write;

                let timestamp = buf.timestamp();
                let level = record.level();
                let target = record.target();
                let line = record.line().unwrap_or(0);
                let message = record.args();

                writeln!(buf, "[{timestamp} {level} {target}:{line}] {message}")
            })
        }
    };
    builder.try_init()
}

/// Write many info-level log lines of how this executable was compiled.
fn display_build_info() {
    let dirty = match GIT_DIRTY {
        Some(true) => " (dirty)",
        _ => "",
    };
    match GIT_COMMIT_HASH_SHORT {
        Some(hash) => {
            info!("Compiled on git commit hash: {hash}{dirty}");
        }
        None => info!("Compiled on git commit hash: <no git info>"),
    }
    if let Some(hr) = GIT_HEAD_REF {
        info!("            git head ref: {}", hr);
    }
    info!("            {}", BUILT_TIME_UTC);
    info!("         with compiler {}", RUSTC_VERSION);
    info!("");
}
