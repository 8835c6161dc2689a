//! # docsync CLI
//!
//! The `docsync` binary keeps a vector store in step with a local folder or a
//! SharePoint library.
//!
//! ## Usage
//!
//! ```bash
//! docsync --config ./config/docsync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsync sources` | Show configured origins and whether they look usable |
//! | `docsync sync <local\|sharepoint>` | Upload missing files, delete extra ones |
//! | `docsync dedupe` | Delete same-named remote files, keeping the first |
//! | `docsync completions <shell>` | Print shell completions |
//!
//! Reports go to stdout; logs and progress go to stderr.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use docset_sync::config;
use docset_sync::dedupe;
use docset_sync::progress::ProgressMode;
use docset_sync::report;
use docset_sync::sources;
use docset_sync::sync::{self, Origin, SyncOptions};

/// docsync: mirror a document folder into a vector store by file name.
#[derive(Parser)]
#[command(
    name = "docsync",
    about = "Mirror a local folder or SharePoint library into a vector store",
    version,
    long_about = "docsync compares the files of an origin (a local directory or a SharePoint \
    document library) with the files attached to a vector store, by file name, then uploads \
    what is missing and deletes what is no longer in the origin."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docsync.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` applies otherwise.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured origins and their status.
    ///
    /// Checks that the local root exists and that secrets can be resolved.
    /// Makes no network calls.
    Sources,

    /// Synchronize the vector store with an origin.
    ///
    /// Uploads files present in the origin but missing from the store and,
    /// unless `--keep-extra` is given, deletes store files whose name no
    /// longer exists in the origin. Safe to re-run at any time.
    Sync {
        /// Which configured origin to read from.
        #[arg(value_enum)]
        origin: Origin,

        /// Only report what would happen; make no changes.
        #[arg(long)]
        dry_run: bool,

        /// Never delete store files, even if missing from the origin.
        #[arg(long)]
        keep_extra: bool,

        /// Override the batch size used for progress reporting.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Print the report as JSON instead of a summary.
        #[arg(long)]
        json: bool,

        /// Progress output on stderr. Defaults to human when stderr is a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Delete duplicate store files that share a name, keeping the first.
    Dedupe {
        /// Only report what would happen; make no changes.
        #[arg(long)]
        dry_run: bool,

        /// Print the report as JSON instead of a summary.
        #[arg(long)]
        json: bool,

        /// Progress output on stderr.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Print shell completions to stdout.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "docset_sync=warn".into()),
        1 => tracing_subscriber::EnvFilter::new("docset_sync=info"),
        _ => tracing_subscriber::EnvFilter::new("docset_sync=debug"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that don't require config
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "docsync", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Sync {
            origin,
            dry_run,
            keep_extra,
            batch_size,
            json,
            progress,
        } => {
            let mut options = SyncOptions::from_config(&cfg);
            options.dry_run |= dry_run;
            if keep_extra {
                options.delete_extra = false;
            }
            if let Some(n) = batch_size.filter(|n| *n > 0) {
                options.batch_size = n;
            }

            let reporter = progress
                .unwrap_or_else(ProgressMode::default_for_tty)
                .reporter();
            let sync_report =
                sync::run_sync_from_config(&cfg, origin, &options, reporter.as_ref()).await?;

            if json {
                println!("{}", report::render_json(&sync_report)?);
            } else {
                print!("{}", report::render_sync_summary(&sync_report));
            }
        }
        Commands::Dedupe {
            dry_run,
            json,
            progress,
        } => {
            let store = sync::build_store(&cfg)?;
            let reporter = progress
                .unwrap_or_else(ProgressMode::default_for_tty)
                .reporter();
            let dedupe_report = dedupe::run_dedupe(
                &store,
                dry_run || cfg.sync.dry_run,
                cfg.sync.batch_size,
                reporter.as_ref(),
            )
            .await?;

            if json {
                println!("{}", report::render_json(&dedupe_report)?);
            } else {
                print!("{}", report::render_dedupe_summary(&dedupe_report));
            }
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
