//! `coskit`: developer CLI for the cross-origin storage broker.
//!
//! State lives under `<data-dir>/coskit`: stored files in `blobs/` and the
//! consent ledger in `consent-ledger.json`. Every command that goes through
//! the broker acts on behalf of an `--origin` and may prompt on the terminal
//! unless `--auto-consent` is given.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use coskit_core::consent::ConsentChoice;
use coskit_core::{HashAlgorithm, Origin, ValidationError};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod prompter;

#[derive(Parser)]
#[command(name = "coskit", version)]
#[command(about = "Cross-origin, content-addressed storage broker", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Root directory for broker state [default: platform data directory]
    #[arg(long, env = "COSKIT_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Broker configuration JSON file
    #[arg(long, env = "COSKIT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Answer every consent prompt with this choice instead of asking
    /// (allow-once, allow-persistent, deny)
    #[arg(long, env = "COSKIT_AUTO_CONSENT", global = true)]
    pub auto_consent: Option<ConsentChoice>,

    /// Enable debug logging (overridden by `RUST_LOG`)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print the content hash of a file
    Hash {
        /// File to hash
        file: PathBuf,

        /// Digest algorithm
        #[arg(long, default_value = "SHA-256")]
        algorithm: HashAlgorithm,
    },

    /// Store a file through a create handle
    Store {
        /// File to store
        file: PathBuf,

        /// Requesting origin
        #[arg(long, value_parser = parse_origin)]
        origin: Origin,

        /// The origin's label for the file, shown in the consent prompt
        #[arg(long)]
        description: String,

        /// Digest algorithm
        #[arg(long, default_value = "SHA-256")]
        algorithm: HashAlgorithm,
    },

    /// Fetch a stored file through a read handle
    Fetch {
        /// Hex digest of the file
        #[arg(long)]
        hash: String,

        /// Requesting origin
        #[arg(long, value_parser = parse_origin)]
        origin: Origin,

        /// The origin's label for the file, shown in the consent prompt
        #[arg(long)]
        description: String,

        /// Digest algorithm
        #[arg(long, default_value = "SHA-256")]
        algorithm: HashAlgorithm,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List stored hashes
    Entries,

    /// Delete a stored file
    Evict {
        /// Hex digest of the file
        hash: String,

        /// Digest algorithm
        #[arg(long, default_value = "SHA-256")]
        algorithm: HashAlgorithm,
    },

    /// Forget every consent decision and delete every stored file
    Clear {
        /// Confirm clearing all broker state
        #[arg(long, required = true)]
        all: bool,
    },

    /// Inspect or clear remembered consent decisions
    Consent {
        #[command(subcommand)]
        command: commands::consent::ConsentCommand,
    },

    /// Speak the request protocol over stdio, one JSON message per line
    Serve {
        /// Origin every message is attributed to
        #[arg(long, value_parser = parse_origin)]
        origin: Origin,
    },
}

fn parse_origin(origin: &str) -> Result<Origin, ValidationError> {
    Origin::parse(origin)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    match cli.command {
        Command::Hash { file, algorithm } => commands::blob::hash(&file, algorithm).await,
        Command::Store {
            file,
            origin,
            description,
            algorithm,
        } => commands::blob::store(&cli.global, &file, &origin, description, algorithm).await,
        Command::Fetch {
            hash,
            origin,
            description,
            algorithm,
            out,
        } => {
            commands::blob::fetch(
                &cli.global,
                &origin,
                description,
                algorithm,
                hash,
                out.as_deref(),
            )
            .await
        }
        Command::Entries => commands::blob::entries(&cli.global).await,
        Command::Evict { hash, algorithm } => {
            commands::blob::evict(&cli.global, algorithm, hash).await
        }
        Command::Clear { all: _ } => commands::blob::clear_all(&cli.global).await,
        Command::Consent { command } => commands::consent::run(&cli.global, command),
        Command::Serve { origin } => commands::serve::run(&cli.global, origin).await,
    }
}
