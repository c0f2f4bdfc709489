use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use tracing_subscriber::EnvFilter;

use relsync::{
    cli, config, error,
    types::{ArtistSource, ReleaseKinds},
};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Synchronize artists and their releases into a new snapshot
    Sync(SyncArgs),

    /// List releases of the stored snapshot by release week
    Releases(ReleasesOptions),

    /// List artists of the stored snapshot
    Artists(ArtistsOptions),

    /// Snapshot status and release week helpers
    Info(InfoOptions),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct SyncArgs {
    /// Artist source(s) to discover artists from; can be repeated
    #[clap(long = "source", num_args = 1)]
    pub sources: Vec<ArtistSource>,

    /// Number of concurrent requests
    #[clap(long)]
    pub concurrency: Option<usize>,

    /// Fetch album details (label, popularity) after releases
    #[clap(long)]
    pub extra: bool,

    /// Release type(s) to include; can be repeated or comma separated
    #[clap(long = "type", num_args = 1)]
    pub release_types: Vec<ReleaseKinds>,
}

impl From<SyncArgs> for cli::SyncOptions {
    fn from(args: SyncArgs) -> Self {
        let release_types = if args.release_types.is_empty() {
            None
        } else {
            Some(ReleaseKinds::new(
                args.release_types
                    .iter()
                    .flat_map(|k| k.kinds().iter().copied()),
            ))
        };

        cli::SyncOptions {
            sources: args.sources,
            concurrency: args.concurrency,
            extra: args.extra,
            release_types,
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct ReleasesOptions {
    /// Number of previous weeks to include
    #[clap(long)]
    pub previous_weeks: Option<u32>,

    /// Reference release date (YYYY-MM-DD)
    #[clap(long)]
    pub release_date: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ArtistsOptions {
    /// Search for artists
    #[clap(long)]
    pub search: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct InfoOptions {
    #[clap(long)]
    release_week: bool,
    #[clap(long)]
    previous_weeks: Option<u32>,
    #[clap(long)]
    release_date: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("relsync=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let cli = Cli::parse();

    match cli.command {
        Command::Sync(args) => cli::sync(args.into()).await,
        Command::Releases(opt) => cli::list_releases(opt.previous_weeks, opt.release_date).await,
        Command::Artists(opt) => cli::list_artists(opt.search).await,
        Command::Info(opt) => cli::info(opt.release_week, opt.previous_weeks, opt.release_date).await,
        Command::Completions(opt) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout())
        }
    }
}
