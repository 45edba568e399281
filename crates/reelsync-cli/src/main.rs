use clap::{ArgAction, Parser, Subcommand};
use commands::{clear, daemon, status, sync};

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "reelsync")]
#[command(about = "ReelSync - Keep your local media library and Trakt in step")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync of the local library against Trakt
    #[command(long_about = "Reconcile watched state, collection, ratings and watchlist between the configured local libraries and Trakt. Without --movies or --shows, every library kind enabled in the configuration is synced.")]
    Sync {
        /// Sync the movie library
        #[arg(long, action = ArgAction::SetTrue)]
        movies: bool,

        /// Sync the show library
        #[arg(long, action = ArgAction::SetTrue)]
        shows: bool,

        /// Refetch every remote facet, ignoring cached activity markers
        #[arg(long, action = ArgAction::SetTrue)]
        force_refresh: bool,

        /// Compute and print what would change without applying anything
        #[arg(long, action = ArgAction::SetTrue)]
        dry_run: bool,
    },
    /// Run as daemon with internal scheduler
    #[command(long_about = "Run ReelSync in the foreground and sync every library kind on the configured cron schedule. An initial sync runs on startup unless --no-startup-sync is given.")]
    Daemon {
        /// Cron schedule expression, seconds first (e.g., '0 0 */6 * * *' for every 6 hours)
        #[arg(long, value_name = "SCHEDULE")]
        schedule: Option<String>,

        /// Skip initial sync on startup
        #[arg(long, action = ArgAction::SetTrue)]
        no_startup_sync: bool,
    },
    /// Show cached snapshots and their activity markers
    Status,
    /// Clear cached data
    #[command(long_about = "Clear persisted facet snapshots or stored credentials. Clearing the cache makes the next sync refetch every facet.")]
    Clear {
        /// Clear cache and credentials
        #[arg(long, action = ArgAction::SetTrue, conflicts_with_all = ["cache", "credentials"])]
        all: bool,

        /// Clear persisted facet snapshots
        #[arg(long, action = ArgAction::SetTrue)]
        cache: bool,

        /// Clear stored Trakt tokens
        #[arg(long, action = ArgAction::SetTrue)]
        credentials: bool,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let output = output::Output::new(cli.output, cli.quiet);

    match cli.command {
        Commands::Sync {
            movies,
            shows,
            force_refresh,
            dry_run,
        } => {
            logging::init_logging(cli.verbose, cli.quiet).map_err(|e| color_eyre::eyre::eyre!("{}", e))?;
            sync::run_sync(movies, shows, force_refresh, dry_run, &output).await
        }
        Commands::Daemon {
            schedule,
            no_startup_sync,
        } => daemon::run_daemon(schedule, no_startup_sync, cli.verbose, cli.quiet, &output).await,
        Commands::Status => {
            logging::init_logging(cli.verbose, cli.quiet).map_err(|e| color_eyre::eyre::eyre!("{}", e))?;
            status::run_status(&output).await
        }
        Commands::Clear {
            all,
            cache,
            credentials,
        } => {
            logging::init_logging(cli.verbose, cli.quiet).map_err(|e| color_eyre::eyre::eyre!("{}", e))?;
            clear::run_clear(all, cache, credentials, &output).await
        }
    }
}
