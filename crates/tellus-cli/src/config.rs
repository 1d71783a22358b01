use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "tellus")]
#[command(
    author,
    version,
    about = "Harvester for DCAT-style open data catalogs"
)]
#[command(after_help = "Examples:
  tellus harvest
  tellus harvest --catalog sspm
  tellus harvest --file ./data.json --id sspm
  tellus schedule nightly --time 3 30 --interval 1 days
  tellus tasks --limit 5")]
pub struct Config {
    /// PostgreSQL database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Harvest catalogs listed in catalogs.toml, or a single catalog document
    #[command(after_help = "Examples:
  tellus harvest                           # Harvest all enabled catalogs from config
  tellus harvest --catalog sspm            # Harvest one catalog by identifier
  tellus harvest --config ~/custom.toml    # Use custom config file
  tellus harvest --file data.json --id c1  # Harvest a document not listed in config")]
    Harvest {
        /// Harvest a specific catalog by identifier from config file
        #[arg(short = 'n', long, value_name = "NAME", conflicts_with = "file")]
        catalog: Option<String>,

        /// Custom path to catalogs.toml configuration file
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Catalog document (path or URL) to harvest directly
        #[arg(short, long, value_name = "PATH", requires = "id")]
        file: Option<String>,

        /// Identifier to store the catalog given with --file under
        #[arg(long, value_name = "ID", requires = "file")]
        id: Option<String>,

        /// Treat every download URL as a local path
        #[arg(long)]
        read_local: bool,
    },
    /// Register a repeatable harvest job
    #[command(after_help = "Example: tellus schedule nightly --time 6 0 --interval 24 hours")]
    Schedule {
        /// Unique job name
        name: String,

        /// Function the job runner invokes
        #[arg(long)]
        callable: Option<String>,

        /// First run time (UTC), tomorrow at HOUR:MINUTE
        #[arg(long, num_args = 2, value_names = ["HOUR", "MINUTE"])]
        time: Option<Vec<u32>>,

        /// Repeat interval, e.g. `24 hours` or `1 weeks`
        #[arg(long, num_args = 2, value_names = ["N", "UNIT"])]
        interval: Option<Vec<String>>,

        /// Custom path to catalogs.toml configuration file
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
    /// Show recent harvest tasks and their logs
    Tasks {
        /// Maximum number of tasks to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}
