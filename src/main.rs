use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::debug;

use empire_utils::commands::{self, AddInstallOptions, AnalyticsOptions};
use empire_utils::config::get_config;
use empire_utils::logging::init_logging;
use empire_utils::store::Store;

#[derive(Parser)]
#[command(name = "empire-utils")]
#[command(about = "Game log analytics and install launcher for Minecraft")]
#[command(version = "1.0.0")]
struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List game log directories and the log files found in them
    Sources {
        /// Scan this directory instead of the stored ones (repeatable)
        #[arg(long = "dir")]
        directories: Vec<PathBuf>,
    },
    /// Replay game logs through the analytics patterns
    Analytics {
        /// Scan this directory instead of the stored ones (repeatable)
        #[arg(long = "dir")]
        directories: Vec<PathBuf>,
        /// Only logs modified on or after this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,
        /// Only logs modified on or before this date (YYYY-MM-DD)
        #[arg(long)]
        until: Option<String>,
        /// Print once after history is replayed instead of following live logs
        #[arg(long)]
        snapshot: bool,
    },
    /// Manage game installs
    Installs {
        #[command(subcommand)]
        action: InstallAction,
    },
    /// Download everything an install needs without launching it
    Resolve {
        /// Install name or uuid
        install: String,
    },
    /// Launch an install
    Launch {
        /// Install name or uuid
        install: String,
        /// Offline player name
        #[arg(long, default_value = "Player")]
        player: String,
    },
    /// Manage saved waypoints
    Waypoints {
        #[command(subcommand)]
        action: WaypointAction,
    },
}

#[derive(Subcommand)]
enum InstallAction {
    /// List configured installs
    List,
    /// Create a new install
    Add(AddInstallArgs),
}

#[derive(Args)]
struct AddInstallArgs {
    name: String,
    /// Game version id, `latest` or `latest-snapshot`
    #[arg(long, default_value = "latest")]
    version: String,
    /// Add the mod loader, optionally pinned to a version
    #[arg(long, num_args = 0..=1)]
    loader: Option<Option<String>>,
    /// Mod jar URL (repeatable)
    #[arg(long = "mod")]
    mods: Vec<String>,
    /// Shader pack URL (repeatable)
    #[arg(long = "shaderpack")]
    shaderpacks: Vec<String>,
    /// Extra game argument (repeatable)
    #[arg(long = "arg", allow_hyphen_values = true)]
    extra_arguments: Vec<String>,
    /// Start through the main class wrapper jar
    #[arg(long)]
    wrap_main_class: bool,
}

#[derive(Subcommand)]
enum WaypointAction {
    /// List saved waypoints
    List {
        #[arg(long)]
        server: Option<String>,
    },
    /// Save a waypoint
    Add {
        name: String,
        #[arg(long)]
        server: Option<String>,
        /// X Y Z coordinates
        #[arg(num_args = 3, allow_negative_numbers = true, conflicts_with = "paste")]
        coordinates: Vec<i64>,
        /// Text copied from the game containing coordinates
        #[arg(long)]
        paste: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_guard = init_logging();
    let json = cli.json;

    if let Err(e) = run(cli).await {
        drop(log_guard);
        handle_error(e, json);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = get_config();
    let mut store = Store::open(&config.paths.store_file())?;
    debug!(store = %store.path().display(), "Opened store");
    let json = cli.json;

    match cli.command {
        Commands::Sources { directories } => commands::list_sources(&store, directories, json),
        Commands::Analytics {
            directories,
            since,
            until,
            snapshot,
        } => {
            let (since, until) = commands::parse_date_range(since.as_deref(), until.as_deref())?;
            let options = AnalyticsOptions {
                directories,
                since,
                until,
                snapshot,
                json,
            };
            commands::run_analytics(config, &store, options).await
        }
        Commands::Installs { action } => match action {
            InstallAction::List => commands::list_installs(&store, json),
            InstallAction::Add(args) => {
                let options = AddInstallOptions {
                    name: args.name,
                    version: args.version,
                    loader: args.loader,
                    mods: args.mods,
                    shaderpacks: args.shaderpacks,
                    extra_arguments: args.extra_arguments,
                    wrap_main_class: args.wrap_main_class,
                };
                commands::add_install(config, &mut store, options).await
            }
        },
        Commands::Resolve { install } => {
            commands::resolve_install(config, &mut store, &install, json).await
        }
        Commands::Launch { install, player } => {
            commands::run_launch(config, &mut store, &install, &player, json).await
        }
        Commands::Waypoints { action } => match action {
            WaypointAction::List { server } => {
                commands::list_waypoints(&store, server.as_deref(), json)
            }
            WaypointAction::Add {
                name,
                server,
                coordinates,
                paste,
            } => {
                let coordinates = match coordinates.as_slice() {
                    [x, y, z] => Some((*x, *y, *z)),
                    _ => None,
                };
                commands::add_waypoint(&mut store, name, server, coordinates, paste.as_deref())
            }
        },
    }
}

fn handle_error(e: anyhow::Error, json: bool) {
    if json {
        println!("{}", serde_json::json!({ "error": format!("{e:#}") }));
    } else {
        eprintln!("Error: {:#}", e);
    }
    process::exit(1);
}
