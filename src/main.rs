use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tastevec_core::{Item, ItemId};
use tastevec_engine::{Catalog, Engine, EngineConfig, ItemSource};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// TF-IDF item vectors and recommendations over a JSON catalog
#[derive(Parser, Debug)]
#[command(name = "tastevec")]
#[command(about = "Content-based recommendations over an item catalog", long_about = None)]
struct Args {
    /// Path to the data directory
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// Engine configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit a new model on the whole catalog and re-vectorize it
    Fit {
        #[arg(long)]
        catalog: PathBuf,
    },
    /// Make sure the given items have vectors
    Ensure {
        #[arg(long)]
        catalog: PathBuf,
        /// Item ids; numeric ids are integers, `s:42` is the string id "42"
        #[arg(required = true)]
        ids: Vec<ItemId>,
    },
    /// Recommend items for a selection
    Recommend {
        #[arg(long)]
        catalog: PathBuf,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        /// Item ids; numeric ids are integers, `s:42` is the string id "42"
        #[arg(required = true)]
        ids: Vec<ItemId>,
    },
    /// Items closest to one already-vectorized item
    Similar {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        /// Item id; numeric ids are integers, `s:42` is the string id "42"
        id: ItemId,
    },
    /// Vector coverage of a catalog
    Stats {
        #[arg(long)]
        catalog: PathBuf,
    },
}

fn load_catalog(path: &Path) -> anyhow::Result<Catalog> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading catalog {}", path.display()))?;
    let items: Vec<Item> = serde_json::from_str(&data)
        .with_context(|| format!("parsing catalog {}", path.display()))?;
    info!("Loaded {} items from {:?}", items.len(), path);
    Ok(items.into_iter().collect())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout stays valid JSON
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting tastevec v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {:?}", args.data_dir);

    let config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    let engine = Engine::open(&args.data_dir, config)?;

    match args.command {
        Command::Fit { catalog } => {
            let catalog = load_catalog(&catalog)?;
            print_json(&engine.fit_model(&catalog)?)?;
        }
        Command::Ensure { catalog, ids } => {
            let catalog = load_catalog(&catalog)?;
            print_json(&engine.ensure_vectors(&ids, &catalog)?)?;
        }
        Command::Recommend { catalog, limit, ids } => {
            let catalog = load_catalog(&catalog)?;
            print_json(&engine.recommend(&ids, limit, &catalog)?)?;
        }
        Command::Similar { limit, id } => {
            print_json(&engine.similar_items(&id, limit)?)?;
        }
        Command::Stats { catalog } => {
            let catalog = load_catalog(&catalog)?;
            print_json(&engine.stats(catalog.len()))?;
        }
    }

    Ok(())
}
