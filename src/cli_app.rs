//! Top-level CLI definition and dispatch.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use treecost::core::config::Config;
use treecost::core::errors::{Result, TcError};
use treecost::index::mapping::CostRate;
use treecost::ingest::{NumericIdentity, TreeBuilder};
use treecost::logger::{BuildLogger, EventType, LogEntry};
use treecost::store::disk::{DiskNodeStore, DiskNodeStoreOptions};
use treecost::tree::Tree;

/// treecost — hierarchical filesystem cost/usage index.
#[derive(Debug, Parser)]
#[command(
    name = "treecost",
    author,
    version,
    about = "Hierarchical filesystem cost/usage index",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Ingest a scan dump into a disk store, finalize it, and close it.
    Build(BuildArgs),
    /// Query a built store and print nested JSON usage data.
    Query(QueryArgs),
}

#[derive(Debug, Clone, Args)]
struct BuildArgs {
    /// Scan dump file (tab-separated, base64-encoded paths).
    #[arg(long, value_name = "FILE")]
    input: PathBuf,
    /// Store database file to create.
    #[arg(long, value_name = "FILE")]
    store: PathBuf,
    /// JSONL build log path; stderr when omitted.
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct QueryArgs {
    /// Store database file built by `treecost build`.
    #[arg(long, value_name = "FILE")]
    store: PathBuf,
    /// Path to query; the tree root when omitted.
    #[arg(long, default_value = "")]
    path: String,
    /// How many directory levels to descend below the queried path.
    #[arg(long, default_value_t = 2)]
    depth: u32,
    /// Emit only these categories; repeatable. All categories when omitted.
    #[arg(long = "category", value_name = "NAME")]
    categories: Vec<String>,
}

/// Dispatch a parsed command line.
pub fn run(cli: &Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    match &cli.command {
        Command::Build(args) => build(args, &config),
        Command::Query(args) => query(args, &config),
    }
}

fn build(args: &BuildArgs, config: &Config) -> Result<()> {
    let mut logger = match &args.log {
        Some(path) => BuildLogger::open(path),
        None => BuildLogger::stderr(),
    };

    let file = File::open(&args.input).map_err(|e| TcError::io(&args.input, e))?;
    let input = BufReader::new(file);

    let store = DiskNodeStore::open(&args.store, DiskNodeStoreOptions::from_config(&config.store))?;
    let mut tree = Tree::with_cost_rate(store, CostRate::new(config.cost.cost_per_tib_year));
    let mut builder = TreeBuilder::new(NumericIdentity, &config.ingest)?;

    let mut entry = LogEntry::new(EventType::BuildStarted);
    entry.path = Some(args.input.display().to_string());
    logger.log(&entry);

    let stats = match builder.ingest(&mut tree, input, &mut logger) {
        Ok(stats) => stats,
        Err(e) => {
            log_error(&mut logger, &e);
            return Err(e);
        }
    };

    logger.log(&LogEntry::new(EventType::FinalizeStarted));
    if let Err(e) = tree.finalize() {
        log_error(&mut logger, &e);
        return Err(e);
    }
    let mut entry = LogEntry::new(EventType::FinalizeCompleted);
    entry.nodes = Some(tree.node_count());
    logger.log(&entry);

    tree.close()?;
    let mut entry = LogEntry::new(EventType::StoreClosed);
    entry.lines = Some(stats.lines);
    entry.records = Some(stats.records);
    entry.skipped = Some(stats.skipped);
    entry.nodes = Some(tree.node_count());
    logger.log(&entry);
    logger.flush();
    Ok(())
}

fn query(args: &QueryArgs, config: &Config) -> Result<()> {
    let store = DiskNodeStore::open(&args.store, DiskNodeStoreOptions::from_config(&config.store))?;
    let mut tree = Tree::with_cost_rate(store, CostRate::new(config.cost.cost_per_tib_year));

    let whitelist: Option<BTreeSet<String>> = if args.categories.is_empty() {
        None
    } else {
        Some(args.categories.iter().cloned().collect())
    };
    let out = tree.format(&args.path, args.depth, whitelist.as_ref())?;
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn log_error(logger: &mut BuildLogger, e: &TcError) {
    let mut entry = LogEntry::new(EventType::Error);
    entry.error_code = Some(e.code().to_string());
    entry.details = Some(e.to_string());
    logger.log(&entry);
    logger.flush();
}
