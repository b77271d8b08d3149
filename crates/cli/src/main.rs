use anatomist::AssemblyGraph;
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use oracle::Reporter;
use serde::Deserialize;
use std::io::Write;
use std::path::PathBuf;

mod emit;
mod loader;

/// Test-method attributes assumed when none are configured.
const DEFAULT_TEST_METHOD_ATTRIBUTES: &[&str] = &[
    "Microsoft.VisualStudio.TestTools.UnitTesting.TestMethodAttribute",
    "Microsoft.VisualStudio.TestTools.UnitTesting.DataTestMethodAttribute",
    "Xunit.FactAttribute",
    "Xunit.TheoryAttribute",
    "NUnit.Framework.TestAttribute",
    "NUnit.Framework.TestCaseAttribute",
];

#[derive(Parser)]
#[command(name = "sexton")]
#[command(about = "Dead-code detection for compiled managed assemblies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LoadArgs {
    /// Directory of assembly metadata snapshots (*.json).
    path: PathBuf,

    /// Assembly whose public surface is a reachability root (repeatable).
    #[arg(long = "root-assembly", value_name = "NAME")]
    root_assemblies: Vec<String>,

    /// Test-method attribute full name (repeatable; defaults to the
    /// MSTest/xUnit/NUnit set).
    #[arg(long = "test-attribute", value_name = "FULL_NAME")]
    test_attributes: Vec<String>,

    /// Attribute full name marking reflection-accessed declarations
    /// (repeatable).
    #[arg(long = "reflection-attribute", value_name = "FULL_NAME")]
    reflection_attributes: Vec<String>,

    /// JSON file of `{ "assembly": …, "symbol": … }` reflection pins.
    #[arg(long, value_name = "FILE")]
    reflection_symbols: Option<PathBuf>,

    /// Keep going when a snapshot fails to read or parse.
    #[arg(long)]
    continue_on_load_errors: bool,

    /// Maximum snapshots read concurrently.
    #[arg(long, default_value_t = 32)]
    parallelism: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the reference graph and write every report.
    Analyze {
        #[command(flatten)]
        load: LoadArgs,
        /// Report output directory.
        #[arg(long, default_value = "sexton-reports")]
        output: PathBuf,
        /// Also write the full per-symbol graph dump.
        #[arg(long)]
        dump: bool,
    },
    /// Build the graph and print the per-symbol dump to stdout.
    Dump {
        #[command(flatten)]
        load: LoadArgs,
    },
}

/// One entry of the `--reflection-symbols` file.
#[derive(Debug, Deserialize)]
struct ReflectionSymbol {
    assembly: String,
    symbol: String,
}

#[derive(Debug, Default)]
struct LoadStats {
    merged: usize,
    duplicates: usize,
    failures: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze { load, output, dump } => cmd_analyze(load, output, dump).await,
        Commands::Dump { load } => cmd_dump(load).await,
    }
}

// ---------------------------------------------------------------------------
// analyze
// ---------------------------------------------------------------------------

async fn cmd_analyze(load: LoadArgs, output: PathBuf, dump: bool) -> anyhow::Result<()> {
    let (graph, stats) = build_graph(&load).await?;
    let reporter = Reporter::new(&graph)?;
    emit::write_reports(&reporter, &output, dump)?;

    let graph_stats = graph.stats();
    let dead = reporter.collect_dead_symbols();
    let dead_types: usize = dead.iter().map(|e| e.dead_types.len()).sum();
    let dead_members: usize = dead.iter().map(|e| e.dead_members.len()).sum();
    let unreferenced = reporter.collect_unreferenced_assemblies().len();
    let unanalyzed = reporter.collect_unanalyzed_assemblies().len();

    println!("+------------------------------------------+");
    println!("| SEXTON ANALYZE                           |");
    println!("+------------------------------------------+");
    println!("| Assemblies     : {:>22} |", stats.merged);
    println!("| Duplicates     : {:>22} |", stats.duplicates);
    println!("| Load failures  : {:>22} |", stats.failures);
    println!("| Symbols        : {:>22} |", graph_stats.symbol_count);
    println!("| Edges          : {:>22} |", graph_stats.edge_count);
    println!("| Dead types     : {:>22} |", dead_types);
    println!("| Dead members   : {:>22} |", dead_members);
    println!("| Unreferenced   : {:>22} |", unreferenced);
    println!("| Unanalyzed     : {:>22} |", unanalyzed);
    println!("+------------------------------------------+");
    println!("Reports written to {}", output.display());

    Ok(())
}

// ---------------------------------------------------------------------------
// dump
// ---------------------------------------------------------------------------

async fn cmd_dump(load: LoadArgs) -> anyhow::Result<()> {
    let (graph, _) = build_graph(&load).await?;
    let reporter = Reporter::new(&graph)?;

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    reporter.dump(&mut handle)?;
    handle.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// shared pipeline
// ---------------------------------------------------------------------------

/// Configures a graph, loads snapshots with bounded parallelism, merges them
/// strictly serially as their read tasks finish, and runs completion.
async fn build_graph(load: &LoadArgs) -> anyhow::Result<(AssemblyGraph, LoadStats)> {
    let mut graph = AssemblyGraph::new();

    for name in &load.root_assemblies {
        graph.record_root_assembly(name)?;
    }
    if load.test_attributes.is_empty() {
        for attribute in DEFAULT_TEST_METHOD_ATTRIBUTES {
            graph.record_test_method_attribute(attribute)?;
        }
    } else {
        for attribute in &load.test_attributes {
            graph.record_test_method_attribute(attribute)?;
        }
    }
    for attribute in &load.reflection_attributes {
        graph.record_reflection_marker_attribute(attribute)?;
    }
    if let Some(file) = &load.reflection_symbols {
        let bytes =
            std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
        let pins: Vec<ReflectionSymbol> = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing {}", file.display()))?;
        for pin in pins {
            graph.record_reflection_symbol(&pin.assembly, &pin.symbol)?;
        }
    }

    let files = loader::find_snapshots(&load.path)?;
    if files.is_empty() {
        log::warn!("no assembly snapshots under {}", load.path.display());
    } else {
        log::info!(
            "loading {} snapshots, up to {} in parallel",
            files.len(),
            load.parallelism
        );
    }

    let mut stats = LoadStats::default();
    let mut tasks = loader::spawn_loads(files, load.parallelism);
    while let Some(joined) = tasks.join_next().await {
        match joined? {
            Ok((path, binary)) => {
                if graph.merge_assembly(&binary)? {
                    stats.merged += 1;
                    log::debug!("merged {} from {}", binary.name, path.display());
                } else {
                    stats.duplicates += 1;
                    log::info!("duplicate assembly {} at {}", binary.name, path.display());
                }
            }
            Err(error) => {
                stats.failures += 1;
                if load.continue_on_load_errors {
                    log::warn!("{error:#}");
                } else {
                    return Err(error);
                }
            }
        }
    }

    graph.done(|line: &str| log::info!("{line}"))?;
    Ok((graph, stats))
}
