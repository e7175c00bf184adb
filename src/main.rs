//! cgraph CLI: build and inspect content relevance graphs.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use content_graph::cancel::CancelToken;
use content_graph::config::GraphConfig;
use content_graph::export;
use content_graph::graph::analytics;
use content_graph::graph::builder::build_graph_from_with_cancel;
use content_graph::graph::scoring::score_pair;
use content_graph::graph::update::update_graph_from_with_cancel;
use content_graph::graph::validate::validate_connectivity;
use content_graph::ingest::{ingest_records, load_records};
use content_graph::item::ItemId;
use content_graph::store::{MemorySignalStore, SignalSource};

#[derive(Parser)]
#[command(name = "cgraph", version, about = "Multi-signal content relevance graphs")]
struct Cli {
    /// Graph configuration file (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a graph from a JSON array of content records.
    Build {
        /// Path to the records file.
        #[arg(long)]
        items: PathBuf,
        /// Output path; `.json` writes JSON, anything else bincode.
        #[arg(long, default_value = "graph.bin")]
        out: PathBuf,
    },

    /// Admit new or changed records into an existing graph.
    Update {
        /// Graph to update.
        #[arg(long)]
        graph: PathBuf,
        /// Path to the records file.
        #[arg(long)]
        items: PathBuf,
        /// Output path (defaults to overwriting `--graph`).
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Rebuild a saved graph from its own items under the current configuration.
    Rebuild {
        #[arg(long)]
        graph: PathBuf,
        /// Output path (defaults to overwriting `--graph`).
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show graph statistics and the connectivity report.
    Info {
        #[arg(long)]
        graph: PathBuf,
    },

    /// List the neighbours of an item, strongest first.
    Neighbors {
        #[arg(long)]
        graph: PathBuf,
        /// Item id.
        id: String,
    },

    /// Explain the relevance score of a pair.
    Score {
        #[arg(long)]
        graph: PathBuf,
        a: String,
        b: String,
    },

    /// Shortest path (by hops) between two items.
    Path {
        #[arg(long)]
        graph: PathBuf,
        from: String,
        to: String,
    },

    /// Topic coverage across the graph.
    Topics {
        #[arg(long)]
        graph: PathBuf,
        /// Number of topics to show.
        #[arg(long, default_value = "20")]
        top: usize,
        /// Also list the topic pairs that most often share an item.
        #[arg(long)]
        pairs: bool,
    },

    /// Entity coverage and prominence across the graph.
    Entities {
        #[arg(long)]
        graph: PathBuf,
        /// Number of entities to show.
        #[arg(long, default_value = "20")]
        top: usize,
    },

    /// Manage the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default configuration.
    Init {
        #[arg(long, default_value = "cgraph.toml")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Build { items, out } => {
            let config = load_config(config_path)?;
            let cancel = cancel_on_sigint()?;
            let store = read_store(&items, &config)?;
            let outcome = build_graph_from_with_cancel(&store, &config, &cancel)?;
            export::save(&outcome.graph, &out)?;
            println!(
                "Built graph: {} items, {} edges ({} threshold, {} repair)",
                outcome.stats.items,
                outcome.graph.edge_count(),
                outcome.stats.threshold_edges,
                outcome.stats.repair_edges,
            );
            println!("  pairs scored: {}", outcome.stats.pairs_scored);
            print_problems(outcome.skipped.len(), &outcome.unrepaired);
            println!("Wrote {}", out.display());
        }

        Commands::Update { graph, items, out } => {
            let config = load_config(config_path)?;
            let cancel = cancel_on_sigint()?;
            let base = export::load(&graph)?;
            let store = read_store(&items, &config)?;
            let outcome = update_graph_from_with_cancel(base, &store, &config, &cancel)?;
            let out = out.unwrap_or(graph);
            export::save(&outcome.graph, &out)?;
            let s = &outcome.stats;
            println!(
                "Updated graph: {} added, {} replaced, {} unchanged",
                s.added, s.replaced, s.unchanged
            );
            println!(
                "  edges: -{} removed, +{} threshold, +{} repair",
                s.removed_edges, s.threshold_edges, s.repair_edges
            );
            print_problems(outcome.skipped.len(), &outcome.unrepaired);
            println!("Wrote {}", out.display());
        }

        Commands::Rebuild { graph, out } => {
            let config = load_config(config_path)?;
            let cancel = cancel_on_sigint()?;
            let base = export::load(&graph)?;
            let outcome = build_graph_from_with_cancel(&base, &config, &cancel)?;
            let out = out.unwrap_or(graph);
            export::save(&outcome.graph, &out)?;
            println!(
                "Rebuilt graph: {} items, {} edges (was {})",
                outcome.stats.items,
                outcome.graph.edge_count(),
                base.edge_count(),
            );
            print_problems(outcome.skipped.len(), &outcome.unrepaired);
            println!("Wrote {}", out.display());
        }

        Commands::Info { graph } => {
            let config = load_config(config_path)?;
            let kg = export::load(&graph)?;
            let stats = analytics::graph_stats(&kg);
            let report = validate_connectivity(&kg, config.connectivity);
            println!("Graph: {}", graph.display());
            println!("  items:       {}", stats.items);
            println!(
                "  edges:       {} ({} threshold, {} repair)",
                stats.edges, stats.threshold_edges, stats.repair_edges
            );
            println!(
                "  score:       mean {:.4}, min {:.4}, max {:.4}",
                stats.mean_score, stats.min_score, stats.max_score
            );
            println!("  mean degree: {:.2}", stats.mean_degree);
            println!("  components:  {}", report.components);
            println!(
                "  {}: {}",
                config.connectivity,
                if report.satisfied { "ok" } else { "VIOLATED" }
            );
            if !report.isolated.is_empty() {
                println!("  isolated ({}):", report.isolated.len());
                for id in &report.isolated {
                    println!("    {id}");
                }
            }
        }

        Commands::Neighbors { graph, id } => {
            let kg = export::load(&graph)?;
            let id = ItemId::from(id);
            if !kg.contains(&id) {
                miette::bail!("item not found: {id}");
            }
            let neighbors = kg.neighbor_edges(&id);
            println!("Neighbors of {id} ({}):", neighbors.len());
            for (other, edge) in neighbors {
                println!("  {:<24} {:.4}  [{}]", other.as_str(), edge.score, edge.origin);
            }
        }

        Commands::Score { graph, a, b } => {
            let config = load_config(config_path)?;
            let kg = export::load(&graph)?;
            let (a, b) = (ItemId::from(a), ItemId::from(b));
            let (Some(left), Some(right)) = (kg.item(&a), kg.item(&b)) else {
                miette::bail!("both items must exist in the graph");
            };
            match score_pair(left, right, &config.weights) {
                Ok(Some(pair)) => {
                    println!("{}", pair.key);
                    println!("  embedding: {:.4}", pair.signals.embedding);
                    println!("  topic:     {:.4}", pair.signals.topic);
                    println!("  entity:    {:.4}", pair.signals.entity);
                    println!("  composite: {:.4}", pair.score);
                    match kg.edge(&a, &b) {
                        Some(edge) => println!("  edge:      {} ({:.4})", edge.origin, edge.score),
                        None => println!("  edge:      none"),
                    }
                }
                Ok(None) => miette::bail!("an item is not compared with itself"),
                Err(skipped) => return Err(skipped.reason.into()),
            }
        }

        Commands::Path { graph, from, to } => {
            let kg = export::load(&graph)?;
            match analytics::shortest_path(&kg, &from.into(), &to.into())? {
                Some(path) => {
                    let hops: Vec<&str> = path.iter().map(ItemId::as_str).collect();
                    println!("{} ({} hops)", hops.join(" -> "), path.len().saturating_sub(1));
                }
                None => println!("No path."),
            }
        }

        Commands::Topics { graph, top, pairs } => {
            let kg = export::load(&graph)?;
            let coverage = analytics::topic_coverage(&kg);
            println!("Topics ({} total):", coverage.len());
            for entry in coverage.iter().take(top) {
                println!("  {:<32} {}", entry.topic, entry.items.len());
            }
            if pairs {
                let mut counts: Vec<((String, String), usize)> =
                    analytics::topic_cooccurrence(&kg).into_iter().collect();
                counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                println!("Co-occurring pairs ({} total):", counts.len());
                for ((a, b), n) in counts.iter().take(top) {
                    println!("  {:<48} {n}", format!("{a} + {b}"));
                }
            }
        }

        Commands::Entities { graph, top } => {
            let kg = export::load(&graph)?;
            let coverage = analytics::entity_coverage(&kg);
            let distribution = analytics::entity_distribution(&kg);
            println!(
                "Entities ({} total, mentioned by {} of {} items):",
                coverage.len(),
                distribution.len(),
                kg.item_count()
            );
            for entry in coverage.iter().take(top) {
                println!(
                    "  {:<32} {:.3}  {} items, {} topics",
                    entry.entity,
                    entry.prominence,
                    entry.items.len(),
                    entry.topics
                );
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Init { out } => {
                let path = config_path.unwrap_or(&out);
                GraphConfig::default().save(path)?;
                println!("Wrote default config to {}", path.display());
            }
        },
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<GraphConfig> {
    match path {
        Some(path) => Ok(GraphConfig::load(path)?),
        None => Ok(GraphConfig::default()),
    }
}

/// Register SIGINT so a long rebuild stops between pair batches.
fn cancel_on_sigint() -> Result<CancelToken> {
    let token = CancelToken::new();
    signal_hook::flag::register(signal_hook::consts::SIGINT, token.flag()).into_diagnostic()?;
    Ok(token)
}

/// Load, validate and stage records in a signal store. A later record with
/// the same id replaces an earlier one.
fn read_store(path: &Path, config: &GraphConfig) -> Result<MemorySignalStore> {
    let records = load_records(path)?;
    let total = records.len();
    let report = ingest_records(records, config.dimension);
    for rejected in &report.rejected {
        tracing::warn!(error = %rejected, "record rejected");
    }
    let store = MemorySignalStore::with_capacity(report.items.len());
    for item in report.items {
        let id = item.id.clone();
        if store.contains(&id) {
            tracing::warn!(%id, "duplicate record id, keeping the last occurrence");
        }
        store.put(item);
    }
    println!(
        "Ingested {} of {} records from {}",
        store.len(),
        total,
        path.display()
    );
    Ok(store)
}

fn print_problems(skipped: usize, unrepaired: &[ItemId]) {
    if skipped > 0 {
        println!("  skipped pairs: {skipped}");
    }
    if !unrepaired.is_empty() {
        println!("  unconnected items ({}):", unrepaired.len());
        for id in unrepaired {
            println!("    {id}");
        }
    }
}
