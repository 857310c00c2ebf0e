use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use creative_maps::graph::{
    ClusterOrder, ClusterSummary, GraphData, OptimizedEdges, TagStats, cluster,
    optimize_with_report, parse_graph_payload, search_nodes, sort_clusters, tag_stats,
};
use creative_maps::metrics::backfill_node_ratios;
use creative_maps::{ClusterInfo, LayoutEngine, LayoutOptions, LayoutStrategy, Node};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Write the result here instead of stdout.
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Group nodes into connected clusters and aggregate their metrics.
    Cluster {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        order: OrderArgs,
    },
    /// Reduce each cluster to its strongest spanning tree.
    Optimize {
        #[command(flatten)]
        input: InputArgs,
        /// Fraction of the remaining edges to keep, strongest first.
        #[arg(long, default_value_t = 0.0)]
        keep_top: f64,
    },
    /// Run the force layout until it settles and emit node positions.
    Layout {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long, default_value_t = LayoutStrategy::Default)]
        strategy: LayoutStrategy,
        #[arg(long, default_value_t = 800.0)]
        width: f32,
        #[arg(long, default_value_t = 600.0)]
        height: f32,
        /// Upper bound on integration steps.
        #[arg(long, default_value_t = 1000)]
        max_steps: usize,
        #[arg(long)]
        seed: Option<u64>,
        /// Optimize edges before laying out, keeping this fraction of extras.
        #[arg(long)]
        keep_top: Option<f64>,
    },
    /// Fuzzy-search nodes by label, name or id.
    Search {
        #[command(flatten)]
        input: InputArgs,
        query: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Tag frequencies and average scores across all nodes.
    Tags {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(Debug, Args)]
struct InputArgs {
    /// Graph payload; `-` reads stdin.
    #[arg(short, long, default_value = "-")]
    input: PathBuf,
}

#[derive(Debug, Args)]
struct OrderArgs {
    /// Order clusters by this aggregated metric, descending.
    #[arg(long, conflicts_with = "by_size")]
    sort_by: Option<String>,
    /// Order clusters by member count, descending.
    #[arg(long)]
    by_size: bool,
}

impl OrderArgs {
    fn order(&self) -> Option<ClusterOrder> {
        match (&self.sort_by, self.by_size) {
            (Some(metric), _) => Some(ClusterOrder::Metric(metric.clone())),
            (None, true) => Some(ClusterOrder::Size),
            (None, false) => None,
        }
    }
}

#[derive(Serialize)]
struct ClusteredGraph {
    nodes: Vec<Node>,
    clusters: Vec<ClusterSummary>,
}

#[derive(Serialize)]
struct SearchHit {
    id: i64,
    score: i64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("creative_maps=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let output = Output {
        path: cli.output,
        pretty: cli.pretty,
    };

    match cli.command {
        Command::Cluster { input, order } => {
            let GraphData { mut nodes, edges } = read_graph(&input.input)?;
            let mut clusters = cluster(&mut nodes, &edges);
            if let Some(order) = order.order() {
                sort_clusters(&mut nodes, &mut clusters, &order);
            }
            info!(nodes = nodes.len(), clusters = clusters.len(), "clustered graph");
            output.write(&clustered(nodes, &clusters))
        }
        Command::Optimize { input, keep_top } => {
            let GraphData { mut nodes, edges } = read_graph(&input.input)?;
            cluster(&mut nodes, &edges);
            let report = optimize_with_report(&nodes, &edges, keep_top)?;
            log_report(&report, edges.len());
            output.write(&report)
        }
        Command::Layout {
            input,
            strategy,
            width,
            height,
            max_steps,
            seed,
            keep_top,
        } => {
            anyhow::ensure!(
                width > 0.0 && height > 0.0,
                "layout dimensions must be positive, got {width}x{height}"
            );
            let GraphData { mut nodes, mut edges } = read_graph(&input.input)?;
            let clusters = cluster(&mut nodes, &edges);
            if let Some(keep_top) = keep_top {
                let report = optimize_with_report(&nodes, &edges, keep_top)?;
                log_report(&report, edges.len());
                edges = report.edges;
            }

            let mut options = LayoutOptions::default().with_size(width, height);
            options.seed = seed;
            let mut engine = LayoutEngine::new(options);
            engine.initialize(nodes, edges, clusters, strategy);
            let steps = engine.run(max_steps);
            info!(%strategy, steps, energy = ?engine.kinetic_energy(), "layout finished");

            let (nodes, _, clusters) = engine.into_parts();
            output.write(&clustered(nodes, &clusters))
        }
        Command::Search {
            input,
            query,
            limit,
        } => {
            let graph = read_graph(&input.input)?;
            let hits = search_nodes(&graph.nodes, &query)
                .into_iter()
                .take(limit)
                .map(|(id, score)| SearchHit { id, score })
                .collect::<Vec<_>>();
            output.write(&hits)
        }
        Command::Tags { input } => {
            let graph = read_graph(&input.input)?;
            let stats: Vec<TagStats> = tag_stats(&graph.nodes);
            output.write(&stats)
        }
    }
}

fn clustered(nodes: Vec<Node>, clusters: &[ClusterInfo]) -> ClusteredGraph {
    let clusters = clusters.iter().map(|cluster| cluster.summary(&nodes)).collect();
    ClusteredGraph { nodes, clusters }
}

fn log_report(report: &OptimizedEdges, input_edges: usize) {
    info!(
        input_edges,
        kept = report.edges.len(),
        tree = report.tree_edges,
        extra = report.extra_edges,
        dropped = report.dropped_edges,
        "optimized edges"
    );
}

fn read_graph(path: &Path) -> Result<GraphData> {
    let raw = if path == Path::new("-") {
        let mut raw = String::new();
        io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read graph payload from stdin")?;
        raw
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("failed to read graph payload from {}", path.display()))?
    };

    let mut graph = parse_graph_payload(&raw)
        .with_context(|| format!("failed to parse graph payload from {}", path.display()))?;
    backfill_node_ratios(&mut graph.nodes);
    Ok(graph)
}

struct Output {
    path: Option<PathBuf>,
    pretty: bool,
}

impl Output {
    fn write(&self, value: &impl Serialize) -> Result<()> {
        let mut rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
        .context("failed to serialize output")?;
        rendered.push('\n');

        match &self.path {
            Some(path) => fs::write(path, rendered)
                .with_context(|| format!("failed to write output to {}", path.display())),
            None => io::stdout()
                .lock()
                .write_all(rendered.as_bytes())
                .context("failed to write output to stdout"),
        }
    }
}
