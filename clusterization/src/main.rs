//! Clusterization of network connection records with Lloyd's k-means
//! Reads one record per line, clusters the distinct records and writes each distinct
//! record back out with its cluster label appended

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::{Parser, ValueEnum};
use kmeans::centroids::{DEFAULT_PRECISION, MAX_PRECISION};
use kmeans::{ClusteringContext, EmptyClusterPolicy, FeatureCodec};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use clustering::cluster;
use loading::{load_records, load_schema};
use output::{run_directory, write_report};

// Module declarations
mod clustering;
mod loading;
mod output;

/// Behaviour for a centroid that ends a pass without points
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EmptyCluster {
    /// Abort the run
    Fail,
    /// Keep the centroid where it is
    Keep,
}

impl From<EmptyCluster> for EmptyClusterPolicy {
    fn from(value: EmptyCluster) -> Self {
        match value {
            EmptyCluster::Fail => EmptyClusterPolicy::Fail,
            EmptyCluster::Keep => EmptyClusterPolicy::KeepPosition,
        }
    }
}

/// Command-line arguments for the clusterization program
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the input records, one delimited record per line
    #[arg(long)]
    pub data: PathBuf,
    /// Number of clusters
    #[arg(long, default_value_t = 2)]
    pub k: usize,
    /// Output directory; every run writes into a timestamped subdirectory
    #[arg(long, default_value = "output")]
    pub outdir: PathBuf,
    /// Worker threads (1: sequential engine, 0: one per CPU)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,
    /// Seed for the initial centroid sample (default: current time in ms)
    #[arg(long)]
    pub seed: Option<u64>,
    /// Decimal digits kept when centroids move
    #[arg(long, default_value_t = DEFAULT_PRECISION,
        value_parser = clap::value_parser!(u32).range(0..=MAX_PRECISION as i64))]
    pub precision: u32,
    /// What to do with a cluster that loses all of its points
    #[arg(long, value_enum, default_value_t = EmptyCluster::Fail)]
    pub empty_cluster: EmptyCluster,
    /// Maximum number of iterations (default: until convergence)
    #[arg(long)]
    pub max_iter: Option<usize>,
    /// JSON schema file (default: KDD Cup 1999 schema)
    #[arg(long)]
    pub schema: Option<PathBuf>,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    fn context(&self, seed: u64) -> ClusteringContext {
        let context = ClusteringContext::new(self.k)
            .with_seed(seed)
            .with_precision(self.precision)
            .with_empty_cluster_policy(self.empty_cluster.into());
        match self.max_iter {
            Some(max) => context.with_max_iterations(max),
            None => context,
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let args: Args = Args::parse();
    init_tracing(args.verbose);

    if let Err(err) = run(args).await {
        error!("{:#}", err);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let codec = match &args.schema {
        Some(path) => load_schema(path).await?,
        None => FeatureCodec::kdd_cup()?,
    };
    let codec = Arc::new(codec);

    // Time-based seed unless one is given, logged so the run can be replayed
    let seed = match args.seed {
        Some(seed) => seed,
        None => Utc::now().timestamp_millis() as u64,
    };
    let context = args.context(seed);
    info!(data = %args.data.display(), k = context.k, seed, threads = args.threads, "starting clusterization");

    let records = load_records(&args.data).await?;

    let threads = args.threads;
    let worker_codec = Arc::clone(&codec);
    let report = tokio::task::spawn_blocking(move || cluster(threads, &worker_codec, context, records))
        .await
        .context("clustering task failed")??;

    info!(
        iterations = report.iterations,
        converged = report.converged,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "performed clustering"
    );

    let dir = run_directory(&args.outdir, Local::now());
    write_report(&dir, &report).await?;
    info!(dir = %dir.display(), "output successfully written");
    Ok(())
}
