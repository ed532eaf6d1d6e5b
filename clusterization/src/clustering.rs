use std::time::Duration;

use kmeans::point::UNASSIGNED;
use kmeans::{ClusteringContext, ExecutionEngine, FeatureCodec, LloydKmeans, NormalizedPoint, RayonEngine, SequentialEngine};
use tracing::info;

/// Rendered result of one clustering run
#[derive(Clone, Debug)]
pub struct ClusteringReport {
    /// One rendered line per distinct record, label last
    pub lines: Vec<String>,
    /// One line per final centroid: normalized components, then the label
    pub centroids: Vec<String>,
    pub cluster_sizes: Vec<usize>,
    pub iterations: usize,
    pub converged: bool,
    pub elapsed: Duration,
}

/// Pick the engine for the requested parallelism and run the clustering
pub fn cluster(
    threads: usize,
    codec: &FeatureCodec,
    context: ClusteringContext,
    records: Vec<String>,
) -> kmeans::Result<ClusteringReport> {
    if threads == 1 {
        cluster_with(&SequentialEngine, codec, context, records)
    } else {
        let engine = RayonEngine::new(threads)?;
        cluster_with(&engine, codec, context, records)
    }
}

fn cluster_with<E: ExecutionEngine>(
    engine: &E,
    codec: &FeatureCodec,
    context: ClusteringContext,
    records: Vec<String>,
) -> kmeans::Result<ClusteringReport> {
    info!(engine = engine.name(), parallelism = engine.parallelism(), "execution engine ready");
    let run = LloydKmeans::new(engine, codec, context).fit(records)?;

    for (label, size) in run.cluster_sizes.iter().enumerate() {
        info!(centroid = label, points = *size, "final cluster");
    }

    let lines = engine.map(&run.points, |point| point.render(codec))?.into_rows();
    let centroids = run.centroids.iter()
        .map(|centroid| centroid_line(centroid, codec.delimiter()))
        .collect();

    Ok(ClusteringReport {
        lines,
        centroids,
        cluster_sizes: run.cluster_sizes,
        iterations: run.iterations,
        converged: run.converged,
        elapsed: run.elapsed,
    })
}

/// Centroid on the normalized scale
///
/// A moved centroid is a mean of unit vectors, so its magnitude is not the scale of any
/// record and it is not decoded through the schema.
fn centroid_line(centroid: &NormalizedPoint, delimiter: char) -> String {
    let mut fields: Vec<String> = centroid.components().iter()
        .map(|component| format!("{}", component))
        .collect();
    fields.push(centroid.label().map_or(UNASSIGNED, |label| label as i64).to_string());
    fields.join(delimiter.to_string().as_str())
}
