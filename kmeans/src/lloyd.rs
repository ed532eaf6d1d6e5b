//! Lloyd's algorithm over an execution engine
//!
//! `Initializing -> Iterating -> Converged`. Each iteration assigns every point against
//! one frozen centroid set, then walks the centroids in label order and moves each one to
//! the rounded mean of its cluster. The loop ends when a pass leaves every centroid
//! bit-identical to the previous pass.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::{
    assign::assign,
    centroids::{centroids_converged, update},
    context::{ClusteringContext, EmptyClusterPolicy},
    engine::{Dataset, ExecutionEngine},
    error::{KMeansError, Result},
    point::{AggregateSum, NormalizedPoint},
    schema::FeatureCodec,
};

/// Phase of a clustering run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Initializing,
    /// Pass number, starting at 1
    Iterating(usize),
    /// Centroids stopped moving after this many passes
    Converged(usize),
    /// Iteration cap reached before convergence
    Stopped(usize),
}

/// Result of a finished run
#[derive(Clone, Debug)]
pub struct ClusteringRun {
    /// Every point labeled with its final cluster
    pub points: Dataset<NormalizedPoint>,
    /// Final centroids, in label order
    pub centroids: Vec<NormalizedPoint>,
    /// Points per centroid in the last pass
    pub cluster_sizes: Vec<usize>,
    pub iterations: usize,
    pub converged: bool,
    pub elapsed: Duration,
}

impl ClusteringRun {
    /// Average wall time of one pass
    pub fn average_iteration(&self) -> Duration {
        if self.iterations == 0 {
            return Duration::ZERO;
        }
        self.elapsed / self.iterations as u32
    }
}

pub struct LloydKmeans<'a, E> {
    engine: &'a E,
    codec: &'a FeatureCodec,
    context: ClusteringContext,
}

impl<'a, E> LloydKmeans<'a, E>
where
    E: ExecutionEngine,
{
    pub fn new(engine: &'a E, codec: &'a FeatureCodec, context: ClusteringContext) -> Self {
        Self { engine, codec, context }
    }

    pub fn context(&self) -> &ClusteringContext {
        &self.context
    }

    /// Parse, deduplicate, seed and iterate until convergence
    pub fn fit<I>(&self, records: I) -> Result<ClusteringRun>
    where
        I: IntoIterator<Item = String>,
    {
        let (points, centroids) = self.initialize(records)?;
        self.run(points, centroids)
    }

    /// Load distinct records and draw k of them as the initial centroids
    ///
    /// # Returns
    /// * The parsed dataset (unlabeled) and k centroids labeled 0..k-1 in draw order
    ///
    /// # Errors
    /// * Any parse error of the first offending record
    /// * `NoCentroids` when k is 0 or exceeds the number of distinct records
    pub fn initialize<I>(&self, records: I) -> Result<(Dataset<NormalizedPoint>, Vec<NormalizedPoint>)>
    where
        I: IntoIterator<Item = String>,
    {
        debug!(state = ?LoopState::Initializing, engine = self.engine.name(), "loading records");
        let distinct = self.engine.load_distinct(records)?;
        let codec = self.codec;
        let points = self.engine.cache(self.engine.map(&distinct, |line| NormalizedPoint::parse(line, codec))?);
        let available = self.engine.count(&points)?;
        info!(points = available, k = self.context.k, seed = self.context.seed, "dataset loaded");

        let k = self.context.k;
        let sample = self.engine.sample_distinct(&points, k, self.context.seed)?;
        if k == 0 || sample.len() < k {
            return Err(KMeansError::NoCentroids { requested: k, available });
        }

        let centroids = sample.into_rows().into_iter().enumerate()
            .map(|(label, mut centroid)| {
                centroid.set_label(label);
                centroid
            })
            .collect();
        Ok((points, centroids))
    }

    /// Iterate from the given centroids until they stop moving
    ///
    /// Unlabeled centroids are labeled by their position.
    pub fn run(&self, points: Dataset<NormalizedPoint>, mut centroids: Vec<NormalizedPoint>) -> Result<ClusteringRun> {
        if centroids.is_empty() {
            return Err(KMeansError::NoCentroids { requested: self.context.k, available: points.len() });
        }
        for (position, centroid) in centroids.iter_mut().enumerate() {
            if centroid.label().is_none() {
                centroid.set_label(position);
            }
        }

        let fit_timer = Instant::now();
        let mut points = points;
        let mut cluster_sizes = Vec::new();
        let mut state = LoopState::Iterating(1);

        while let LoopState::Iterating(iteration) = state {
            let iteration_timer = Instant::now();
            let old_centroids = centroids.clone();

            let (assigned, sizes) = self.iterate(&points, &mut centroids)?;
            points = assigned;
            cluster_sizes = sizes;

            info!(iteration, elapsed_ms = iteration_timer.elapsed().as_millis() as u64, "end of iteration");

            state = if centroids_converged(&old_centroids, &centroids) {
                LoopState::Converged(iteration)
            } else if self.context.max_iterations.is_some_and(|max| iteration >= max) {
                warn!(iteration, "iteration cap reached before convergence");
                LoopState::Stopped(iteration)
            } else {
                LoopState::Iterating(iteration + 1)
            };
        }

        let (iterations, converged) = match state {
            LoopState::Converged(n) => (n, true),
            LoopState::Stopped(n) => (n, false),
            LoopState::Initializing | LoopState::Iterating(_) => (0, false),
        };
        let run = ClusteringRun {
            points,
            centroids,
            cluster_sizes,
            iterations,
            converged,
            elapsed: fit_timer.elapsed(),
        };
        info!(
            iterations,
            converged,
            elapsed_ms = run.elapsed.as_millis() as u64,
            average_ms = run.average_iteration().as_millis() as u64,
            "clustering finished"
        );
        Ok(run)
    }

    /// One assign + update pass; returns the relabeled dataset and cluster sizes
    fn iterate(
        &self,
        points: &Dataset<NormalizedPoint>,
        centroids: &mut [NormalizedPoint],
    ) -> Result<(Dataset<NormalizedPoint>, Vec<usize>)> {
        // every point sees the same centroid set
        let assigned = {
            let frozen: &[NormalizedPoint] = &*centroids;
            self.engine.cache(self.engine.map(points, |point| assign(point, frozen))?)
        };
        debug!(rows = assigned.len(), cached = assigned.is_cached(), "assignment materialized");

        let mut sizes = Vec::with_capacity(centroids.len());
        for centroid in centroids.iter_mut() {
            let label = centroid.label();
            let cluster = self.engine.filter(&assigned, |point| point.label() == label)?;
            let cluster_size = self.engine.count(&cluster)?;
            sizes.push(cluster_size);

            if cluster_size == 0 {
                match self.context.empty_cluster {
                    EmptyClusterPolicy::Fail => {
                        return Err(KMeansError::EmptyCluster { label: label.unwrap_or_default() });
                    }
                    EmptyClusterPolicy::KeepPosition => {
                        warn!(centroid = ?label, "empty cluster, centroid left in place");
                        continue;
                    }
                }
            }

            let sums = self.engine.map(&cluster, |point| Ok(AggregateSum::from(point)))?;
            let cluster_sum = self.engine.reduce(&sums, |a, b| a.try_add(&b))?;
            update(centroid, &cluster_sum, cluster_size, self.context.precision)?;
            info!(centroid = ?label, points = cluster_size, "centroid moved");
        }
        info!(sizes = ?sizes, engine = self.engine.name(), "centroids recalculated");
        Ok((assigned, sizes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{engine::{RayonEngine, SequentialEngine}, schema::ColumnSpec};

    fn point(components: Vec<f64>) -> NormalizedPoint {
        NormalizedPoint::new(components, 1.0)
    }

    fn plain(dim: usize) -> FeatureCodec {
        FeatureCodec::new(',', vec![ColumnSpec::continuous(); dim]).unwrap()
    }

    fn four_points() -> Dataset<NormalizedPoint> {
        vec![point(vec![0.0, 0.0]), point(vec![0.0, 1.0]), point(vec![9.0, 9.0]), point(vec![9.0, 10.0])].into()
    }

    fn two_centroids() -> Vec<NormalizedPoint> {
        vec![point(vec![0.0, 0.0]).with_label(Some(0)), point(vec![9.0, 9.0]).with_label(Some(1))]
    }

    fn check_two_clusters<E: ExecutionEngine>(engine: &E) {
        let codec = plain(2);
        let kmeans = LloydKmeans::new(engine, &codec, ClusteringContext::new(2));
        let run = kmeans.run(four_points(), two_centroids()).unwrap();

        assert!(run.converged);
        assert_eq!(run.iterations, 2);
        assert_eq!(run.cluster_sizes, vec![2, 2]);
        assert_eq!(run.centroids[0].components(), &[0.0, 0.5]);
        assert_eq!(run.centroids[1].components(), &[9.0, 9.5]);
        assert_eq!(run.centroids[1].label(), Some(1));
        let labels: Vec<Option<usize>> = run.points.iter().map(|p| p.label()).collect();
        assert_eq!(labels, vec![Some(0), Some(0), Some(1), Some(1)]);
    }

    #[test]
    fn two_clusters_converge_sequential() {
        check_two_clusters(&SequentialEngine);
    }

    #[test]
    fn two_clusters_converge_rayon() {
        check_two_clusters(&RayonEngine::new(3).unwrap());
    }

    #[test]
    fn iteration_cap_stops_the_loop() {
        let codec = plain(2);
        let kmeans = LloydKmeans::new(&SequentialEngine, &codec, ClusteringContext::new(2).with_max_iterations(1));
        let run = kmeans.run(four_points(), two_centroids()).unwrap();
        assert!(!run.converged);
        assert_eq!(run.iterations, 1);
    }

    #[test]
    fn empty_cluster_policies() {
        let codec = plain(2);
        let points: Dataset<NormalizedPoint> = vec![point(vec![0.0, 0.0]), point(vec![0.0, 1.0])].into();
        let centroids = vec![point(vec![0.0, 0.0]).with_label(Some(0)), point(vec![5.0, 5.0]).with_label(Some(1))];

        let failing = LloydKmeans::new(&SequentialEngine, &codec, ClusteringContext::new(2));
        assert_eq!(
            failing.run(points.clone(), centroids.clone()).unwrap_err(),
            KMeansError::EmptyCluster { label: 1 }
        );

        let context = ClusteringContext::new(2).with_empty_cluster_policy(EmptyClusterPolicy::KeepPosition);
        let keeping = LloydKmeans::new(&SequentialEngine, &codec, context);
        let run = keeping.run(points, centroids).unwrap();
        assert!(run.converged);
        assert_eq!(run.cluster_sizes, vec![2, 0]);
        assert_eq!(run.centroids[0].components(), &[0.0, 0.5]);
        assert_eq!(run.centroids[1].components(), &[5.0, 5.0]);
    }

    #[test]
    fn unlabeled_centroids_take_their_position() {
        let codec = plain(2);
        let kmeans = LloydKmeans::new(&SequentialEngine, &codec, ClusteringContext::new(2));
        let centroids = vec![point(vec![0.0, 0.0]), point(vec![9.0, 9.0])];
        let run = kmeans.run(four_points(), centroids).unwrap();
        assert_eq!(run.centroids[1].label(), Some(1));
        assert!(run.converged);
    }

    #[test]
    fn fit_deduplicates_and_labels_everything() {
        let codec = plain(2);
        let lines = ["0,0", "0,0", "0,1", "9,9", "9,10", "9,9"].iter().map(|l| l.to_string());
        let kmeans = LloydKmeans::new(&SequentialEngine, &codec, ClusteringContext::new(2).with_seed(7));
        let run = kmeans.fit(lines).unwrap();
        assert_eq!(run.points.len(), 4);
        assert!(run.converged);
        assert_eq!(run.cluster_sizes.iter().sum::<usize>(), 4);
        assert!(run.points.iter().all(|p| matches!(p.label(), Some(0) | Some(1))));
    }

    #[test]
    fn same_seed_same_initial_centroids() {
        let codec = plain(2);
        let lines: Vec<String> = (0..30).map(|i| format!("{},{}", i, 30 - i)).collect();
        let context = ClusteringContext::new(3).with_seed(1234);
        let (_, first) = LloydKmeans::new(&SequentialEngine, &codec, context.clone()).initialize(lines.clone()).unwrap();
        let rayon = RayonEngine::new(2).unwrap();
        let (_, second) = LloydKmeans::new(&rayon, &codec, context).initialize(lines).unwrap();
        assert_eq!(first, second);
        let labels: Vec<Option<usize>> = first.iter().map(|c| c.label()).collect();
        assert_eq!(labels, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn too_few_points_for_k() {
        let codec = plain(2);
        let lines = ["0,0", "0,1", "0,1"].iter().map(|l| l.to_string());
        let kmeans = LloydKmeans::new(&SequentialEngine, &codec, ClusteringContext::new(3));
        assert_eq!(kmeans.fit(lines).unwrap_err(), KMeansError::NoCentroids { requested: 3, available: 2 });

        let zero = LloydKmeans::new(&SequentialEngine, &codec, ClusteringContext::new(0));
        assert!(matches!(zero.fit(vec!["1,1".to_string()]), Err(KMeansError::NoCentroids { requested: 0, .. })));
    }

    #[test]
    fn unknown_token_aborts_before_clustering() {
        let codec = FeatureCodec::kdd_cup().unwrap();
        let good = "0,tcp,http,SF,181,5450,0,0,0,0,0,1,0,0,0,0,0,0,0,0,0,0,8,8,0.00,0.00,0.00,0.00,1.00,0.00,0.00,9,9,1.00,0.00,0.11,0.00,0.00,0.00,0.00,0.00";
        let bad = good.replacen("tcp", "xtp", 1);
        let kmeans = LloydKmeans::new(&SequentialEngine, &codec, ClusteringContext::new(1));
        let err = kmeans.fit(vec![good.to_string(), bad]).unwrap_err();
        assert_eq!(err, KMeansError::UnknownToken { column: 1, token: "xtp".to_string() });
    }
}
