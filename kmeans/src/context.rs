use crate::centroids::DEFAULT_PRECISION;

/// What to do when a centroid ends an assignment pass with no points
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmptyClusterPolicy {
    /// Abort the run with `EmptyCluster`
    #[default]
    Fail,
    /// Leave the centroid where it is for this iteration
    KeepPosition,
}

/// Parameters of one clustering run
#[derive(Clone, Debug, PartialEq)]
pub struct ClusteringContext {
    pub k: usize,
    pub seed: u64,
    pub precision: u32,
    pub empty_cluster: EmptyClusterPolicy,
    pub max_iterations: Option<usize>,
}

impl ClusteringContext {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            seed: 0,
            precision: DEFAULT_PRECISION,
            empty_cluster: EmptyClusterPolicy::Fail,
            max_iterations: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_empty_cluster_policy(mut self, policy: EmptyClusterPolicy) -> Self {
        self.empty_cluster = policy;
        self
    }

    /// Stop after `max_iterations` passes even if centroids still move
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }
}
