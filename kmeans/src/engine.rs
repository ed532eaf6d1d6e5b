//! Execution engines
//!
//! The clustering loop never iterates over the dataset itself: it issues one
//! collection operation at a time (map, filter, count, reduce, sample) to an
//! [`ExecutionEngine`] and blocks until the result is fully materialized.
//! [`SequentialEngine`] runs everything on the calling thread, [`RayonEngine`]
//! spreads each operation over a dedicated rayon thread pool.

use std::collections::HashSet;

use rand::SeedableRng;
use rand::seq::index;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::error::{KMeansError, Result};

/// Fully materialized collection of rows
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset<T> {
    rows: Vec<T>,
    cached: bool,
}

impl<T> Dataset<T> {
    pub fn new(rows: Vec<T>) -> Self {
        Self { rows, cached: false }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<T> {
        self.rows
    }

    /// Whether the dataset was marked for reuse
    pub fn is_cached(&self) -> bool {
        self.cached
    }
}

impl<T> From<Vec<T>> for Dataset<T> {
    fn from(rows: Vec<T>) -> Self {
        Self::new(rows)
    }
}

impl<T> FromIterator<T> for Dataset<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Collection primitives the clustering loop needs
pub trait ExecutionEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of workers operations are spread over
    fn parallelism(&self) -> usize;

    fn map<T, U, F>(&self, data: &Dataset<T>, f: F) -> Result<Dataset<U>>
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> Result<U> + Sync + Send;

    fn filter<T, P>(&self, data: &Dataset<T>, predicate: P) -> Result<Dataset<T>>
    where
        T: Clone + Send + Sync,
        P: Fn(&T) -> bool + Sync + Send;

    fn count<T: Sync>(&self, data: &Dataset<T>) -> Result<usize>;

    /// Combine all rows with an associative, commutative operation
    ///
    /// # Errors
    /// * `EmptyCollection` if the dataset has no rows
    /// * The first error returned by `op`
    fn reduce<T, F>(&self, data: &Dataset<T>, op: F) -> Result<T>
    where
        T: Clone + Send + Sync,
        F: Fn(T, T) -> Result<T> + Sync + Send;

    /// Collect records, dropping exact duplicates; first occurrence order is kept
    fn load_distinct<I>(&self, records: I) -> Result<Dataset<String>>
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen: HashSet<String> = HashSet::new();
        let rows: Vec<String> = records.into_iter()
            .filter(|record| seen.insert(record.clone()))
            .collect();
        debug!(engine = self.name(), rows = rows.len(), "loaded distinct records");
        Ok(Dataset::new(rows))
    }

    /// Draw up to `n` rows uniformly at random without replacement, in draw order
    ///
    /// Returns fewer than `n` rows when the dataset is smaller than `n`.
    fn sample_distinct<T: Clone>(&self, data: &Dataset<T>, n: usize, seed: u64) -> Result<Dataset<T>> {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let take = n.min(data.len());
        Ok(index::sample(&mut rng, data.len(), take)
            .into_iter()
            .map(|idx| data.rows[idx].clone())
            .collect())
    }

    /// Hint that `data` is read several times in the same iteration
    fn cache<T>(&self, mut data: Dataset<T>) -> Dataset<T> {
        data.cached = true;
        data
    }
}

/// Runs every operation on the calling thread
#[derive(Clone, Copy, Debug, Default)]
pub struct SequentialEngine;

impl ExecutionEngine for SequentialEngine {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn parallelism(&self) -> usize {
        1
    }

    fn map<T, U, F>(&self, data: &Dataset<T>, f: F) -> Result<Dataset<U>>
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> Result<U> + Sync + Send,
    {
        Ok(Dataset::new(data.rows.iter().map(f).collect::<Result<Vec<U>>>()?))
    }

    fn filter<T, P>(&self, data: &Dataset<T>, predicate: P) -> Result<Dataset<T>>
    where
        T: Clone + Send + Sync,
        P: Fn(&T) -> bool + Sync + Send,
    {
        Ok(data.rows.iter().filter(|row| predicate(*row)).cloned().collect())
    }

    fn count<T: Sync>(&self, data: &Dataset<T>) -> Result<usize> {
        Ok(data.rows.len())
    }

    fn reduce<T, F>(&self, data: &Dataset<T>, op: F) -> Result<T>
    where
        T: Clone + Send + Sync,
        F: Fn(T, T) -> Result<T> + Sync + Send,
    {
        let mut rows = data.rows.iter().cloned();
        let first = rows.next().ok_or(KMeansError::EmptyCollection)?;
        rows.try_fold(first, op)
    }
}

/// Data-parallel engine backed by its own rayon thread pool
pub struct RayonEngine {
    pool: ThreadPool,
}

impl RayonEngine {
    /// Create an engine with `threads` workers; 0 lets rayon pick the number of CPUs
    pub fn new(threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("kmeans-worker-{}", idx))
            .build()
            .map_err(|err| KMeansError::Substrate(err.to_string()))?;
        debug!(threads = pool.current_num_threads(), "rayon pool ready");
        Ok(Self { pool })
    }
}

impl ExecutionEngine for RayonEngine {
    fn name(&self) -> &'static str {
        "rayon"
    }

    fn parallelism(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn map<T, U, F>(&self, data: &Dataset<T>, f: F) -> Result<Dataset<U>>
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> Result<U> + Sync + Send,
    {
        let rows = self.pool.install(|| data.rows.par_iter().map(|row| f(row)).collect::<Result<Vec<U>>>())?;
        Ok(Dataset::new(rows))
    }

    fn filter<T, P>(&self, data: &Dataset<T>, predicate: P) -> Result<Dataset<T>>
    where
        T: Clone + Send + Sync,
        P: Fn(&T) -> bool + Sync + Send,
    {
        let rows = self.pool.install(|| data.rows.par_iter().filter(|row| predicate(*row)).cloned().collect::<Vec<T>>());
        Ok(Dataset::new(rows))
    }

    fn count<T: Sync>(&self, data: &Dataset<T>) -> Result<usize> {
        Ok(self.pool.install(|| data.rows.par_iter().count()))
    }

    fn reduce<T, F>(&self, data: &Dataset<T>, op: F) -> Result<T>
    where
        T: Clone + Send + Sync,
        F: Fn(T, T) -> Result<T> + Sync + Send,
    {
        self.pool
            .install(|| data.rows.par_iter().cloned().map(Ok::<T, KMeansError>).try_reduce_with(|a, b| op(a, b)))
            .unwrap_or(Err(KMeansError::EmptyCollection))
    }
}
