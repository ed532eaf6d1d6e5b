//! K-means clustering of mixed categorical/numeric records with Lloyd's algorithm
//!
//! Records are parsed against a [`schema::FeatureCodec`], normalized to unit length,
//! and clustered by [`lloyd::LloydKmeans`] on top of an [`engine::ExecutionEngine`].

pub mod assign;
pub mod centroids;
pub mod context;
pub mod engine;
pub mod error;
pub mod lloyd;
pub mod point;
pub mod schema;
pub mod types;

pub use context::{ClusteringContext, EmptyClusterPolicy};
pub use engine::{Dataset, ExecutionEngine, RayonEngine, SequentialEngine};
pub use error::{KMeansError, Result};
pub use lloyd::{ClusteringRun, LloydKmeans, LoopState};
pub use point::{AggregateSum, NormalizedPoint};
pub use schema::FeatureCodec;
