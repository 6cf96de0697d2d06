pub mod cluster;
pub mod enhance;
pub mod neighborhoods;

pub use cluster::{ClusterMetrics, NeighborhoodCluster, cluster_neighborhoods};
pub use enhance::{
    EnhancedNeighborhood, NeighborhoodEnhancer, RecommendationStrength, ScoreBreakdown,
};
pub use neighborhoods::{SemanticNeighborhood, build_neighborhoods};
