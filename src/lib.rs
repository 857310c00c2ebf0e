//! Clustering, edge reduction and force layout for creative similarity graphs.

pub mod error;
pub mod graph;
pub mod layout;
pub mod metrics;
pub mod util;

pub use error::GraphError;
pub use graph::{ClusterInfo, Edge, GraphData, MetricValue, MetricsObject, Node};
pub use layout::{EngineState, LayoutEngine, LayoutOptions, LayoutStrategy, Tick};
