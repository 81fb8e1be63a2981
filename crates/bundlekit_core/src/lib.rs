pub mod asset_graph;
pub mod diagnostic;
pub mod error;
pub mod hash;
pub mod types;
