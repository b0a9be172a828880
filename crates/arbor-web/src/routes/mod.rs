mod health;
mod llm;
mod nodes;
mod sync;
mod trees;

pub use health::health_routes;
pub use llm::llm_routes;
pub use nodes::node_routes;
pub use sync::sync_routes;
pub use trees::tree_routes;
