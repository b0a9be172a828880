mod state;
mod trees;

pub use state::{default_node_types, AppState};
pub use trees::{NodeContentView, TreeService};
