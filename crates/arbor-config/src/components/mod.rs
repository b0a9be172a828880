//! Configuration components, one per server concern.

pub mod auth;
pub mod llm;
pub mod server;
pub mod sync;

pub use auth::*;
pub use llm::*;
pub use server::*;
pub use sync::*;
