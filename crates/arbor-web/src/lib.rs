pub mod auth;
pub mod extract;
pub mod routes;
pub mod server;
pub mod services;

mod error;

pub use arbor_config::ArborConfig;
pub use error::{Result, WebError};
pub use server::{build_router, start_server};
pub use services::{AppState, TreeService};
