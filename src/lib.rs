pub mod action;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod output;
pub mod protocols;
pub mod state;
pub mod workspace;

pub use errors::{CompositorError, Result};
pub use state::Oxws;
