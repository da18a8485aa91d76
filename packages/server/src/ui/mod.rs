//! HTTP gateway for the session orchestrator.

mod error;
mod extract;
mod handler;
mod server;
mod signal;
pub mod state;

pub use error::ApiError;
pub use server::Server;
pub use signal::shutdown_signal;
pub use state::{GatewayObservers, SessionObserver};
