//! Gateway client for Cohost.
//!
//! Other processes of the application (terminal bridge, AI assistant, desktop
//! shell) drive the shared collaboration session through this crate instead of
//! holding their own copy of the session state.

pub mod error;
pub mod gateway;
pub mod runner;

pub use error::ClientError;
pub use gateway::GatewayClient;
pub use runner::join_with_retry;
