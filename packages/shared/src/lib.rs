//! Shared utilities for the Cohost workspace: logging and time.

pub mod logger;
pub mod time;
