//! Route handlers.

mod http;

pub use http::*;
