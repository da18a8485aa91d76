//! インメモリ実装

mod session_store;

pub use session_store::InMemorySessionStore;
