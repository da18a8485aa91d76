//! Repository（永続化）の実装

pub mod inmemory;

pub use inmemory::InMemorySessionStore;
