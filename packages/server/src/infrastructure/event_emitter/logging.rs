//! ログに出すだけの EventEmitter 実装

use serde_json::Value;

use crate::domain::EventEmitter;

/// Writes every notification as a structured `info` record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventEmitter;

impl EventEmitter for TracingEventEmitter {
    fn emit(&self, name: &str, payload: Value) {
        tracing::info!(target: "cohost_server::events", event = name, %payload, "Session event");
    }
}
