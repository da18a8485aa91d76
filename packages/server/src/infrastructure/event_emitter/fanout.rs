//! 複数の EventEmitter へ同じ通知を配る実装

use std::sync::Arc;

use serde_json::Value;

use crate::domain::EventEmitter;

/// Forwards each notification to every inner emitter, in order.
#[derive(Clone, Default)]
pub struct FanoutEventEmitter {
    emitters: Vec<Arc<dyn EventEmitter>>,
}

impl FanoutEventEmitter {
    pub fn new(emitters: Vec<Arc<dyn EventEmitter>>) -> Self {
        Self { emitters }
    }

    pub fn with(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.emitters.push(emitter);
        self
    }

    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }
}

impl EventEmitter for FanoutEventEmitter {
    fn emit(&self, name: &str, payload: Value) {
        for emitter in &self.emitters {
            emitter.emit(name, payload.clone());
        }
    }
}
