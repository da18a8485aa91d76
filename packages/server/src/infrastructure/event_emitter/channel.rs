//! mpsc チャネルを使った EventEmitter 実装
//!
//! ## 責務
//!
//! - 通知を `UnboundedSender` に流すだけで、呼び出し元をブロックしない
//! - 受信側（イベントバス、WebSocket のブロードキャストなど）は別タスクで処理する
//!
//! 受信側がいなくなっても送信は失敗扱いにせず、ログだけ残します。

use serde_json::Value;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::domain::EventEmitter;

/// One notification as delivered to the channel.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedEvent {
    pub name: String,
    pub payload: Value,
}

/// mpsc チャネルへ通知を流す EventEmitter
///
/// ## 使用例
///
/// ```ignore
/// let (emitter, mut rx) = ChannelEventEmitter::new();
/// tokio::spawn(async move {
///     while let Some(event) = rx.recv().await {
///         bus.publish(event.name, event.payload);
///     }
/// });
/// ```
#[derive(Debug, Clone)]
pub struct ChannelEventEmitter {
    sender: UnboundedSender<EmittedEvent>,
}

impl ChannelEventEmitter {
    /// 新しい emitter と受信側を作成
    pub fn new() -> (Self, UnboundedReceiver<EmittedEvent>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }

    /// 既存の sender を包む
    pub fn from_sender(sender: UnboundedSender<EmittedEvent>) -> Self {
        Self { sender }
    }
}

impl EventEmitter for ChannelEventEmitter {
    fn emit(&self, name: &str, payload: Value) {
        let event = EmittedEvent {
            name: name.to_string(),
            payload,
        };
        if let Err(e) = self.sender.send(event) {
            tracing::warn!(event = %e.0.name, "Event receiver dropped, notification discarded");
        }
    }
}
