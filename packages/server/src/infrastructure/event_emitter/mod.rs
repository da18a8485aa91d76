//! イベント通知（EventEmitter）の実装
//!
//! ## 実装
//!
//! - `logging`: 構造化ログとして出力するシンク
//! - `channel`: プロセス内のイベントバスへ非同期に流すシンク
//! - `fanout`: 複数のシンクへ同じ通知を配るシンク

pub mod channel;
pub mod fanout;
pub mod logging;

pub use channel::{ChannelEventEmitter, EmittedEvent};
pub use fanout::FanoutEventEmitter;
pub use logging::TracingEventEmitter;
