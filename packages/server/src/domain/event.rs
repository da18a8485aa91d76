//! EventEmitter trait 定義
//!
//! セッションの変化を外部（プロセス内のイベントバス、WebSocket、ログなど）へ
//! 通知するためのインターフェース。具体的な実装は Infrastructure 層が提供します。

use serde::Serialize;
use serde_json::Value;

use super::value_object::{SessionId, Timestamp};

/// Notification names emitted by the orchestrator.
pub mod names {
    pub const SESSION_CREATED: &str = "session:created";
    pub const SESSION_ENDED: &str = "session:ended";
    pub const SESSION_DELETED: &str = "session:deleted";
    pub const GUEST_REQUESTED: &str = "session:guest-requested";
    pub const GUEST_APPROVED: &str = "session:guest-approved";
    pub const GUEST_REJECTED: &str = "session:guest-rejected";
    pub const GUEST_CONNECTED: &str = "session:guest-connected";
    pub const GUEST_KICKED: &str = "session:guest-kicked";
    pub const GUEST_EXPIRED: &str = "session:guest-expired";
    pub const PERMISSION_CHANGED: &str = "session:permission-changed";
    pub const CODE_REGENERATED: &str = "session:code-regenerated";
    pub const CODE_REVOKED: &str = "session:code-revoked";
    pub const JOINS_CHANGED: &str = "session:joins-changed";
    pub const JOIN_INVALID_ATTEMPT: &str = "session:join-invalid-attempt";
    pub const JOIN_BLOCKED: &str = "session:join-blocked";
}

/// Event sink
///
/// `emit` は呼び出し元をブロックしてはならない（ロック解放後に呼ばれるが、
/// 遅い実装は全ての操作を遅くする）。
#[cfg_attr(test, mockall::automock)]
pub trait EventEmitter: Send + Sync {
    fn emit(&self, name: &str, payload: Value);
}

/// Structured audit record carried by every lifecycle notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub action: String,
    pub actor: String,
    pub session_id: SessionId,
    pub details: Value,
    pub timestamp: Timestamp,
}

impl AuditEvent {
    pub fn new(
        action: &str,
        actor: impl Into<String>,
        session_id: SessionId,
        details: Value,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            action: action.to_string(),
            actor: actor.into(),
            session_id,
            details,
            timestamp,
        }
    }
}
