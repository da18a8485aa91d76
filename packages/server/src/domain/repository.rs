//! SessionStore trait 定義
//!
//! 永続化のためのインターフェース。オーケストレーターはメモリ上の状態が正であり、
//! ストアは起動時の復元と変更時のスナップショット保存だけを担います。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{RepositoryError, Session, SessionId, Timestamp};

/// Durable snapshot of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session: Session,
    /// The snapshot is not restored after this instant.
    pub persist_until: Timestamp,
}

impl SessionSnapshot {
    /// Whether this snapshot should be brought back at startup.
    pub fn is_restorable(&self, now: Timestamp) -> bool {
        self.persist_until > now && !self.session.is_ended()
    }
}

/// Session Store trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 復元可能なスナップショットを取得（persist_until > now かつ未終了）
    async fn load_restorable(&self, now: Timestamp) -> Result<Vec<SessionSnapshot>, RepositoryError>;

    /// スナップショットを保存（同じ session id は上書き）
    async fn save(&self, snapshot: SessionSnapshot) -> Result<(), RepositoryError>;

    /// スナップショットを削除
    async fn delete(&self, session_id: &SessionId) -> Result<(), RepositoryError>;
}
