//! InMemory SessionStore 実装
//!
//! ドメイン層が定義する SessionStore trait の具体的な実装。
//! HashMap をインメモリ DB として使用します。プロセスを跨いだ永続化はしないため、
//! 主にテストと単一プロセス構成での再起動なし運用向けです。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{RepositoryError, SessionId, SessionSnapshot, SessionStore, Timestamp};

/// インメモリ SessionStore 実装
///
/// セッション ID ごとに最新のスナップショットを 1 つだけ保持します。
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    snapshots: Mutex<HashMap<SessionId, SessionSnapshot>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保持しているスナップショットの数
    pub async fn len(&self) -> usize {
        self.snapshots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshots.lock().await.is_empty()
    }

    pub async fn get(&self, session_id: &SessionId) -> Option<SessionSnapshot> {
        self.snapshots.lock().await.get(session_id).cloned()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load_restorable(&self, now: Timestamp) -> Result<Vec<SessionSnapshot>, RepositoryError> {
        let snapshots = self.snapshots.lock().await;
        let mut restorable: Vec<SessionSnapshot> = snapshots
            .values()
            .filter(|snapshot| snapshot.is_restorable(now))
            .cloned()
            .collect();
        restorable.sort_by_key(|snapshot| snapshot.session.created_at);
        Ok(restorable)
    }

    async fn save(&self, snapshot: SessionSnapshot) -> Result<(), RepositoryError> {
        let mut snapshots = self.snapshots.lock().await;
        tracing::trace!(session_id = %snapshot.session.id, "Saving session snapshot");
        snapshots.insert(snapshot.session.id.clone(), snapshot);
        Ok(())
    }

    async fn delete(&self, session_id: &SessionId) -> Result<(), RepositoryError> {
        let mut snapshots = self.snapshots.lock().await;
        snapshots
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::SessionNotFound(session_id.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::{Session, SessionConfig, SessionStatus};

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn create_test_snapshot(id: &str, created_at: i64, persist_until: i64) -> SessionSnapshot {
        SessionSnapshot {
            session: Session::new(
                SessionId::new(id.to_string()).unwrap(),
                format!("host-{id}"),
                "Host".to_string(),
                None,
                SessionConfig::default(),
                Timestamp::new(created_at),
            ),
            persist_until: Timestamp::new(persist_until),
        }
    }

    #[tokio::test]
    async fn test_save_overwrites_same_session() {
        // テスト項目: 同じセッション ID の保存は上書きになる
        // given (前提条件):
        let store = InMemorySessionStore::new();
        let first = create_test_snapshot("s1", 0, 1_000);
        let mut second = first.clone();
        second.persist_until = Timestamp::new(2_000);

        // when (操作):
        store.save(first).await.unwrap();
        store.save(second.clone()).await.unwrap();

        // then (期待する結果):
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(&second.session.id).await, Some(second));
    }

    #[tokio::test]
    async fn test_load_restorable_filters_expired_and_ended() {
        // テスト項目: 保持期限切れと終了済みのスナップショットは復元対象外
        // given (前提条件):
        let store = InMemorySessionStore::new();
        let now = Timestamp::new(10_000);
        let live = create_test_snapshot("live", 2, now.plus(DAY).value());
        let older = create_test_snapshot("older", 1, now.plus(DAY).value());
        let stale = create_test_snapshot("stale", 0, now.value());
        let mut ended = create_test_snapshot("ended", 0, now.plus(DAY).value());
        ended.session.status = SessionStatus::Ended;
        for snapshot in [live, older, stale, ended] {
            store.save(snapshot).await.unwrap();
        }

        // when (操作):
        let restorable = store.load_restorable(now).await.unwrap();

        // then (期待する結果): 作成順に並ぶ
        let ids: Vec<&str> = restorable.iter().map(|s| s.session.id.as_str()).collect();
        assert_eq!(ids, vec!["older", "live"]);
    }

    #[tokio::test]
    async fn test_delete_missing_session_errors() {
        // テスト項目: 存在しないスナップショットの削除はエラー
        // given (前提条件):
        let store = InMemorySessionStore::new();
        let snapshot = create_test_snapshot("s1", 0, 1_000);
        let id = snapshot.session.id.clone();
        store.save(snapshot).await.unwrap();

        // when (操作):
        let first = store.delete(&id).await;
        let second = store.delete(&id).await;

        // then (期待する結果):
        assert!(first.is_ok());
        assert_eq!(
            second,
            Err(RepositoryError::SessionNotFound("s1".to_string()))
        );
        assert!(store.is_empty().await);
    }
}
