//! Gateway state.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use crate::{
    domain::{IceServerProvider, SessionId},
    usecase::SessionOrchestrator,
};

/// Callback invoked with the id of a session after a successful mutation.
pub type SessionObserver = Arc<dyn Fn(&SessionId) + Send + Sync>;

/// Hooks the hosting process uses to fan changes into its own event bus.
///
/// 呼び出しはリクエスト処理の中で同期的に行われるため、重い処理はしないこと。
/// オブザーバーが panic してもリクエストは成功として返します（ログのみ）。
#[derive(Clone, Default)]
pub struct GatewayObservers {
    pub on_session_changed: Option<SessionObserver>,
    pub on_session_deleted: Option<SessionObserver>,
}

impl GatewayObservers {
    pub fn session_changed(&self, session_id: &SessionId) {
        notify(self.on_session_changed.as_ref(), "session_changed", session_id);
    }

    pub fn session_deleted(&self, session_id: &SessionId) {
        notify(self.on_session_deleted.as_ref(), "session_deleted", session_id);
    }
}

fn notify(observer: Option<&SessionObserver>, hook: &'static str, session_id: &SessionId) {
    let Some(observer) = observer else {
        return;
    };
    if catch_unwind(AssertUnwindSafe(|| observer(session_id))).is_err() {
        tracing::error!(session_id = %session_id, hook, "Gateway observer panicked");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_panicking_observer_is_contained() {
        // テスト項目: オブザーバーの panic は呼び出し元に伝播しない
        // given (前提条件):
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let observers = GatewayObservers {
            on_session_changed: Some(Arc::new(move |_: &SessionId| {
                counted.fetch_add(1, Ordering::SeqCst);
                panic!("observer failure");
            })),
            on_session_deleted: None,
        };
        let session_id = SessionId::new("s1".to_string()).unwrap();

        // when (操作):
        observers.session_changed(&session_id);
        observers.session_changed(&session_id);
        observers.session_deleted(&session_id);

        // then (期待する結果):
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

/// Shared application state
pub struct AppState {
    /// オーケストレーター（全ての状態を保持）
    pub orchestrator: Arc<SessionOrchestrator>,
    /// ICE サーバー設定
    pub ice_servers: Arc<dyn IceServerProvider>,
    pub observers: GatewayObservers,
}
