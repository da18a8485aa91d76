//! UseCase: コラボレーションセッションのオーケストレーター
//!
//! セッション表（[`table::SessionTable`]）を 1 つのロックの内側に保持し、
//! 全ての変更操作をそのロックの中で完結させます。
//!
//! ## 構成
//!
//! - `table`: セッション表と二次インデックス（コード → セッション、ホスト → セッション）
//! - `guests`: 参加リクエストとゲストの状態遷移
//! - `admission`: レート制限と ID 単位のロックアウト
//! - `codes`: 参加コードの発行・ローテーション・失効
//! - `sweeper`: 期限切れ状態の定期掃除
//!
//! ## ロックと副作用
//!
//! 操作はロック内で [`Effects`] に通知と保存対象を積みます。通知はロックを
//! 保持したまま送信するため、購読者には状態遷移と同じ順序で届きます。
//! スナップショットの保存・削除はセッション表のアウトボックスに積み、
//! ロック解放後に 1 本の書き込み口（`writer`）から順番にストアへ流します。
//! 読み取り時に見つかった承認期限切れも同じ経路で通知・保存されます。

mod admission;
mod codes;
mod guests;
mod sweeper;
mod table;


use std::{sync::Arc, time::Duration};

use cohost_shared::time::Clock;
use serde_json::{Value, json};
use tokio::sync::{Mutex, RwLock};

use crate::domain::{
    AuditEvent, EventEmitter, GuestRequest, Session, SessionConfig, SessionError, SessionId,
    SessionIdFactory, SessionSnapshot, SessionStatus, SessionStore, Timestamp, event_names,
};

pub use admission::{
    AttemptOutcome, InvalidAttemptReason, InvalidAttemptTracker, JoinAdmission, JoinRateLimiter,
    JoinSecurityMetrics,
};
pub use codes::{CodeGenerator, RandomCodeGenerator};
pub use sweeper::{DEFAULT_SWEEP_INTERVAL, SweepReport, Sweeper};
pub use table::{Expiration, SessionTable, StoreWrite};

/// Approval window a pending guest has before expiring.
pub const DEFAULT_APPROVAL_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Fixed window of the per (session, guest) rate limiter.
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(30);
/// Attempts allowed per rate-limit window.
pub const DEFAULT_RATE_LIMIT_MAX_ATTEMPTS: u32 = 5;
/// Rolling window for counting invalid attempts per identity.
pub const DEFAULT_INVALID_ATTEMPT_WINDOW: Duration = Duration::from_secs(2 * 60);
/// Invalid attempts within the window that trigger a lockout.
pub const DEFAULT_INVALID_ATTEMPT_THRESHOLD: u32 = 5;
/// How long a locked identity is refused.
pub const DEFAULT_LOCKOUT_DURATION: Duration = Duration::from_secs(2 * 60);
/// How long ended sessions stay around before the sweeper deletes them.
pub const DEFAULT_ENDED_SESSION_RETENTION: Duration = Duration::from_secs(60 * 60);
/// How long a saved snapshot stays restorable after its last mutation.
pub const DEFAULT_SNAPSHOT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);
/// Collisions tolerated before code generation gives up.
pub const DEFAULT_MAX_CODE_GENERATION_ATTEMPTS: usize = 10;

/// Orchestrator tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub approval_timeout: Duration,
    pub rate_limit_window: Duration,
    pub rate_limit_max_attempts: u32,
    pub invalid_attempt_window: Duration,
    pub invalid_attempt_threshold: u32,
    pub lockout_duration: Duration,
    pub ended_session_retention: Duration,
    pub snapshot_retention: Duration,
    pub max_code_generation_attempts: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            approval_timeout: DEFAULT_APPROVAL_TIMEOUT,
            rate_limit_window: DEFAULT_RATE_LIMIT_WINDOW,
            rate_limit_max_attempts: DEFAULT_RATE_LIMIT_MAX_ATTEMPTS,
            invalid_attempt_window: DEFAULT_INVALID_ATTEMPT_WINDOW,
            invalid_attempt_threshold: DEFAULT_INVALID_ATTEMPT_THRESHOLD,
            lockout_duration: DEFAULT_LOCKOUT_DURATION,
            ended_session_retention: DEFAULT_ENDED_SESSION_RETENTION,
            snapshot_retention: DEFAULT_SNAPSHOT_RETENTION,
            max_code_generation_attempts: DEFAULT_MAX_CODE_GENERATION_ATTEMPTS,
        }
    }
}

impl From<&OrchestratorSettings> for JoinAdmission {
    fn from(settings: &OrchestratorSettings) -> Self {
        JoinAdmission::new(
            settings.rate_limit_window,
            settings.rate_limit_max_attempts,
            settings.invalid_attempt_window,
            settings.invalid_attempt_threshold,
            settings.lockout_duration,
        )
    }
}

/// Input of [`SessionOrchestrator::create_session`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateSessionInput {
    pub host_user_id: String,
    pub host_name: Option<String>,
    pub host_avatar_url: Option<String>,
    pub config: SessionConfig,
}

fn audit_payload(
    name: &'static str,
    actor: &str,
    session: &Session,
    details: Value,
    now: Timestamp,
) -> Value {
    let audit = AuditEvent::new(name, actor, session.id.clone(), details, now);
    let mut payload = serde_json::to_value(&audit).unwrap_or_default();
    if let Value::Object(map) = &mut payload {
        map.insert(
            "session".to_string(),
            serde_json::to_value(session).unwrap_or_default(),
        );
    }
    payload
}

/// Side effects collected inside the critical section.
///
/// Notifications go out before the lock is released; store writes join the
/// table's outbox in the order they were queued.
#[derive(Debug, Default)]
pub struct Effects {
    events: Vec<(&'static str, Value)>,
    writes: Vec<StoreWrite>,
}

impl Effects {
    /// Queue a lifecycle notification and a snapshot save for `session`.
    pub fn audit(
        &mut self,
        name: &'static str,
        actor: &str,
        session: &Session,
        details: Value,
        now: Timestamp,
    ) {
        self.events
            .push((name, audit_payload(name, actor, session, details, now)));
        self.writes.push(StoreWrite::Save(session.clone()));
    }

    /// Queue a notification that carries no session snapshot.
    pub fn notify(&mut self, name: &'static str, payload: Value) {
        self.events.push((name, payload));
    }

    /// Queue deletion of a session's snapshot.
    pub fn delete(&mut self, session_id: SessionId, now: Timestamp) {
        self.events.push((
            event_names::SESSION_DELETED,
            json!({ "sessionId": session_id, "timestamp": now }),
        ));
        self.writes.push(StoreWrite::Delete(session_id));
    }

    /// One `session:guest-expired` per guest, then one save per session.
    fn expired(&mut self, expirations: Vec<Expiration>, now: Timestamp) {
        for Expiration { session, guest_ids } in expirations {
            for guest_id in guest_ids {
                tracing::info!(session_id = %session.id, guest = %guest_id, "Pending guest expired");
                self.events.push((
                    event_names::GUEST_EXPIRED,
                    audit_payload(
                        event_names::GUEST_EXPIRED,
                        "system",
                        &session,
                        json!({ "guestId": guest_id }),
                        now,
                    ),
                ));
            }
            self.writes.push(StoreWrite::Save(session));
        }
    }

    fn append(&mut self, other: Effects) {
        self.events.extend(other.events);
        self.writes.extend(other.writes);
    }
}

/// Collaborative session orchestrator.
///
/// Owns the in-memory session table behind one lock. Construct once and share
/// it (behind `Arc`) with the gateway and the sweeper.
pub struct SessionOrchestrator {
    table: RwLock<SessionTable>,
    writer: Mutex<()>,
    clock: Arc<dyn Clock>,
    emitter: Arc<dyn EventEmitter>,
    store: Option<Arc<dyn SessionStore>>,
    codes: Arc<dyn CodeGenerator>,
    settings: OrchestratorSettings,
}

impl SessionOrchestrator {
    pub fn new(emitter: Arc<dyn EventEmitter>, clock: Arc<dyn Clock>) -> Self {
        let settings = OrchestratorSettings::default();
        Self {
            table: RwLock::new(SessionTable::new(JoinAdmission::from(&settings))),
            writer: Mutex::new(()),
            clock,
            emitter,
            store: None,
            codes: Arc::new(RandomCodeGenerator),
            settings,
        }
    }

    /// Replace the tunables. Resets admission bookkeeping, so call before use.
    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.table = RwLock::new(SessionTable::new(JoinAdmission::from(&settings)));
        self.settings = settings;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_code_generator(mut self, codes: Arc<dyn CodeGenerator>) -> Self {
        self.codes = codes;
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }

    /// Run `op` under the exclusive lock and emit what it queued before
    /// releasing it, then flush pending store writes.
    ///
    /// Guests the op found expired are reported even when the op fails.
    async fn mutate<T, F>(&self, op: F) -> Result<T, SessionError>
    where
        F: FnOnce(&mut SessionTable, Timestamp, &mut Effects) -> Result<T, SessionError>,
    {
        let (result, queued) = {
            let mut table = self.table.write().await;
            let now = self.now();
            let mut effects = Effects::default();
            let result = op(&mut table, now, &mut effects);
            (result, self.commit(&mut table, effects, now))
        };
        if queued {
            self.flush_writes().await;
        }
        result
    }

    /// Emit queued notifications and move store writes to the outbox.
    /// Must run under the table lock. Returns whether any write was queued.
    fn commit(&self, table: &mut SessionTable, effects: Effects, now: Timestamp) -> bool {
        let mut committed = Effects::default();
        committed.expired(table.take_expirations(), now);
        committed.append(effects);

        for (name, payload) in committed.events {
            self.emitter.emit(name, payload);
        }
        if self.store.is_none() || committed.writes.is_empty() {
            return false;
        }
        table.outbox.extend(committed.writes);
        true
    }

    /// Drain the outbox into the store in queue order.
    ///
    /// Writers take turns, so once this returns every write queued before the
    /// call has reached the store.
    async fn flush_writes(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let _writer = self.writer.lock().await;
        let batch = self.table.write().await.take_outbox();
        if batch.is_empty() {
            return;
        }

        let persist_until = self.now().plus(self.settings.snapshot_retention);
        for write in batch {
            match write {
                StoreWrite::Save(session) => {
                    let session_id = session.id.clone();
                    let snapshot = SessionSnapshot {
                        session,
                        persist_until,
                    };
                    if let Err(e) = store.save(snapshot).await {
                        tracing::warn!(session_id = %session_id, error = %e, "Failed to save session snapshot");
                    }
                }
                StoreWrite::Delete(session_id) => {
                    if let Err(e) = store.delete(&session_id).await {
                        tracing::warn!(session_id = %session_id, error = %e, "Failed to delete session snapshot");
                    }
                }
            }
        }
    }

    /// Bring back restorable sessions from the store. Returns how many were loaded.
    pub async fn restore(&self) -> usize {
        let Some(store) = &self.store else {
            return 0;
        };
        let now = self.now();
        let snapshots = match store.load_restorable(now).await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load session snapshots");
                return 0;
            }
        };

        let mut table = self.table.write().await;
        let now = self.now();
        let mut restored = 0;
        for snapshot in snapshots {
            if !snapshot.is_restorable(now) {
                continue;
            }
            let session = snapshot.session;
            if table.live_session_for_host(&session.host_user_id).is_some() {
                tracing::warn!(
                    session_id = %session.id,
                    host = %session.host_user_id,
                    "Skipping snapshot: host already has a live session"
                );
                continue;
            }
            let session_id = session.id.clone();
            table.insert(session);
            table.refresh(&session_id, now, self.settings.approval_timeout);
            restored += 1;
        }
        let queued = self.commit(&mut table, Effects::default(), now);
        drop(table);
        if queued {
            self.flush_writes().await;
        }

        tracing::info!(restored, "Restored sessions from store");
        restored
    }

    /// Open a new session for a host and mint its first join code.
    pub async fn create_session(&self, input: CreateSessionInput) -> Result<Session, SessionError> {
        let host_user_id = input.host_user_id.trim().to_string();
        if host_user_id.is_empty() {
            return Err(SessionError::Validation("hostUserID is required".to_string()));
        }
        let host_name = input
            .host_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| host_user_id.clone());
        let config = input.config.normalized();
        let approval_timeout = self.settings.approval_timeout;
        let max_attempts = self.settings.max_code_generation_attempts;
        let generator = self.codes.clone();

        self.mutate(move |table, now, effects| {
            if table.live_session_for_host(&host_user_id).is_some() {
                return Err(SessionError::Conflict(
                    "host already has an active session".to_string(),
                ));
            }

            let session_id = SessionIdFactory::generate();
            let code = table.generate_unique_code(generator.as_ref(), max_attempts, None)?;
            let mut session = Session::new(
                session_id.clone(),
                host_user_id.clone(),
                host_name,
                input.host_avatar_url,
                config,
                now,
            );
            session.code_expires_at = Some(now.plus(session.config.code_ttl()));
            session.code = Some(code);
            session.allow_new_joins = true;
            table.insert(session);

            let session = table.session(&session_id, now, approval_timeout)?;
            tracing::info!(
                session_id = %session_id,
                host = %host_user_id,
                max_guests = session.config.max_guests,
                "Session created"
            );
            effects.audit(
                event_names::SESSION_CREATED,
                &host_user_id,
                session,
                json!({ "config": session.config }),
                now,
            );
            Ok(session.clone())
        })
        .await
    }

    /// End a session: clear its code and release the host. Ending twice is a
    /// no-op; returns whether this call ended it.
    pub async fn end_session(&self, session_id: &SessionId) -> Result<bool, SessionError> {
        let approval_timeout = self.settings.approval_timeout;
        self.mutate(move |table, now, effects| {
            if table.session(session_id, now, approval_timeout)?.is_ended() {
                return Ok(false);
            }

            table.deactivate(session_id, true);
            let session = table
                .sessions
                .get_mut(session_id)
                .ok_or_else(SessionError::session_not_found)?;
            session.status = SessionStatus::Ended;
            session.ended_at = Some(now);
            let host = session.host_user_id.clone();
            if table.host_index.get(&host) == Some(session_id) {
                table.host_index.remove(&host);
            }

            let session = table.session(session_id, now, approval_timeout)?;
            tracing::info!(session_id = %session_id, host = %host, "Session ended");
            effects.audit(event_names::SESSION_ENDED, &host, session, json!({}), now);
            Ok(true)
        })
        .await
    }

    /// Current state of a session, recomputed as of now.
    pub async fn get_session(&self, session_id: &SessionId) -> Result<Session, SessionError> {
        let approval_timeout = self.settings.approval_timeout;
        self.mutate(move |table, now, _| {
            table
                .session(session_id, now, approval_timeout)
                .map(Session::clone)
        })
        .await
    }

    /// The host's live (non-ended) session.
    pub async fn active_session_for_host(&self, host_user_id: &str) -> Result<Session, SessionError> {
        let approval_timeout = self.settings.approval_timeout;
        let host_user_id = host_user_id.trim().to_string();
        self.mutate(move |table, now, _| {
            let session_id = table.live_session_for_host(&host_user_id).ok_or_else(|| {
                SessionError::NotFound("no active session for user".to_string())
            })?;
            table
                .session(&session_id, now, approval_timeout)
                .map(Session::clone)
        })
        .await
    }

    /// Guests awaiting the host's decision.
    pub async fn pending_guests(&self, session_id: &SessionId) -> Result<Vec<GuestRequest>, SessionError> {
        let approval_timeout = self.settings.approval_timeout;
        self.mutate(move |table, now, _| {
            table
                .session(session_id, now, approval_timeout)
                .map(|session| session.pending_requests(approval_timeout))
        })
        .await
    }

    /// Snapshot of the join security counters.
    pub async fn join_security_metrics(&self) -> JoinSecurityMetrics {
        let now = self.now();
        let table = self.table.read().await;
        table.admission.metrics_snapshot(now)
    }

    /// Number of sessions currently held in memory.
    pub async fn session_count(&self) -> usize {
        self.table.read().await.len()
    }
}
