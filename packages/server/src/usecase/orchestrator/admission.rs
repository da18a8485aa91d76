//! Join admission control.
//!
//! Two independent counters guard the join surface:
//!
//! - [`JoinRateLimiter`]: fixed window per (session, guest). Stops one known
//!   guest from hammering one session.
//! - [`InvalidAttemptTracker`]: rolling window per normalized guest identity.
//!   Invalid attempts (bad format, unknown code, orphaned session) count
//!   toward a lock; while locked every attempt is refused, valid code or not.
//!   Keyed by identity rather than session, so rotating target codes does not
//!   reset the budget.
//!
//! Both are plain data structures evaluated against the caller's `now`; the
//! sweeper calls `collect_garbage` to bound their size.

use std::{collections::HashMap, time::Duration};

use serde::Serialize;

use crate::domain::{SessionId, Timestamp, value_object::duration_millis};

/// Why a join attempt counted as invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidAttemptReason {
    InvalidFormat,
    UnknownCode,
    OrphanedSession,
}

impl InvalidAttemptReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidAttemptReason::InvalidFormat => "invalid_format",
            InvalidAttemptReason::UnknownCode => "unknown_code",
            InvalidAttemptReason::OrphanedSession => "orphaned_session",
        }
    }
}

/// Per (session, guest) sliding-window counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinRateLimitState {
    pub window_start: Timestamp,
    pub attempts: u32,
}

/// Per identity invalid-attempt counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidJoinAttemptState {
    pub window_start: Timestamp,
    pub attempts: u32,
    pub locked_until: Option<Timestamp>,
}

#[derive(Debug)]
pub struct JoinRateLimiter {
    window: Duration,
    max_attempts: u32,
    entries: HashMap<(SessionId, String), JoinRateLimitState>,
}

impl JoinRateLimiter {
    pub fn new(window: Duration, max_attempts: u32) -> Self {
        Self {
            window,
            max_attempts,
            entries: HashMap::new(),
        }
    }

    /// Count one attempt. Returns the remaining wait in milliseconds when the
    /// window's budget is already spent; a refused attempt is not counted.
    pub fn check(&mut self, session_id: &SessionId, identity: &str, now: Timestamp) -> Result<(), i64> {
        let window = duration_millis(self.window);
        let state = self
            .entries
            .entry((session_id.clone(), identity.to_string()))
            .or_insert(JoinRateLimitState {
                window_start: now,
                attempts: 0,
            });

        if now.millis_since(state.window_start) > window {
            state.window_start = now;
            state.attempts = 0;
        }

        if state.attempts >= self.max_attempts {
            let remaining = state.window_start.plus(self.window).value() - now.value();
            return Err(remaining);
        }

        state.attempts += 1;
        Ok(())
    }

    /// Drop entries whose window fully elapsed.
    pub fn collect_garbage(&mut self, now: Timestamp) -> usize {
        let window = duration_millis(self.window);
        let before = self.entries.len();
        self.entries
            .retain(|_, state| now.millis_since(state.window_start) <= window);
        before - self.entries.len()
    }

    /// Forget every counter for a session (it was deleted).
    pub fn forget_session(&mut self, session_id: &SessionId) {
        self.entries.retain(|(id, _), _| id != session_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What recording an invalid attempt did to the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Still under the threshold; carries the count inside the window
    Counted(u32),
    /// The threshold was reached and the identity is now locked
    Locked { until: Timestamp },
}

#[derive(Debug)]
pub struct InvalidAttemptTracker {
    window: Duration,
    threshold: u32,
    lock_duration: Duration,
    entries: HashMap<String, InvalidJoinAttemptState>,
}

impl InvalidAttemptTracker {
    pub fn new(window: Duration, threshold: u32, lock_duration: Duration) -> Self {
        Self {
            window,
            threshold,
            lock_duration,
            entries: HashMap::new(),
        }
    }

    /// Remaining lock in milliseconds, if the identity is locked at `now`.
    pub fn locked_for(&self, identity: &str, now: Timestamp) -> Option<i64> {
        self.entries
            .get(identity)
            .and_then(|state| state.locked_until)
            .filter(|until| *until > now)
            .map(|until| until.value() - now.value())
    }

    pub fn record_invalid(&mut self, identity: &str, now: Timestamp) -> AttemptOutcome {
        let window = duration_millis(self.window);
        let state = self
            .entries
            .entry(identity.to_string())
            .or_insert(InvalidJoinAttemptState {
                window_start: now,
                attempts: 0,
                locked_until: None,
            });

        if state.locked_until.is_some_and(|until| until <= now) {
            state.locked_until = None;
            state.window_start = now;
            state.attempts = 0;
        }
        if now.millis_since(state.window_start) > window {
            state.window_start = now;
            state.attempts = 0;
        }

        state.attempts += 1;
        if state.attempts >= self.threshold {
            let until = now.plus(self.lock_duration);
            state.locked_until = Some(until);
            state.window_start = now;
            state.attempts = 0;
            return AttemptOutcome::Locked { until };
        }
        AttemptOutcome::Counted(state.attempts)
    }

    pub fn active_locks(&self, now: Timestamp) -> usize {
        self.entries
            .values()
            .filter(|state| state.locked_until.is_some_and(|until| until > now))
            .count()
    }

    /// Drop identities that are unlocked and whose window fully elapsed.
    pub fn collect_garbage(&mut self, now: Timestamp) -> usize {
        let window = duration_millis(self.window);
        let before = self.entries.len();
        self.entries.retain(|_, state| {
            let locked = state.locked_until.is_some_and(|until| until > now);
            locked || now.millis_since(state.window_start) <= window
        });
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Aggregated join security counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSecurityMetrics {
    pub invalid_attempts_total: u64,
    pub invalid_format_attempts: u64,
    pub unknown_code_attempts: u64,
    pub orphaned_session_attempts: u64,
    pub blocked_attempts: u64,
    pub rate_limited_attempts: u64,
    pub lockouts_total: u64,
    pub active_locks: usize,
    pub last_invalid_attempt_at: Option<Timestamp>,
    pub last_blocked_at: Option<Timestamp>,
    pub last_lockout_at: Option<Timestamp>,
}

impl JoinSecurityMetrics {
    pub fn record_invalid(&mut self, reason: InvalidAttemptReason, now: Timestamp) {
        self.invalid_attempts_total += 1;
        match reason {
            InvalidAttemptReason::InvalidFormat => self.invalid_format_attempts += 1,
            InvalidAttemptReason::UnknownCode => self.unknown_code_attempts += 1,
            InvalidAttemptReason::OrphanedSession => self.orphaned_session_attempts += 1,
        }
        self.last_invalid_attempt_at = Some(now);
    }

    pub fn record_blocked(&mut self, now: Timestamp) {
        self.blocked_attempts += 1;
        self.last_blocked_at = Some(now);
    }

    pub fn record_rate_limited(&mut self, now: Timestamp) {
        self.rate_limited_attempts += 1;
        self.last_blocked_at = Some(now);
    }

    pub fn record_lockout(&mut self, now: Timestamp) {
        self.lockouts_total += 1;
        self.last_lockout_at = Some(now);
    }
}

/// Everything the join path needs for abuse resistance, kept in the session table.
#[derive(Debug)]
pub struct JoinAdmission {
    pub rate_limiter: JoinRateLimiter,
    pub attempts: InvalidAttemptTracker,
    pub metrics: JoinSecurityMetrics,
}

impl JoinAdmission {
    pub fn new(
        rate_limit_window: Duration,
        rate_limit_max_attempts: u32,
        invalid_attempt_window: Duration,
        invalid_attempt_threshold: u32,
        lockout_duration: Duration,
    ) -> Self {
        Self {
            rate_limiter: JoinRateLimiter::new(rate_limit_window, rate_limit_max_attempts),
            attempts: InvalidAttemptTracker::new(
                invalid_attempt_window,
                invalid_attempt_threshold,
                lockout_duration,
            ),
            metrics: JoinSecurityMetrics::default(),
        }
    }

    /// Metrics with `active_locks` evaluated at `now`.
    pub fn metrics_snapshot(&self, now: Timestamp) -> JoinSecurityMetrics {
        JoinSecurityMetrics {
            active_locks: self.attempts.active_locks(now),
            ..self.metrics.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: i64 = 1_000;

    fn session_id() -> SessionId {
        SessionId::new("s-1".to_string()).unwrap()
    }

    fn create_test_limiter() -> JoinRateLimiter {
        JoinRateLimiter::new(Duration::from_secs(30), 5)
    }

    fn create_test_tracker() -> InvalidAttemptTracker {
        InvalidAttemptTracker::new(Duration::from_secs(120), 5, Duration::from_secs(120))
    }

    #[test]
    fn test_rate_limiter_allows_up_to_max_attempts() {
        // テスト項目: ウィンドウ内で上限回数までは許可される
        // given (前提条件):
        let mut limiter = create_test_limiter();
        let now = Timestamp::new(0);

        // when (操作):
        let results: Vec<_> = (0..5)
            .map(|_| limiter.check(&session_id(), "alice", now))
            .collect();

        // then (期待する結果):
        assert!(results.iter().all(|r| r.is_ok()));
    }

    #[test]
    fn test_rate_limiter_rejects_with_remaining_wait() {
        // テスト項目: 上限超過時は残り待ち時間付きで拒否される
        // given (前提条件):
        let mut limiter = create_test_limiter();
        for _ in 0..5 {
            limiter.check(&session_id(), "alice", Timestamp::new(0)).unwrap();
        }

        // when (操作):
        let result = limiter.check(&session_id(), "alice", Timestamp::new(10 * SECOND));

        // then (期待する結果):
        assert_eq!(result, Err(20 * SECOND));
    }

    #[test]
    fn test_rate_limiter_resets_after_window() {
        // テスト項目: ウィンドウ経過後はカウントがリセットされる
        // given (前提条件):
        let mut limiter = create_test_limiter();
        for _ in 0..5 {
            limiter.check(&session_id(), "alice", Timestamp::new(0)).unwrap();
        }

        // when (操作):
        let result = limiter.check(&session_id(), "alice", Timestamp::new(31 * SECOND));

        // then (期待する結果):
        assert!(result.is_ok());
    }

    #[test]
    fn test_rate_limiter_is_scoped_per_session_and_guest() {
        // テスト項目: 別ゲスト・別セッションのカウントは独立している
        // given (前提条件):
        let mut limiter = create_test_limiter();
        for _ in 0..5 {
            limiter.check(&session_id(), "alice", Timestamp::new(0)).unwrap();
        }
        let other_session = SessionId::new("s-2".to_string()).unwrap();

        // when (操作):
        let bob = limiter.check(&session_id(), "bob", Timestamp::new(0));
        let alice_elsewhere = limiter.check(&other_session, "alice", Timestamp::new(0));

        // then (期待する結果):
        assert!(bob.is_ok());
        assert!(alice_elsewhere.is_ok());
    }

    #[test]
    fn test_rate_limiter_garbage_collection() {
        // テスト項目: 期限切れのエントリが GC で削除される
        // given (前提条件):
        let mut limiter = create_test_limiter();
        limiter.check(&session_id(), "alice", Timestamp::new(0)).unwrap();
        limiter.check(&session_id(), "bob", Timestamp::new(20 * SECOND)).unwrap();

        // when (操作):
        let removed = limiter.collect_garbage(Timestamp::new(40 * SECOND));

        // then (期待する結果):
        assert_eq!(removed, 1);
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn test_tracker_locks_at_threshold() {
        // テスト項目: 閾値に達するとロックされ、残りロック時間が返る
        // given (前提条件):
        let mut tracker = create_test_tracker();
        for i in 1..5 {
            assert_eq!(
                tracker.record_invalid("mallory", Timestamp::new(0)),
                AttemptOutcome::Counted(i)
            );
        }

        // when (操作):
        let outcome = tracker.record_invalid("mallory", Timestamp::new(SECOND));

        // then (期待する結果):
        assert_eq!(
            outcome,
            AttemptOutcome::Locked {
                until: Timestamp::new(121 * SECOND)
            }
        );
        assert_eq!(
            tracker.locked_for("mallory", Timestamp::new(SECOND)),
            Some(120 * SECOND)
        );
        assert_eq!(tracker.active_locks(Timestamp::new(SECOND)), 1);
        assert_eq!(tracker.locked_for("alice", Timestamp::new(SECOND)), None);
    }

    #[test]
    fn test_tracker_lock_expires() {
        // テスト項目: ロック期間経過後は解除される
        // given (前提条件):
        let mut tracker = create_test_tracker();
        for _ in 0..5 {
            tracker.record_invalid("mallory", Timestamp::new(0));
        }

        // when (操作):
        let after = Timestamp::new(120 * SECOND);

        // then (期待する結果):
        assert_eq!(tracker.locked_for("mallory", after), None);
        assert_eq!(tracker.active_locks(after), 0);
        assert_eq!(
            tracker.record_invalid("mallory", after),
            AttemptOutcome::Counted(1)
        );
    }

    #[test]
    fn test_tracker_window_rolls_over() {
        // テスト項目: ウィンドウを過ぎた無効試行はカウントされない
        // given (前提条件):
        let mut tracker = create_test_tracker();
        for _ in 0..4 {
            tracker.record_invalid("mallory", Timestamp::new(0));
        }

        // when (操作):
        let outcome = tracker.record_invalid("mallory", Timestamp::new(121 * SECOND));

        // then (期待する結果):
        assert_eq!(outcome, AttemptOutcome::Counted(1));
    }

    #[test]
    fn test_tracker_garbage_collection_keeps_active_locks() {
        // テスト項目: GC はロック中のエントリを残す
        // given (前提条件):
        let mut tracker = create_test_tracker();
        tracker.record_invalid("stale", Timestamp::new(0));
        for _ in 0..5 {
            tracker.record_invalid("locked", Timestamp::new(100 * SECOND));
        }

        // when (操作):
        let removed = tracker.collect_garbage(Timestamp::new(150 * SECOND));

        // then (期待する結果):
        assert_eq!(removed, 1);
        assert!(tracker.locked_for("locked", Timestamp::new(150 * SECOND)).is_some());
    }

    #[test]
    fn test_metrics_by_reason() {
        // テスト項目: 理由ごとにメトリクスが集計される
        // given (前提条件):
        let mut metrics = JoinSecurityMetrics::default();

        // when (操作):
        metrics.record_invalid(InvalidAttemptReason::InvalidFormat, Timestamp::new(1));
        metrics.record_invalid(InvalidAttemptReason::UnknownCode, Timestamp::new(2));
        metrics.record_invalid(InvalidAttemptReason::OrphanedSession, Timestamp::new(3));
        metrics.record_blocked(Timestamp::new(4));
        metrics.record_lockout(Timestamp::new(5));

        // then (期待する結果):
        assert_eq!(metrics.invalid_attempts_total, 3);
        assert_eq!(metrics.invalid_format_attempts, 1);
        assert_eq!(metrics.unknown_code_attempts, 1);
        assert_eq!(metrics.orphaned_session_attempts, 1);
        assert_eq!(metrics.blocked_attempts, 1);
        assert_eq!(metrics.lockouts_total, 1);
        assert_eq!(metrics.last_invalid_attempt_at, Some(Timestamp::new(3)));
    }
}
