//! Background sweeper.
//!
//! Every tick takes the same exclusive lock as foreground operations and:
//! expires stale pending guests (reported through the same path as lazy
//! expiry on reads), closes codes whose TTL elapsed, deletes
//! waiting sessions nobody joined before the code expired, deletes ended
//! sessions after the retention window, and garbage-collects admission
//! bookkeeping. Foreground reads never depend on the sweeper having run.

use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::domain::{GuestStatus, Session, SessionStatus, Timestamp};

use super::SessionOrchestrator;

/// Default sweep cadence.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// What one sweep changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_guests: usize,
    pub deactivated_codes: usize,
    pub removed_sessions: usize,
    pub pruned_indices: usize,
    pub collected_rate_limits: usize,
    pub collected_lockouts: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        *self == SweepReport::default()
    }
}

fn should_delete(session: &Session, now: Timestamp, ended_retention: Duration) -> bool {
    match session.status {
        SessionStatus::Ended => session
            .ended_at
            .is_some_and(|ended_at| now >= ended_at.plus(ended_retention)),
        SessionStatus::Waiting => {
            session.code_expired(now)
                && !session
                    .guests
                    .iter()
                    .any(|g| matches!(g.status, GuestStatus::Pending | GuestStatus::Approved))
        }
        SessionStatus::Active => false,
    }
}

impl SessionOrchestrator {
    /// Run one sweep pass now.
    pub async fn sweep(&self) -> SweepReport {
        let approval_timeout = self.settings.approval_timeout;
        let ended_retention = self.settings.ended_session_retention;
        let result = self
            .mutate(move |table, now, effects| {
                let mut report = SweepReport::default();

                for session_id in table.session_ids() {
                    let Some(was_open) = table.sessions.get(&session_id).map(|s| s.allow_new_joins)
                    else {
                        continue;
                    };
                    report.expired_guests += table.refresh(&session_id, now, approval_timeout).len();

                    let Some(session) = table.sessions.get(&session_id) else {
                        continue;
                    };
                    if was_open && !session.allow_new_joins {
                        report.deactivated_codes += 1;
                        tracing::info!(session_id = %session_id, "Join code expired");
                    }

                    if should_delete(session, now, ended_retention) {
                        tracing::info!(
                            session_id = %session_id,
                            status = session.status.as_str(),
                            "Removing stale session"
                        );
                        table.remove(&session_id);
                        effects.delete(session_id, now);
                        report.removed_sessions += 1;
                    }
                }

                report.pruned_indices = table.prune_orphaned_indices();
                report.collected_rate_limits = table.admission.rate_limiter.collect_garbage(now);
                report.collected_lockouts = table.admission.attempts.collect_garbage(now);
                Ok(report)
            })
            .await;
        result.unwrap_or_default()
    }
}

/// Periodic driver of [`SessionOrchestrator::sweep`].
pub struct Sweeper {
    orchestrator: Arc<SessionOrchestrator>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(orchestrator: Arc<SessionOrchestrator>, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval,
        }
    }

    /// Start sweeping on the runtime. Abort the handle to stop.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        tracing::info!(interval_secs = self.interval.as_secs(), "Session sweeper started");

        loop {
            ticker.tick().await;
            let report = self.orchestrator.sweep().await;
            if report.is_empty() {
                tracing::trace!("Sweep found nothing to do");
            } else {
                tracing::debug!(?report, "Sweep completed");
            }
        }
    }
}
