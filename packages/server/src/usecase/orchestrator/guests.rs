//! Guest lifecycle and the join protocol.
//!
//! ```text
//! RequestJoin:
//!   lockout → code format → code index → session → allowNewJoins
//!   → anonymous policy → rate limit → existing row → capacity → pending row
//! ```
//!
//! Invalid attempts (bad format, unknown code, orphaned session) feed the
//! identity lockout; a locked identity is refused before the code is even
//! looked at.

use serde_json::json;

use crate::domain::{
    GuestInfo, GuestStatus, JoinCode, JoinResult, Permission, SessionError, SessionGuest,
    SessionId, SessionStatus, Timestamp, event_names,
    value_object::{guest_row_key, is_anonymous_identity, normalize_identity, retry_after_secs},
};

use super::{
    Effects, SessionOrchestrator,
    admission::{AttemptOutcome, InvalidAttemptReason},
    table::SessionTable,
};

const CODE_NOT_FOUND: &str = "session not found for code";

/// Count an invalid attempt against `identity` and hand back `error`.
fn reject_invalid_attempt(
    table: &mut SessionTable,
    identity: &str,
    reason: InvalidAttemptReason,
    now: Timestamp,
    effects: &mut Effects,
    error: SessionError,
) -> SessionError {
    table.admission.metrics.record_invalid(reason, now);
    let outcome = table.admission.attempts.record_invalid(identity, now);
    tracing::warn!(
        guest = %identity,
        reason = reason.as_str(),
        outcome = ?outcome,
        "Invalid join attempt"
    );
    effects.notify(
        event_names::JOIN_INVALID_ATTEMPT,
        json!({ "guestId": identity, "reason": reason.as_str(), "timestamp": now }),
    );

    if let AttemptOutcome::Locked { until } = outcome {
        let retry_after = retry_after_secs(until.value() - now.value());
        table.admission.metrics.record_lockout(now);
        table.admission.metrics.record_blocked(now);
        tracing::warn!(guest = %identity, retry_after, "Join attempts locked");
        effects.notify(
            event_names::JOIN_BLOCKED,
            json!({
                "guestId": identity,
                "reason": "lockout",
                "retryAfter": retry_after,
                "lockedUntil": until,
                "timestamp": now,
            }),
        );
    }
    error
}

impl SessionOrchestrator {
    /// Ask to join the session behind `code`.
    ///
    /// Guest ids are matched case-insensitively. Re-requesting while a row is
    /// pending, approved or connected returns the current result without
    /// creating a duplicate; an expired row is replaced by a fresh pending
    /// one; a rejected guest is refused for good.
    pub async fn request_join(
        &self,
        code: &str,
        guest_user_id: &str,
        guest_info: GuestInfo,
    ) -> Result<JoinResult, SessionError> {
        let approval_timeout = self.settings.approval_timeout;
        self.mutate(move |table, now, effects| {
            let identity = normalize_identity(guest_user_id);

            if let Some(remaining) = table.admission.attempts.locked_for(&identity, now) {
                let retry_after = retry_after_secs(remaining);
                table.admission.metrics.record_blocked(now);
                tracing::warn!(guest = %identity, retry_after, "Join attempt refused: identity locked");
                effects.notify(
                    event_names::JOIN_BLOCKED,
                    json!({
                        "guestId": identity,
                        "reason": "lockout",
                        "retryAfter": retry_after,
                        "timestamp": now,
                    }),
                );
                return Err(SessionError::LockedOut {
                    retry_after_secs: retry_after,
                });
            }

            let code = match JoinCode::parse(code) {
                Ok(code) => code,
                Err(e) => {
                    return Err(reject_invalid_attempt(
                        table,
                        &identity,
                        InvalidAttemptReason::InvalidFormat,
                        now,
                        effects,
                        e.into(),
                    ));
                }
            };

            let Some(session_id) = table.code_index.get(&code).cloned() else {
                return Err(reject_invalid_attempt(
                    table,
                    &identity,
                    InvalidAttemptReason::UnknownCode,
                    now,
                    effects,
                    SessionError::NotFound(CODE_NOT_FOUND.to_string()),
                ));
            };

            if !table.sessions.contains_key(&session_id) {
                table.code_index.remove(&code);
                return Err(reject_invalid_attempt(
                    table,
                    &identity,
                    InvalidAttemptReason::OrphanedSession,
                    now,
                    effects,
                    SessionError::NotFound(CODE_NOT_FOUND.to_string()),
                ));
            }

            let (joinable, allow_anonymous) = {
                let session = table.session(&session_id, now, approval_timeout)?;
                (
                    !session.is_ended() && session.allow_new_joins,
                    session.config.allow_anonymous,
                )
            };
            if !joinable {
                return Err(reject_invalid_attempt(
                    table,
                    &identity,
                    InvalidAttemptReason::UnknownCode,
                    now,
                    effects,
                    SessionError::NotFound(CODE_NOT_FOUND.to_string()),
                ));
            }

            if is_anonymous_identity(guest_user_id) && !allow_anonymous {
                return Err(SessionError::Validation(
                    "anonymous guests are not allowed in this session".to_string(),
                ));
            }

            if let Err(remaining) = table.admission.rate_limiter.check(&session_id, &identity, now) {
                let retry_after = retry_after_secs(remaining);
                table.admission.metrics.record_rate_limited(now);
                tracing::warn!(
                    session_id = %session_id,
                    guest = %identity,
                    retry_after,
                    "Join attempt rate limited"
                );
                effects.notify(
                    event_names::JOIN_BLOCKED,
                    json!({
                        "sessionId": session_id,
                        "guestId": identity,
                        "reason": "rate_limited",
                        "retryAfter": retry_after,
                        "timestamp": now,
                    }),
                );
                return Err(SessionError::RateLimited {
                    retry_after_secs: retry_after,
                });
            }

            let guest_key = match guest_row_key(guest_user_id) {
                key if key.is_empty() => {
                    format!("anon-{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
                }
                key => key,
            };

            let session = table
                .sessions
                .get_mut(&session_id)
                .ok_or_else(SessionError::session_not_found)?;
            match session.guest(&guest_key).map(|g| g.status) {
                Some(GuestStatus::Rejected) => {
                    return Err(SessionError::Conflict(
                        "guest was rejected by the host".to_string(),
                    ));
                }
                Some(GuestStatus::Expired) => {
                    session.remove_guest(&guest_key);
                }
                Some(_) => {
                    let guest = session
                        .guest(&guest_key)
                        .ok_or_else(SessionError::guest_not_found)?;
                    return Ok(JoinResult::for_guest(session, guest, approval_timeout));
                }
                None => {}
            }

            if !session.has_free_seat() {
                return Err(SessionError::Conflict("session is full".to_string()));
            }

            let guest = SessionGuest {
                user_id: guest_key.clone(),
                name: match guest_info.name.trim() {
                    "" => guest_key.clone(),
                    name => name.to_string(),
                },
                avatar_url: guest_info.avatar_url,
                permission: session.config.default_permission,
                joined_at: now,
                status: GuestStatus::Pending,
            };
            let result = JoinResult {
                created: true,
                ..JoinResult::for_guest(session, &guest, approval_timeout)
            };
            session.guests.push(guest);

            tracing::info!(session_id = %session_id, guest = %guest_key, "Guest requested to join");
            effects.audit(
                event_names::GUEST_REQUESTED,
                &guest_key,
                session,
                json!({ "guestId": guest_key, "approvalExpiresAt": result.approval_expires_at }),
                now,
            );
            Ok(result)
        })
        .await
    }

    /// pending → approved. Idempotent once approved or connected.
    ///
    /// Returns whether the guest changed.
    pub async fn approve_guest(
        &self,
        session_id: &SessionId,
        guest_user_id: &str,
    ) -> Result<bool, SessionError> {
        let guest_user_id = guest_row_key(guest_user_id);
        let guest_user_id: &str = &guest_user_id;
        let approval_timeout = self.settings.approval_timeout;
        self.mutate(move |table, now, effects| {
            let session = table.live_session_mut(session_id, now, approval_timeout)?;
            let status = session
                .guest(guest_user_id)
                .map(|g| g.status)
                .ok_or_else(SessionError::guest_not_found)?;
            match status {
                GuestStatus::Approved | GuestStatus::Connected => return Ok(false),
                GuestStatus::Expired => {
                    return Err(SessionError::Conflict(
                        "guest approval window expired".to_string(),
                    ));
                }
                GuestStatus::Rejected => {
                    return Err(SessionError::Conflict("guest was rejected".to_string()));
                }
                GuestStatus::Pending => {}
            }
            if !session.has_free_seat() {
                return Err(SessionError::Conflict("session is full".to_string()));
            }

            if let Some(guest) = session.guest_mut(guest_user_id) {
                guest.status = GuestStatus::Approved;
            }
            tracing::info!(session_id = %session_id, guest = %guest_user_id, "Guest approved");
            let host = session.host_user_id.clone();
            effects.audit(
                event_names::GUEST_APPROVED,
                &host,
                session,
                json!({ "guestId": guest_user_id }),
                now,
            );
            Ok(true)
        })
        .await
    }

    /// Any non-terminal status → rejected. Idempotent once rejected.
    pub async fn reject_guest(
        &self,
        session_id: &SessionId,
        guest_user_id: &str,
    ) -> Result<bool, SessionError> {
        let guest_user_id = guest_row_key(guest_user_id);
        let guest_user_id: &str = &guest_user_id;
        let approval_timeout = self.settings.approval_timeout;
        self.mutate(move |table, now, effects| {
            let session = table.live_session_mut(session_id, now, approval_timeout)?;
            let guest = session
                .guest_mut(guest_user_id)
                .ok_or_else(SessionError::guest_not_found)?;
            match guest.status {
                GuestStatus::Rejected => return Ok(false),
                GuestStatus::Connected => {
                    return Err(SessionError::Conflict(
                        "guest is already connected".to_string(),
                    ));
                }
                GuestStatus::Pending | GuestStatus::Approved | GuestStatus::Expired => {
                    guest.status = GuestStatus::Rejected;
                }
            }

            tracing::info!(session_id = %session_id, guest = %guest_user_id, "Guest rejected");
            let host = session.host_user_id.clone();
            effects.audit(
                event_names::GUEST_REJECTED,
                &host,
                session,
                json!({ "guestId": guest_user_id }),
                now,
            );
            Ok(true)
        })
        .await
    }

    /// approved → connected. The first live connection activates the session
    /// and closes the join code, whatever TTL it had left.
    pub async fn mark_guest_connected(
        &self,
        session_id: &SessionId,
        guest_user_id: &str,
    ) -> Result<bool, SessionError> {
        let guest_user_id = guest_row_key(guest_user_id);
        let guest_user_id: &str = &guest_user_id;
        let approval_timeout = self.settings.approval_timeout;
        self.mutate(move |table, now, effects| {
            let session = table.live_session_mut(session_id, now, approval_timeout)?;
            let guest = session
                .guest_mut(guest_user_id)
                .ok_or_else(SessionError::guest_not_found)?;
            match guest.status {
                GuestStatus::Connected => return Ok(false),
                GuestStatus::Approved => guest.status = GuestStatus::Connected,
                other => {
                    return Err(SessionError::Conflict(format!(
                        "guest is {}, only approved guests can connect",
                        other.as_str()
                    )));
                }
            }

            let first_connection = session.status == SessionStatus::Waiting;
            if first_connection {
                session.status = SessionStatus::Active;
                table.deactivate(session_id, false);
                tracing::info!(session_id = %session_id, "Session active; join code closed");
            }

            let session = table.session(session_id, now, approval_timeout)?;
            tracing::info!(session_id = %session_id, guest = %guest_user_id, "Guest connected");
            effects.audit(
                event_names::GUEST_CONNECTED,
                guest_user_id,
                session,
                json!({ "guestId": guest_user_id, "sessionActivated": first_connection }),
                now,
            );
            Ok(true)
        })
        .await
    }

    /// Remove a guest row outright. A kicked guest may request to join again.
    pub async fn kick_guest(
        &self,
        session_id: &SessionId,
        guest_user_id: &str,
    ) -> Result<bool, SessionError> {
        let guest_user_id = guest_row_key(guest_user_id);
        let guest_user_id: &str = &guest_user_id;
        let approval_timeout = self.settings.approval_timeout;
        self.mutate(move |table, now, effects| {
            let session = table.live_session_mut(session_id, now, approval_timeout)?;
            let removed = session
                .remove_guest(guest_user_id)
                .ok_or_else(SessionError::guest_not_found)?;

            tracing::info!(
                session_id = %session_id,
                guest = %guest_user_id,
                previous_status = removed.status.as_str(),
                "Guest kicked"
            );
            let host = session.host_user_id.clone();
            effects.audit(
                event_names::GUEST_KICKED,
                &host,
                session,
                json!({ "guestId": guest_user_id, "previousStatus": removed.status }),
                now,
            );
            Ok(true)
        })
        .await
    }

    /// Change a guest's permission tier (`read_only` / `read_write`).
    pub async fn set_guest_permission(
        &self,
        session_id: &SessionId,
        guest_user_id: &str,
        permission: &str,
    ) -> Result<bool, SessionError> {
        let permission: Permission = permission.parse()?;
        let guest_user_id = guest_row_key(guest_user_id);
        let guest_user_id: &str = &guest_user_id;
        let approval_timeout = self.settings.approval_timeout;
        self.mutate(move |table, now, effects| {
            let session = table.live_session_mut(session_id, now, approval_timeout)?;
            let guest = session
                .guest_mut(guest_user_id)
                .ok_or_else(SessionError::guest_not_found)?;
            if guest.permission == permission {
                return Ok(false);
            }
            let previous = guest.permission;
            guest.permission = permission;

            tracing::info!(
                session_id = %session_id,
                guest = %guest_user_id,
                permission = %permission,
                "Guest permission changed"
            );
            let host = session.host_user_id.clone();
            effects.audit(
                event_names::PERMISSION_CHANGED,
                &host,
                session,
                json!({ "guestId": guest_user_id, "from": previous, "to": permission }),
                now,
            );
            Ok(true)
        })
        .await
    }
}
