//! Join code lifecycle: generation, activation/rotation, deactivation and
//! the `allow_new_joins` recomputation every read path relies on.

use rand::Rng;
use serde_json::json;

use crate::domain::{
    JoinCode, Session, SessionError, SessionId, Timestamp, event_names,
    value_object::{JOIN_CODE_ALPHABET, JOIN_CODE_PREFIX_LEN, JOIN_CODE_SUFFIX_LEN},
};

use super::{SessionOrchestrator, table::SessionTable};

/// Source of candidate join codes.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> JoinCode;
}

/// Uniformly random codes over the join code alphabet.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> JoinCode {
        let mut rng = rand::thread_rng();
        let compact: Vec<u8> = (0..JOIN_CODE_PREFIX_LEN + JOIN_CODE_SUFFIX_LEN)
            .map(|_| JOIN_CODE_ALPHABET[rng.gen_range(0..JOIN_CODE_ALPHABET.len())])
            .collect();
        JoinCode::from_compact(&compact)
    }
}

impl SessionTable {
    /// Draw a code that is not live in the index and differs from `previous`.
    ///
    /// Gives up after `max_attempts` collisions instead of looping forever.
    pub fn generate_unique_code(
        &self,
        generator: &dyn CodeGenerator,
        max_attempts: usize,
        previous: Option<&JoinCode>,
    ) -> Result<JoinCode, SessionError> {
        for _ in 0..max_attempts {
            let candidate = generator.generate();
            if !self.code_index.contains_key(&candidate) && previous != Some(&candidate) {
                return Ok(candidate);
            }
        }
        tracing::error!(
            attempts = max_attempts,
            live_codes = self.code_index.len(),
            "Join code generation exhausted"
        );
        Err(SessionError::CodeGenerationExhausted {
            attempts: max_attempts,
        })
    }

    /// Open the session for joins.
    ///
    /// A still-valid code is re-published as is (healing a drifted index)
    /// unless `force_rotate`; otherwise a fresh code replaces the old one with
    /// a full TTL from `now`. Returns whether a new code was minted.
    pub fn activate(
        &mut self,
        session_id: &SessionId,
        now: Timestamp,
        force_rotate: bool,
        generator: &dyn CodeGenerator,
        max_attempts: usize,
    ) -> Result<bool, SessionError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(SessionError::session_not_found)?;

        let reusable = session.code.as_ref().filter(|code| {
            !force_rotate
                && !session.code_expired(now)
                && self
                    .code_index
                    .get(*code)
                    .is_none_or(|owner| owner == session_id)
        });
        if let Some(code) = reusable.cloned() {
            self.code_index.insert(code, session_id.clone());
            self.refresh_allow_new_joins(session_id, now);
            return Ok(false);
        }

        let previous = session.code.clone();
        let ttl = session.config.code_ttl();
        let code = self.generate_unique_code(generator, max_attempts, previous.as_ref())?;

        self.deactivate(session_id, true);
        if let Some(session) = self.sessions.get_mut(session_id) {
            session.code = Some(code.clone());
            session.code_expires_at = Some(now.plus(ttl));
        }
        self.code_index.insert(code, session_id.clone());
        self.refresh_allow_new_joins(session_id, now);
        Ok(true)
    }

    /// Close the session for joins. `clear_code` also forgets the stored code
    /// (revoke) rather than just pausing it.
    pub fn deactivate(&mut self, session_id: &SessionId, clear_code: bool) {
        let Some(session) = self.sessions.get_mut(session_id) else {
            return;
        };
        if let Some(code) = &session.code
            && self.code_index.get(code) == Some(session_id)
        {
            self.code_index.remove(code);
        }
        session.allow_new_joins = false;
        if clear_code {
            session.code = None;
        }
    }

    /// Derive `allow_new_joins` from first principles: a code exists, the
    /// session is not ended, the code has not expired and the index still
    /// points back here. Index entries of expired codes or ended sessions are
    /// dropped on the way.
    pub fn refresh_allow_new_joins(&mut self, session_id: &SessionId, now: Timestamp) -> bool {
        let Some(session) = self.sessions.get_mut(session_id) else {
            return false;
        };
        let indexed = session
            .code
            .as_ref()
            .is_some_and(|code| self.code_index.get(code) == Some(session_id));
        let stale = session.is_ended() || session.code_expired(now);

        if indexed
            && stale
            && let Some(code) = &session.code
        {
            self.code_index.remove(code);
        }

        session.allow_new_joins = indexed && !stale;
        session.allow_new_joins
    }
}

impl SessionOrchestrator {
    /// Rotate the join code; the previous code stops resolving immediately.
    pub async fn regenerate_code(&self, session_id: &SessionId) -> Result<Session, SessionError> {
        let approval_timeout = self.settings.approval_timeout;
        let max_attempts = self.settings.max_code_generation_attempts;
        let generator = self.codes.clone();
        self.mutate(move |table, now, effects| {
            let previous = table
                .live_session_mut(session_id, now, approval_timeout)?
                .code
                .clone();
            table.activate(session_id, now, true, generator.as_ref(), max_attempts)?;

            let session = table.session(session_id, now, approval_timeout)?;
            tracing::info!(
                session_id = %session_id,
                code = ?session.code.as_ref().map(JoinCode::as_str),
                "Join code regenerated"
            );
            effects.audit(
                event_names::CODE_REGENERATED,
                &session.host_user_id,
                session,
                json!({ "previousCode": previous, "codeExpiresAt": session.code_expires_at }),
                now,
            );
            Ok(session.clone())
        })
        .await
    }

    /// Deactivate and forget the join code.
    pub async fn revoke_code(&self, session_id: &SessionId) -> Result<Session, SessionError> {
        let approval_timeout = self.settings.approval_timeout;
        self.mutate(move |table, now, effects| {
            let revoked = table
                .live_session_mut(session_id, now, approval_timeout)?
                .code
                .clone();
            table.deactivate(session_id, true);

            let session = table.session(session_id, now, approval_timeout)?;
            tracing::info!(session_id = %session_id, "Join code revoked");
            effects.audit(
                event_names::CODE_REVOKED,
                &session.host_user_id,
                session,
                json!({ "revokedCode": revoked }),
                now,
            );
            Ok(session.clone())
        })
        .await
    }

    /// Open or pause joins without necessarily clearing the stored code.
    pub async fn set_allow_new_joins(
        &self,
        session_id: &SessionId,
        allow: bool,
    ) -> Result<Session, SessionError> {
        let approval_timeout = self.settings.approval_timeout;
        let max_attempts = self.settings.max_code_generation_attempts;
        let generator = self.codes.clone();
        self.mutate(move |table, now, effects| {
            table.live_session_mut(session_id, now, approval_timeout)?;
            if allow {
                table.activate(session_id, now, false, generator.as_ref(), max_attempts)?;
            } else {
                table.deactivate(session_id, false);
            }

            let session = table.session(session_id, now, approval_timeout)?;
            tracing::info!(session_id = %session_id, allow, "Join admission toggled");
            effects.audit(
                event_names::JOINS_CHANGED,
                &session.host_user_id,
                session,
                json!({ "allowNewJoins": session.allow_new_joins }),
                now,
            );
            Ok(session.clone())
        })
        .await
    }
}
