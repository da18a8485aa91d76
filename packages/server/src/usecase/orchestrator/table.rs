//! In-memory session table.
//!
//! Holds the sessions plus their secondary indices (normalized join code →
//! session, host user → live session) and the join admission bookkeeping.
//! The orchestrator owns exactly one table behind its lock; nothing here is
//! async or touches I/O. Guest expiries found while refreshing and store
//! writes queued by operations wait on the table until the orchestrator
//! drains them.

use std::{collections::HashMap, time::Duration};

use crate::domain::{JoinCode, Session, SessionError, SessionId, Timestamp};

use super::admission::JoinAdmission;

/// A pending snapshot store write, in lock order.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreWrite {
    Save(Session),
    Delete(SessionId),
}

/// Pending guests that expired during one refresh, with the session as it
/// stood right after.
#[derive(Debug, Clone)]
pub struct Expiration {
    pub session: Session,
    pub guest_ids: Vec<String>,
}

#[derive(Debug)]
pub struct SessionTable {
    pub(crate) sessions: HashMap<SessionId, Session>,
    pub(crate) code_index: HashMap<JoinCode, SessionId>,
    pub(crate) host_index: HashMap<String, SessionId>,
    pub(crate) admission: JoinAdmission,
    pub(crate) expirations: Vec<Expiration>,
    pub(crate) outbox: Vec<StoreWrite>,
}

impl SessionTable {
    pub fn new(admission: JoinAdmission) -> Self {
        Self {
            sessions: HashMap::new(),
            code_index: HashMap::new(),
            host_index: HashMap::new(),
            admission,
            expirations: Vec::new(),
            outbox: Vec::new(),
        }
    }

    /// Insert a session and index it under its host (when not ended) and code.
    ///
    /// The code is indexed only if no other session already owns it.
    pub fn insert(&mut self, session: Session) {
        let id = session.id.clone();
        if !session.is_ended() {
            self.host_index
                .insert(session.host_user_id.clone(), id.clone());
        }
        if let Some(code) = session.code.clone()
            && session.allow_new_joins
        {
            self.code_index.entry(code).or_insert_with(|| id.clone());
        }
        self.sessions.insert(id, session);
    }

    /// Remove a session and every index entry pointing at it.
    pub fn remove(&mut self, session_id: &SessionId) -> Option<Session> {
        let session = self.sessions.remove(session_id)?;
        self.code_index.retain(|_, id| id != session_id);
        self.host_index.retain(|_, id| id != session_id);
        self.admission.rate_limiter.forget_session(session_id);
        Some(session)
    }

    /// The host's live session, healing the host index if it went stale.
    pub fn live_session_for_host(&mut self, host_user_id: &str) -> Option<SessionId> {
        let session_id = self.host_index.get(host_user_id)?.clone();
        let live = self
            .sessions
            .get(&session_id)
            .is_some_and(|session| !session.is_ended());
        if live {
            Some(session_id)
        } else {
            self.host_index.remove(host_user_id);
            None
        }
    }

    /// Recompute time-dependent state of one session as of `now`: expire stale
    /// pending guests and re-derive `allow_new_joins`.
    ///
    /// Returns the guests that flipped to expired. They are also recorded in
    /// `expirations` so whoever holds the lock can report and persist them.
    pub fn refresh(
        &mut self,
        session_id: &SessionId,
        now: Timestamp,
        approval_timeout: Duration,
    ) -> Vec<String> {
        let expired = match self.sessions.get_mut(session_id) {
            Some(session) => session.expire_pending_guests(now, approval_timeout),
            None => return Vec::new(),
        };
        self.refresh_allow_new_joins(session_id, now);
        if !expired.is_empty()
            && let Some(session) = self.sessions.get(session_id)
        {
            self.expirations.push(Expiration {
                session: session.clone(),
                guest_ids: expired.clone(),
            });
        }
        expired
    }

    pub fn take_expirations(&mut self) -> Vec<Expiration> {
        std::mem::take(&mut self.expirations)
    }

    pub fn take_outbox(&mut self) -> Vec<StoreWrite> {
        std::mem::take(&mut self.outbox)
    }

    /// Refresh and borrow a session for reading.
    pub fn session(
        &mut self,
        session_id: &SessionId,
        now: Timestamp,
        approval_timeout: Duration,
    ) -> Result<&Session, SessionError> {
        self.refresh(session_id, now, approval_timeout);
        self.sessions
            .get(session_id)
            .ok_or_else(SessionError::session_not_found)
    }

    /// Refresh and borrow a session that is not ended for mutation.
    pub fn live_session_mut(
        &mut self,
        session_id: &SessionId,
        now: Timestamp,
        approval_timeout: Duration,
    ) -> Result<&mut Session, SessionError> {
        self.refresh(session_id, now, approval_timeout);
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(SessionError::session_not_found)?;
        if session.is_ended() {
            return Err(SessionError::session_ended());
        }
        Ok(session)
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.keys().cloned().collect()
    }

    /// Drop index entries that point at sessions which no longer exist.
    pub fn prune_orphaned_indices(&mut self) -> usize {
        let before = self.code_index.len() + self.host_index.len();
        let sessions = &self.sessions;
        self.code_index.retain(|_, id| sessions.contains_key(id));
        self.host_index.retain(|_, id| sessions.contains_key(id));
        before - (self.code_index.len() + self.host_index.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
