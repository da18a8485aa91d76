//! Entities
//!
//! セッション、ゲスト、参加結果などのドメインエンティティ。
//! 時刻に依存する状態（承認待ちの期限切れ）は [`Session::expire_pending_guests`]
//! で「今この時点の状態」に再計算されます。

use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use super::{
    error::ValueObjectError,
    value_object::{JoinCode, SessionId, Timestamp},
};

/// Default cap on admitted guests.
pub const DEFAULT_MAX_GUESTS: usize = 5;

/// Upper bound accepted for `max_guests`.
pub const MAX_GUESTS_LIMIT: usize = 20;

/// Default join code lifetime in minutes.
pub const DEFAULT_CODE_TTL_MINUTES: u32 = 15;

/// Upper bound accepted for the code lifetime (one day).
pub const MAX_CODE_TTL_MINUTES: u32 = 24 * 60;

/// Permission tier granted to a guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    #[default]
    ReadOnly,
    ReadWrite,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ReadOnly => "read_only",
            Permission::ReadWrite => "read_write",
        }
    }
}

impl FromStr for Permission {
    type Err = ValueObjectError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "read_only" => Ok(Permission::ReadOnly),
            "read_write" => Ok(Permission::ReadWrite),
            other => Err(ValueObjectError::InvalidPermission(other.to_string())),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How guests participate once admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaborationMode {
    /// Everyone works in the shared workspace
    #[default]
    Shared,
    /// Guests follow the host's view
    Follow,
}

impl CollaborationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollaborationMode::Shared => "shared",
            CollaborationMode::Follow => "follow",
        }
    }
}

impl FromStr for CollaborationMode {
    type Err = ValueObjectError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "shared" => Ok(CollaborationMode::Shared),
            "follow" => Ok(CollaborationMode::Follow),
            other => Err(ValueObjectError::InvalidMode(other.to_string())),
        }
    }
}

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Waiting,
    Active,
    Ended,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Waiting => "waiting",
            SessionStatus::Active => "active",
            SessionStatus::Ended => "ended",
        }
    }
}

/// Guest status.
///
/// ```text
/// pending ──► approved ──► connected
///    │
///    ├──► rejected
///    └──► expired ──(RequestJoin)──► new pending row
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuestStatus {
    Pending,
    Approved,
    Connected,
    Rejected,
    Expired,
}

impl GuestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuestStatus::Pending => "pending",
            GuestStatus::Approved => "approved",
            GuestStatus::Connected => "connected",
            GuestStatus::Rejected => "rejected",
            GuestStatus::Expired => "expired",
        }
    }

    /// Approved and connected guests occupy a seat.
    pub fn occupies_seat(&self) -> bool {
        matches!(self, GuestStatus::Approved | GuestStatus::Connected)
    }
}

/// Session settings fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub max_guests: usize,
    pub default_permission: Permission,
    pub allow_anonymous: bool,
    pub mode: CollaborationMode,
    #[serde(rename = "codeTTLMinutes")]
    pub code_ttl_minutes: u32,
    pub workspace_name: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_guests: DEFAULT_MAX_GUESTS,
            default_permission: Permission::ReadOnly,
            allow_anonymous: false,
            mode: CollaborationMode::Shared,
            code_ttl_minutes: DEFAULT_CODE_TTL_MINUTES,
            workspace_name: None,
        }
    }
}

impl SessionConfig {
    /// Fill zero values with defaults and clamp into the supported ranges.
    pub fn normalized(mut self) -> Self {
        self.max_guests = match self.max_guests {
            0 => DEFAULT_MAX_GUESTS,
            n => n.min(MAX_GUESTS_LIMIT),
        };
        self.code_ttl_minutes = match self.code_ttl_minutes {
            0 => DEFAULT_CODE_TTL_MINUTES,
            n => n.min(MAX_CODE_TTL_MINUTES),
        };
        self.workspace_name = self
            .workspace_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        self
    }

    pub fn code_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.code_ttl_minutes) * 60)
    }
}

/// Profile a guest presents when asking to join.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestInfo {
    pub name: String,
    pub avatar_url: Option<String>,
}

/// A guest row within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGuest {
    pub user_id: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub permission: Permission,
    pub joined_at: Timestamp,
    pub status: GuestStatus,
}

impl SessionGuest {
    /// 承認待ちの期限
    pub fn approval_expires_at(&self, approval_timeout: Duration) -> Timestamp {
        self.joined_at.plus(approval_timeout)
    }
}

/// One collaboration session owned by a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub code: Option<JoinCode>,
    pub allow_new_joins: bool,
    pub host_user_id: String,
    pub host_name: String,
    pub host_avatar_url: Option<String>,
    pub status: SessionStatus,
    pub mode: CollaborationMode,
    pub guests: Vec<SessionGuest>,
    pub created_at: Timestamp,
    pub code_expires_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub config: SessionConfig,
}

impl Session {
    /// Create a waiting session with no code yet.
    pub fn new(
        id: SessionId,
        host_user_id: String,
        host_name: String,
        host_avatar_url: Option<String>,
        config: SessionConfig,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            code: None,
            allow_new_joins: false,
            host_user_id,
            host_name,
            host_avatar_url,
            status: SessionStatus::Waiting,
            mode: config.mode,
            guests: Vec::new(),
            created_at,
            code_expires_at: None,
            ended_at: None,
            config,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.status == SessionStatus::Ended
    }

    pub fn guest(&self, user_id: &str) -> Option<&SessionGuest> {
        self.guests.iter().find(|g| g.user_id == user_id)
    }

    pub fn guest_mut(&mut self, user_id: &str) -> Option<&mut SessionGuest> {
        self.guests.iter_mut().find(|g| g.user_id == user_id)
    }

    /// Remove a guest row, returning it if present.
    pub fn remove_guest(&mut self, user_id: &str) -> Option<SessionGuest> {
        let index = self.guests.iter().position(|g| g.user_id == user_id)?;
        Some(self.guests.remove(index))
    }

    /// Number of guests holding a seat (approved or connected).
    pub fn occupied_seats(&self) -> usize {
        self.guests
            .iter()
            .filter(|g| g.status.occupies_seat())
            .count()
    }

    pub fn has_free_seat(&self) -> bool {
        self.occupied_seats() < self.config.max_guests
    }

    /// Whether the code's TTL has elapsed as of `now` (no code counts as expired).
    pub fn code_expired(&self, now: Timestamp) -> bool {
        match self.code_expires_at {
            Some(expires_at) => now >= expires_at,
            None => true,
        }
    }

    /// Flip pending guests whose approval window elapsed to `expired`.
    ///
    /// Returns the user ids that changed.
    pub fn expire_pending_guests(&mut self, now: Timestamp, approval_timeout: Duration) -> Vec<String> {
        self.guests
            .iter_mut()
            .filter(|g| {
                g.status == GuestStatus::Pending && now >= g.approval_expires_at(approval_timeout)
            })
            .map(|g| {
                g.status = GuestStatus::Expired;
                g.user_id.clone()
            })
            .collect()
    }

    /// Pending guests as host-facing requests.
    pub fn pending_requests(&self, approval_timeout: Duration) -> Vec<GuestRequest> {
        self.guests
            .iter()
            .filter(|g| g.status == GuestStatus::Pending)
            .map(|g| GuestRequest {
                session_id: self.id.clone(),
                guest_user_id: g.user_id.clone(),
                name: g.name.clone(),
                avatar_url: g.avatar_url.clone(),
                permission: g.permission,
                requested_at: g.joined_at,
                expires_at: g.approval_expires_at(approval_timeout),
            })
            .collect()
    }
}

/// Outcome of a join attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResult {
    pub session_id: SessionId,
    pub code: Option<JoinCode>,
    pub host_name: String,
    pub status: GuestStatus,
    pub guest_id: String,
    pub approval_expires_at: Option<Timestamp>,
    pub workspace_name: Option<String>,
    /// This call created the pending row (false when an existing row was returned).
    #[serde(default)]
    pub created: bool,
}

impl JoinResult {
    pub fn for_guest(session: &Session, guest: &SessionGuest, approval_timeout: Duration) -> Self {
        Self {
            session_id: session.id.clone(),
            code: session.code.clone(),
            host_name: session.host_name.clone(),
            status: guest.status,
            guest_id: guest.user_id.clone(),
            approval_expires_at: (guest.status == GuestStatus::Pending)
                .then(|| guest.approval_expires_at(approval_timeout)),
            workspace_name: session.config.workspace_name.clone(),
            created: false,
        }
    }
}

/// A pending join request awaiting the host's decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestRequest {
    pub session_id: SessionId,
    pub guest_user_id: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub permission: Permission,
    pub requested_at: Timestamp,
    pub expires_at: Timestamp,
}

/// ICE server entry handed to the WebRTC layer verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}
