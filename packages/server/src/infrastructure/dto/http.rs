//! HTTP API DTOs.
//!
//! Request bodies reject unknown fields. Identifiers keep the `…ID` spelling
//! of the wire contract (`hostUserID`, `sessionID`, `guestUserID`, `userID`);
//! timestamps are rendered as RFC 3339 strings.

use serde::{Deserialize, Serialize};

use crate::domain::{GuestStatus, IceServerConfig, Permission, SessionConfig, SessionStatus};

// ========================================
// Requests
// ========================================

/// Session settings as sent by callers. Omitted fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SessionConfigDto {
    #[serde(default)]
    pub max_guests: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_permission: Option<String>,
    #[serde(default)]
    pub allow_anonymous: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, rename = "codeTTLMinutes")]
    pub code_ttl_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateSessionRequest {
    #[serde(rename = "hostUserID")]
    pub host_user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_avatar_url: Option<String>,
    #[serde(default)]
    pub config: SessionConfigDto,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GuestInfoDto {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JoinRequest {
    pub code: String,
    #[serde(default, rename = "guestUserID")]
    pub guest_user_id: String,
    #[serde(default)]
    pub guest_info: GuestInfoDto,
}

/// Body of approve / reject / kick / connected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuestActionRequest {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    #[serde(rename = "guestUserID")]
    pub guest_user_id: String,
}

/// Body of end / code regenerate / code revoke.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionRequest {
    #[serde(rename = "sessionID")]
    pub session_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionRequest {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    #[serde(rename = "guestUserID")]
    pub guest_user_id: String,
    pub permission: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllowJoinsRequest {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub allow: bool,
}

/// `?sessionID=` query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionQuery {
    #[serde(default, rename = "sessionID")]
    pub session_id: Option<String>,
}

/// `?userID=` query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserQuery {
    #[serde(default, rename = "userID")]
    pub user_id: Option<String>,
}

// ========================================
// Responses
// ========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGuestDto {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub permission: Permission,
    pub joined_at: String,
    pub status: GuestStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDto {
    pub id: String,
    pub code: Option<String>,
    pub allow_new_joins: bool,
    #[serde(rename = "hostUserID")]
    pub host_user_id: String,
    pub host_name: String,
    pub host_avatar_url: Option<String>,
    pub status: SessionStatus,
    pub mode: String,
    pub guests: Vec<SessionGuestDto>,
    pub created_at: String,
    pub code_expires_at: Option<String>,
    pub ended_at: Option<String>,
    pub config: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResultDto {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub code: Option<String>,
    pub host_name: String,
    pub status: GuestStatus,
    #[serde(rename = "guestID")]
    pub guest_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_expires_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestRequestDto {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    #[serde(rename = "guestUserID")]
    pub guest_user_id: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub permission: Permission,
    pub requested_at: String,
    pub expires_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSecurityMetricsDto {
    pub invalid_attempts_total: u64,
    pub invalid_format_attempts: u64,
    pub unknown_code_attempts: u64,
    pub orphaned_session_attempts: u64,
    pub blocked_attempts: u64,
    pub rate_limited_attempts: u64,
    pub lockouts_total: u64,
    pub active_locks: usize,
    pub last_invalid_attempt_at: Option<String>,
    pub last_blocked_at: Option<String>,
    pub last_lockout_at: Option<String>,
}

/// `{"ok": true}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub const OK: OkResponse = OkResponse { ok: true };
}

/// Error body: `{"error": "...", "retryAfter": n}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// ICE servers are passed through as configured.
pub type IceServerDto = IceServerConfig;
