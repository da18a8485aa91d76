//! Conversion logic between DTOs and domain entities.

use cohost_shared::time::timestamp_to_rfc3339;

use crate::{
    domain::{
        GuestInfo, GuestRequest, JoinResult, Session, SessionConfig, SessionGuest, Timestamp,
        ValueObjectError,
    },
    infrastructure::dto::http as dto,
    usecase::orchestrator::JoinSecurityMetrics,
};

fn rfc3339(timestamp: Timestamp) -> String {
    timestamp_to_rfc3339(timestamp.value())
}

// ========================================
// DTO → Domain Entity
// ========================================

impl TryFrom<dto::SessionConfigDto> for SessionConfig {
    type Error = ValueObjectError;

    fn try_from(dto: dto::SessionConfigDto) -> Result<Self, Self::Error> {
        let defaults = SessionConfig::default();
        Ok(Self {
            max_guests: dto.max_guests,
            default_permission: match dto.default_permission.as_deref() {
                None | Some("") => defaults.default_permission,
                Some(permission) => permission.parse()?,
            },
            allow_anonymous: dto.allow_anonymous,
            mode: match dto.mode.as_deref() {
                None | Some("") => defaults.mode,
                Some(mode) => mode.parse()?,
            },
            code_ttl_minutes: dto.code_ttl_minutes,
            workspace_name: dto.workspace_name,
        })
    }
}

impl From<dto::GuestInfoDto> for GuestInfo {
    fn from(dto: dto::GuestInfoDto) -> Self {
        Self {
            name: dto.name,
            avatar_url: dto.avatar_url,
        }
    }
}

// ========================================
// Domain Entity → DTO
// ========================================

impl From<&SessionConfig> for dto::SessionConfigDto {
    fn from(config: &SessionConfig) -> Self {
        Self {
            max_guests: config.max_guests,
            default_permission: Some(config.default_permission.as_str().to_string()),
            allow_anonymous: config.allow_anonymous,
            mode: Some(config.mode.as_str().to_string()),
            code_ttl_minutes: config.code_ttl_minutes,
            workspace_name: config.workspace_name.clone(),
        }
    }
}

impl From<SessionGuest> for dto::SessionGuestDto {
    fn from(guest: SessionGuest) -> Self {
        Self {
            user_id: guest.user_id,
            name: guest.name,
            avatar_url: guest.avatar_url,
            permission: guest.permission,
            joined_at: rfc3339(guest.joined_at),
            status: guest.status,
        }
    }
}

impl From<Session> for dto::SessionDto {
    fn from(session: Session) -> Self {
        Self {
            id: session.id.into_string(),
            code: session.code.map(|code| code.as_str().to_string()),
            allow_new_joins: session.allow_new_joins,
            host_user_id: session.host_user_id,
            host_name: session.host_name,
            host_avatar_url: session.host_avatar_url,
            status: session.status,
            mode: session.mode.as_str().to_string(),
            guests: session.guests.into_iter().map(Into::into).collect(),
            created_at: rfc3339(session.created_at),
            code_expires_at: session.code_expires_at.map(rfc3339),
            ended_at: session.ended_at.map(rfc3339),
            config: session.config,
        }
    }
}

impl From<JoinResult> for dto::JoinResultDto {
    fn from(result: JoinResult) -> Self {
        Self {
            session_id: result.session_id.into_string(),
            code: result.code.map(|code| code.as_str().to_string()),
            host_name: result.host_name,
            status: result.status,
            guest_id: result.guest_id,
            approval_expires_at: result.approval_expires_at.map(rfc3339),
            workspace_name: result.workspace_name,
        }
    }
}

impl From<GuestRequest> for dto::GuestRequestDto {
    fn from(request: GuestRequest) -> Self {
        Self {
            session_id: request.session_id.into_string(),
            guest_user_id: request.guest_user_id,
            name: request.name,
            avatar_url: request.avatar_url,
            permission: request.permission,
            requested_at: rfc3339(request.requested_at),
            expires_at: rfc3339(request.expires_at),
        }
    }
}

impl From<JoinSecurityMetrics> for dto::JoinSecurityMetricsDto {
    fn from(metrics: JoinSecurityMetrics) -> Self {
        Self {
            invalid_attempts_total: metrics.invalid_attempts_total,
            invalid_format_attempts: metrics.invalid_format_attempts,
            unknown_code_attempts: metrics.unknown_code_attempts,
            orphaned_session_attempts: metrics.orphaned_session_attempts,
            blocked_attempts: metrics.blocked_attempts,
            rate_limited_attempts: metrics.rate_limited_attempts,
            lockouts_total: metrics.lockouts_total,
            active_locks: metrics.active_locks,
            last_invalid_attempt_at: metrics.last_invalid_attempt_at.map(rfc3339),
            last_blocked_at: metrics.last_blocked_at.map(rfc3339),
            last_lockout_at: metrics.last_lockout_at.map(rfc3339),
        }
    }
}
