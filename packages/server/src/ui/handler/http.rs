//! HTTP API endpoint handlers.
//!
//! Each handler decodes its request, makes exactly one orchestrator call, tells
//! the observers when that call changed something and maps the result to a DTO.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use serde_json::{Value, json};

use crate::{
    domain::{IceServerConfig, SessionConfig, SessionId},
    infrastructure::dto::http::{
        AllowJoinsRequest, CreateSessionRequest, GuestActionRequest, GuestRequestDto, JoinRequest,
        JoinResultDto, JoinSecurityMetricsDto, OkResponse, PermissionRequest, SessionDto,
        SessionQuery, SessionRequest, UserQuery,
    },
    ui::{error::ApiError, extract::StrictJson, state::AppState},
    usecase::CreateSessionInput,
};

type ApiResult<T> = Result<Json<T>, ApiError>;

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{field} is required")))
}

/// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(json!({ "ok": true }))
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    StrictJson(req): StrictJson<CreateSessionRequest>,
) -> ApiResult<SessionDto> {
    let config = SessionConfig::try_from(req.config)?;
    let session = state
        .orchestrator
        .create_session(CreateSessionInput {
            host_user_id: req.host_user_id,
            host_name: req.host_name,
            host_avatar_url: req.host_avatar_url,
            config,
        })
        .await?;
    state.observers.session_changed(&session.id);
    Ok(Json(session.into()))
}

pub async fn join_session(
    State(state): State<Arc<AppState>>,
    StrictJson(req): StrictJson<JoinRequest>,
) -> ApiResult<JoinResultDto> {
    let result = state
        .orchestrator
        .request_join(&req.code, &req.guest_user_id, req.guest_info.into())
        .await?;
    if result.created {
        state.observers.session_changed(&result.session_id);
    }
    Ok(Json(result.into()))
}

pub async fn approve_guest(
    State(state): State<Arc<AppState>>,
    StrictJson(req): StrictJson<GuestActionRequest>,
) -> ApiResult<OkResponse> {
    let session_id = SessionId::new(req.session_id)?;
    let changed = state
        .orchestrator
        .approve_guest(&session_id, &req.guest_user_id)
        .await?;
    if changed {
        state.observers.session_changed(&session_id);
    }
    Ok(Json(OkResponse::OK))
}

pub async fn reject_guest(
    State(state): State<Arc<AppState>>,
    StrictJson(req): StrictJson<GuestActionRequest>,
) -> ApiResult<OkResponse> {
    let session_id = SessionId::new(req.session_id)?;
    let changed = state
        .orchestrator
        .reject_guest(&session_id, &req.guest_user_id)
        .await?;
    if changed {
        state.observers.session_changed(&session_id);
    }
    Ok(Json(OkResponse::OK))
}

pub async fn mark_connected(
    State(state): State<Arc<AppState>>,
    StrictJson(req): StrictJson<GuestActionRequest>,
) -> ApiResult<OkResponse> {
    let session_id = SessionId::new(req.session_id)?;
    let changed = state
        .orchestrator
        .mark_guest_connected(&session_id, &req.guest_user_id)
        .await?;
    if changed {
        state.observers.session_changed(&session_id);
    }
    Ok(Json(OkResponse::OK))
}

pub async fn kick_guest(
    State(state): State<Arc<AppState>>,
    StrictJson(req): StrictJson<GuestActionRequest>,
) -> ApiResult<OkResponse> {
    let session_id = SessionId::new(req.session_id)?;
    let changed = state
        .orchestrator
        .kick_guest(&session_id, &req.guest_user_id)
        .await?;
    if changed {
        state.observers.session_changed(&session_id);
    }
    Ok(Json(OkResponse::OK))
}

pub async fn set_permission(
    State(state): State<Arc<AppState>>,
    StrictJson(req): StrictJson<PermissionRequest>,
) -> ApiResult<OkResponse> {
    let session_id = SessionId::new(req.session_id)?;
    let changed = state
        .orchestrator
        .set_guest_permission(&session_id, &req.guest_user_id, &req.permission)
        .await?;
    if changed {
        state.observers.session_changed(&session_id);
    }
    Ok(Json(OkResponse::OK))
}

pub async fn end_session(
    State(state): State<Arc<AppState>>,
    StrictJson(req): StrictJson<SessionRequest>,
) -> ApiResult<OkResponse> {
    let session_id = SessionId::new(req.session_id)?;
    if state.orchestrator.end_session(&session_id).await? {
        state.observers.session_deleted(&session_id);
    }
    Ok(Json(OkResponse::OK))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SessionQuery>, QueryRejection>,
) -> ApiResult<SessionDto> {
    let Query(query) = query?;
    let session_id = SessionId::new(required(query.session_id, "sessionID")?)?;
    let session = state.orchestrator.get_session(&session_id).await?;
    Ok(Json(session.into()))
}

pub async fn active_session(
    State(state): State<Arc<AppState>>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> ApiResult<SessionDto> {
    let Query(query) = query?;
    let user_id = required(query.user_id, "userID")?;
    let session = state.orchestrator.active_session_for_host(&user_id).await?;
    Ok(Json(session.into()))
}

pub async fn pending_guests(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SessionQuery>, QueryRejection>,
) -> ApiResult<Vec<GuestRequestDto>> {
    let Query(query) = query?;
    let session_id = SessionId::new(required(query.session_id, "sessionID")?)?;
    let pending = state.orchestrator.pending_guests(&session_id).await?;
    Ok(Json(pending.into_iter().map(Into::into).collect()))
}

pub async fn regenerate_code(
    State(state): State<Arc<AppState>>,
    StrictJson(req): StrictJson<SessionRequest>,
) -> ApiResult<SessionDto> {
    let session_id = SessionId::new(req.session_id)?;
    let session = state.orchestrator.regenerate_code(&session_id).await?;
    state.observers.session_changed(&session_id);
    Ok(Json(session.into()))
}

pub async fn revoke_code(
    State(state): State<Arc<AppState>>,
    StrictJson(req): StrictJson<SessionRequest>,
) -> ApiResult<SessionDto> {
    let session_id = SessionId::new(req.session_id)?;
    let session = state.orchestrator.revoke_code(&session_id).await?;
    state.observers.session_changed(&session_id);
    Ok(Json(session.into()))
}

pub async fn allow_joins(
    State(state): State<Arc<AppState>>,
    StrictJson(req): StrictJson<AllowJoinsRequest>,
) -> ApiResult<SessionDto> {
    let session_id = SessionId::new(req.session_id)?;
    let session = state
        .orchestrator
        .set_allow_new_joins(&session_id, req.allow)
        .await?;
    state.observers.session_changed(&session_id);
    Ok(Json(session.into()))
}

pub async fn join_security_metrics(
    State(state): State<Arc<AppState>>,
) -> Json<JoinSecurityMetricsDto> {
    Json(state.orchestrator.join_security_metrics().await.into())
}

pub async fn ice_servers(State(state): State<Arc<AppState>>) -> Json<Vec<IceServerConfig>> {
    Json(state.ice_servers.ice_servers())
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

pub async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}
