//! Typed HTTP client for the session gateway.

use reqwest::{Response, StatusCode, header::RETRY_AFTER};
use serde::{Serialize, de::DeserializeOwned};

use cohost_server::infrastructure::dto::http::{
    AllowJoinsRequest, CreateSessionRequest, ErrorResponse, GuestActionRequest, GuestRequestDto,
    IceServerDto, JoinRequest, JoinResultDto, JoinSecurityMetricsDto, OkResponse,
    PermissionRequest, SessionDto, SessionRequest,
};

use crate::error::ClientError;

pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8080";

/// Client for one gateway. Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http_client(base_url, reqwest::Client::new())
    }

    pub fn with_http_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<bool, ClientError> {
        let ok: OkResponse = self.get("/healthz", &[]).await?;
        Ok(ok.ok)
    }

    pub async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<SessionDto, ClientError> {
        self.post("/api/session/create", request).await
    }

    pub async fn join(&self, request: &JoinRequest) -> Result<JoinResultDto, ClientError> {
        self.post("/api/session/join", request).await
    }

    pub async fn approve(&self, session_id: &str, guest_user_id: &str) -> Result<(), ClientError> {
        self.guest_action("/api/session/approve", session_id, guest_user_id)
            .await
    }

    pub async fn reject(&self, session_id: &str, guest_user_id: &str) -> Result<(), ClientError> {
        self.guest_action("/api/session/reject", session_id, guest_user_id)
            .await
    }

    pub async fn mark_connected(
        &self,
        session_id: &str,
        guest_user_id: &str,
    ) -> Result<(), ClientError> {
        self.guest_action("/api/session/connected", session_id, guest_user_id)
            .await
    }

    pub async fn kick(&self, session_id: &str, guest_user_id: &str) -> Result<(), ClientError> {
        self.guest_action("/api/session/kick", session_id, guest_user_id)
            .await
    }

    pub async fn set_permission(
        &self,
        session_id: &str,
        guest_user_id: &str,
        permission: &str,
    ) -> Result<(), ClientError> {
        let request = PermissionRequest {
            session_id: session_id.to_string(),
            guest_user_id: guest_user_id.to_string(),
            permission: permission.to_string(),
        };
        let _: OkResponse = self.post("/api/session/permission", &request).await?;
        Ok(())
    }

    pub async fn end_session(&self, session_id: &str) -> Result<(), ClientError> {
        let _: OkResponse = self
            .post("/api/session/end", &session_request(session_id))
            .await?;
        Ok(())
    }

    pub async fn get_session(&self, session_id: &str) -> Result<SessionDto, ClientError> {
        self.get("/api/session/get", &[("sessionID", session_id)])
            .await
    }

    pub async fn active_session(&self, host_user_id: &str) -> Result<SessionDto, ClientError> {
        self.get("/api/session/active", &[("userID", host_user_id)])
            .await
    }

    pub async fn pending_guests(
        &self,
        session_id: &str,
    ) -> Result<Vec<GuestRequestDto>, ClientError> {
        self.get("/api/session/pending", &[("sessionID", session_id)])
            .await
    }

    pub async fn regenerate_code(&self, session_id: &str) -> Result<SessionDto, ClientError> {
        self.post("/api/session/code/regenerate", &session_request(session_id))
            .await
    }

    pub async fn revoke_code(&self, session_id: &str) -> Result<SessionDto, ClientError> {
        self.post("/api/session/code/revoke", &session_request(session_id))
            .await
    }

    pub async fn set_allow_new_joins(
        &self,
        session_id: &str,
        allow: bool,
    ) -> Result<SessionDto, ClientError> {
        let request = AllowJoinsRequest {
            session_id: session_id.to_string(),
            allow,
        };
        self.post("/api/session/allow-joins", &request).await
    }

    pub async fn join_security_metrics(&self) -> Result<JoinSecurityMetricsDto, ClientError> {
        self.get("/api/session/metrics/join-security", &[]).await
    }

    pub async fn ice_servers(&self) -> Result<Vec<IceServerDto>, ClientError> {
        self.get("/api/session/ice", &[]).await
    }

    async fn guest_action(
        &self,
        path: &str,
        session_id: &str,
        guest_user_id: &str,
    ) -> Result<(), ClientError> {
        let request = GuestActionRequest {
            session_id: session_id.to_string(),
            guest_user_id: guest_user_id.to_string(),
        };
        let _: OkResponse = self.post(path, &request).await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "GET");
        let response = self.http.get(url).query(query).send().await?;
        decode(response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "POST");
        let response = self.http.post(url).json(body).send().await?;
        decode(response).await
    }
}

fn session_request(session_id: &str) -> SessionRequest {
    SessionRequest {
        session_id: session_id.to_string(),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()));
    }

    let header_retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    let (message, body_retry_after) = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(err) => (err.error, err.retry_after),
        Err(_) => (fallback_message(status, body), None),
    };

    Err(ClientError::Api {
        status: status.as_u16(),
        message,
        retry_after: body_retry_after.or(header_retry_after),
    })
}

fn fallback_message(status: StatusCode, body: String) -> String {
    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string()
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        // テスト項目: 末尾のスラッシュは取り除かれる
        // given (前提条件):
        let url = "http://127.0.0.1:8080/";

        // when (操作):
        let client = GatewayClient::new(url);

        // then (期待する結果):
        assert_eq!(client.base_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_fallback_message_uses_reason_phrase() {
        // テスト項目: 空のボディでもステータスの説明がメッセージになる
        // given (前提条件):
        let status = StatusCode::BAD_GATEWAY;

        // when (操作):
        let message = fallback_message(status, "  ".to_string());

        // then (期待する結果):
        assert_eq!(message, "Bad Gateway");
        assert_eq!(fallback_message(status, "upstream down".to_string()), "upstream down");
    }
}
