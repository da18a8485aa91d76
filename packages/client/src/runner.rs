//! Join with throttling-aware retries.

use std::time::Duration;

use cohost_server::infrastructure::dto::http::{JoinRequest, JoinResultDto};

use crate::{error::ClientError, gateway::GatewayClient};

pub const MAX_JOIN_ATTEMPTS: u32 = 3;
const MAX_RETRY_WAIT_SECS: u64 = 120;

/// Submit a join request, sleeping through `429` responses as the gateway
/// instructs. Any other error is returned immediately.
pub async fn join_with_retry(
    client: &GatewayClient,
    request: &JoinRequest,
    max_attempts: u32,
) -> Result<JoinResultDto, ClientError> {
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        tracing::info!(
            "Requesting to join as '{}' (attempt {}/{})",
            request.guest_user_id,
            attempt,
            max_attempts
        );

        match client.join(request).await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_throttled() && attempt < max_attempts => {
                let wait = e.retry_after().unwrap_or(1).min(MAX_RETRY_WAIT_SECS);
                tracing::warn!("{}; retrying in {} seconds", e, wait);
                tokio::time::sleep(Duration::from_secs(wait)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
