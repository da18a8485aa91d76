//! Static ICE server configuration.
//!
//! The WebRTC layer consumes these entries verbatim; the orchestrator never
//! interprets them.

use crate::domain::{IceServerConfig, IceServerProvider};

/// Public STUN server used when nothing is configured.
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// Serves a fixed list of ICE servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticIceServerProvider {
    servers: Vec<IceServerConfig>,
}

impl StaticIceServerProvider {
    pub fn new(servers: Vec<IceServerConfig>) -> Self {
        Self { servers }
    }

    /// Parse a JSON array of `{urls, username?, credential?}` objects.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json).map(Self::new)
    }
}

impl Default for StaticIceServerProvider {
    fn default() -> Self {
        Self::new(vec![IceServerConfig {
            urls: vec![DEFAULT_STUN_SERVER.to_string()],
            username: None,
            credential: None,
        }])
    }
}

impl IceServerProvider for StaticIceServerProvider {
    fn ice_servers(&self) -> Vec<IceServerConfig> {
        self.servers.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_public_stun() {
        // テスト項目: 設定がなければ公開 STUN サーバーを返す
        // when (操作):
        let servers = StaticIceServerProvider::default().ice_servers();

        // then (期待する結果):
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].urls, vec![DEFAULT_STUN_SERVER.to_string()]);
        assert_eq!(servers[0].username, None);
    }

    #[test]
    fn test_from_json_keeps_credentials() {
        // テスト項目: TURN の認証情報を含む JSON をそのまま読み込む
        // given (前提条件):
        let json = r#"[
            {"urls": ["stun:stun.example.org"]},
            {"urls": ["turn:turn.example.org"], "username": "u", "credential": "secret"}
        ]"#;

        // when (操作):
        let provider = StaticIceServerProvider::from_json(json).unwrap();

        // then (期待する結果):
        let servers = provider.ice_servers();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[1].credential.as_deref(), Some("secret"));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        // テスト項目: 不正な JSON はエラー
        assert!(StaticIceServerProvider::from_json("{not json").is_err());
    }
}
