//! ICE server configuration port.

use super::IceServerConfig;

/// Source of the ICE servers handed to the WebRTC layer.
pub trait IceServerProvider: Send + Sync {
    fn ice_servers(&self) -> Vec<IceServerConfig>;
}
