//! Gateway server.

use std::{future::Future, sync::Arc};

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{domain::IceServerProvider, usecase::SessionOrchestrator};

use super::{
    handler::{
        active_session, allow_joins, approve_guest, create_session, end_session, get_session,
        health_check, ice_servers, join_security_metrics, join_session, kick_guest,
        mark_connected, method_not_allowed, pending_guests, regenerate_code, reject_guest,
        revoke_code, route_not_found, set_permission,
    },
    signal::shutdown_signal,
    state::{AppState, GatewayObservers},
};

/// HTTP gateway in front of one [`SessionOrchestrator`].
///
/// The gateway holds no session state of its own; every request goes through
/// the shared orchestrator.
///
/// # Example
///
/// ```ignore
/// let server = Server::new(orchestrator, Arc::new(StaticIceServerProvider::default()));
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    orchestrator: Arc<SessionOrchestrator>,
    ice_servers: Arc<dyn IceServerProvider>,
    observers: GatewayObservers,
}

impl Server {
    pub fn new(
        orchestrator: Arc<SessionOrchestrator>,
        ice_servers: Arc<dyn IceServerProvider>,
    ) -> Self {
        Self {
            orchestrator,
            ice_servers,
            observers: GatewayObservers::default(),
        }
    }

    /// Install the session change / deletion callbacks.
    pub fn with_observers(mut self, observers: GatewayObservers) -> Self {
        self.observers = observers;
        self
    }

    /// Build the router with every route of the gateway.
    pub fn router(&self) -> Router {
        let app_state = Arc::new(AppState {
            orchestrator: self.orchestrator.clone(),
            ice_servers: self.ice_servers.clone(),
            observers: self.observers.clone(),
        });

        Router::new()
            .route("/healthz", get(health_check))
            .route("/api/session/create", post(create_session))
            .route("/api/session/join", post(join_session))
            .route("/api/session/approve", post(approve_guest))
            .route("/api/session/reject", post(reject_guest))
            .route("/api/session/connected", post(mark_connected))
            .route("/api/session/end", post(end_session))
            .route("/api/session/get", get(get_session))
            .route("/api/session/active", get(active_session))
            .route("/api/session/pending", get(pending_guests))
            .route("/api/session/permission", post(set_permission))
            .route("/api/session/kick", post(kick_guest))
            .route("/api/session/code/regenerate", post(regenerate_code))
            .route("/api/session/code/revoke", post(revoke_code))
            .route("/api/session/allow-joins", post(allow_joins))
            .route(
                "/api/session/metrics/join-security",
                get(join_security_metrics),
            )
            .route("/api/session/ice", get(ice_servers))
            .method_not_allowed_fallback(method_not_allowed)
            .fallback(route_not_found)
            .layer(TraceLayer::new_for_http())
            .with_state(app_state)
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
    }

    /// Bind `host:port` and serve until Ctrl+C / SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!(
            "Session gateway listening on http://{}",
            listener.local_addr()?
        );
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}
