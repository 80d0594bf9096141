//! # HTTP Server
//!
//! Wraps a service router with health, CORS and request tracing, and
//! serves it until ctrl-c.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::config::HttpServerConfig;
use super::health_routes::health_routes;
use super::identity_routes::{identity_routes, IdentityState};
use super::storage_routes::{storage_routes, StorageState};

/// HTTP server for one of the two services
pub struct HttpServer {
    config: HttpServerConfig,
    service: &'static str,
    router: Router,
}

impl HttpServer {
    /// Storage service: `/files`, `/upload`, `/download`, `/delete`
    pub fn storage(config: HttpServerConfig, state: Arc<StorageState>) -> Self {
        Self::build("storage", config, storage_routes(state))
    }

    /// Identity service: `/register`, `/login`, `/users/me`
    pub fn identity(config: HttpServerConfig, state: Arc<IdentityState>) -> Self {
        Self::build("identity", config, identity_routes(state))
    }

    fn build(service: &'static str, config: HttpServerConfig, routes: Router) -> Self {
        let router = Router::new()
            .merge(health_routes(service))
            .merge(routes)
            .layer(Self::cors_layer(&config))
            .layer(TraceLayer::new_for_http());

        Self {
            config,
            service,
            router,
        }
    }

    fn cors_layer(config: &HttpServerConfig) -> CorsLayer {
        if config.cors_origins.is_empty() {
            // No origins configured: permissive for development
            return CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
        }

        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|s| match s.parse() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    warn!(origin = %s, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until ctrl-c
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self.config.socket_addr().parse().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid socket address {}: {}", self.config.socket_addr(), e),
            )
        })?;

        let listener = TcpListener::bind(addr).await?;
        info!(service = self.service, %addr, "listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!(service = self.service, "shut down");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
