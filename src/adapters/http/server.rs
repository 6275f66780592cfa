use std::net::SocketAddr;

use anyhow::{Context, anyhow};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::core::service::Service;
use crate::ports::http_server::{HttpServer, ServerRunFuture};
use crate::utils::graceful_shutdown::shutdown_signal;

/// Serves a [`Service`] over HTTP/1.1 and HTTP/2 until a shutdown signal arrives
pub struct StaticServer {
    service: Service,
    addr: SocketAddr,
}

impl StaticServer {
    pub fn new(service: Service, addr: SocketAddr) -> Self {
        Self { service, addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn build_app(&self) -> Router {
        Router::new()
            .fallback_service(self.service.clone())
            .layer(TraceLayer::new_for_http())
    }
}

impl HttpServer for StaticServer {
    fn run<'a>(&'a self) -> ServerRunFuture<'a> {
        Box::pin(async move {
            let app = self.build_app();

            let listener = TcpListener::bind(self.addr)
                .await
                .with_context(|| format!("Failed to bind to address: {}", self.addr))?;
            let local_addr = listener.local_addr().unwrap_or(self.addr);

            tracing::info!(
                addr = %local_addr,
                index = %self.service.index(),
                not_found = ?self.service.not_found(),
                "Static file server listening"
            );

            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(shutdown_signal())
                .await
                .map_err(|e| anyhow!("HTTP Server error: {}", e))?;

            tracing::info!("Static file server stopped");
            Ok(())
        })
    }
}
