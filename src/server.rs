use crate::config::Config;
use crate::error::Result;
use crate::handlers::{admit, health_check, metrics, usage, AppState, SharedState};
use crate::middleware::{admission_middleware, logging_middleware};
use crate::sweeper::spawn_sweeper;
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Routes of the gate itself.
pub fn create_app(state: SharedState) -> Router {
    Router::new()
        .route("/api/admit", post(admit))
        .route("/api/usage", get(usage))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(logging_middleware)),
        )
}

/// Put every route of `downstream` behind the admission check.
pub fn gate(downstream: Router, state: SharedState) -> Router {
    downstream.layer(middleware::from_fn_with_state(state, admission_middleware))
}

pub struct Server {
    app: Router,
    state: SharedState,
    bind_addr: SocketAddr,
    config: Config,
}

impl Server {
    pub fn new(config: Config) -> Result<Self> {
        let state: SharedState = Arc::new(AppState::from_config(&config)?);
        let app = create_app(state.clone());

        Ok(Self {
            app,
            state,
            bind_addr: config.bind_addr,
            config,
        })
    }

    pub async fn run(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;

        let limits = self.state.limits;
        tracing::info!("textgate listening on {}", self.bind_addr);
        tracing::info!(
            max_requests = limits.max_requests,
            window_secs = limits.window.as_secs(),
            daily_limit = limits.daily_limit,
            min_interval_ms = limits.min_interval.as_millis() as u64,
            "Admission limits"
        );
        if !self.config.trust_proxy_headers {
            tracing::info!("Proxy headers ignored; client keys come from the socket peer");
        }

        let sweeper = self.config.sweep_interval().map(|interval| {
            spawn_sweeper(
                self.state.admission.clone(),
                self.state.clock.clone(),
                interval,
            )
        });

        axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        if let Some(sweeper) = sweeper {
            sweeper.shutdown().await;
        }

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
