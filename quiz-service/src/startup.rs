//! Application startup and lifecycle management.

use crate::config::QuizConfig;
use crate::handlers::answers::evaluate_answer;
use crate::handlers::health::{health_check, readiness_check};
use crate::handlers::metrics::metrics;
use crate::handlers::questions::generate_question;
use crate::handlers::method_not_allowed;
use crate::services::providers::vertex::{VertexConfig, VertexTextProvider};
use crate::services::providers::TextProvider;
use crate::services::token::{ServiceAccountTokenProvider, TokenProvider};
use crate::services::{AnswerEvaluator, Database, QuestionGenerator, QuizStore};
use axum::http::{header, Method};
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use secrecy::ExposeSecret;
use service_core::config::Config;
use service_core::error::AppError;
use service_core::middleware::{make_request_span, metrics_middleware, request_id_middleware};
use service_core::observability::init_metrics;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn QuizStore>,
    pub generator: QuestionGenerator,
    pub evaluator: AnswerEvaluator,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn QuizStore>,
        text_provider: Arc<dyn TextProvider>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            generator: QuestionGenerator::new(store.clone(), text_provider.clone()),
            evaluator: AnswerEvaluator::new(store.clone(), text_provider),
            store,
            metrics,
        }
    }
}

/// Build the HTTP router with CORS, tracing, request ids and metrics.
pub fn build_router(state: AppState) -> Router {
    // Answers every OPTIONS request, preflight or not, with 200 and an empty body
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route(
            "/generate-question",
            post(generate_question).fallback(method_not_allowed),
        )
        .route(
            "/evaluate-answer",
            post(evaluate_answer).fallback(method_not_allowed),
        )
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        // route_layer so MatchedPath is available for labels
        .route_layer(from_fn(metrics_middleware))
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<axum::body::Body>))
        .layer(from_fn(request_id_middleware))
        .layer(cors)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Connect to PostgreSQL and Vertex AI and bind the listener.
    pub async fn build(config: QuizConfig) -> Result<Self, AppError> {
        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to PostgreSQL: {}", e);
            e
        })?;

        if config.database.run_migrations {
            db.run_migrations().await?;
        }

        let client = reqwest::Client::builder()
            .timeout(config.ai.request_timeout)
            .build()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;
        let retry = config.ai.retry_config();

        let tokens: Arc<dyn TokenProvider> = Arc::new(
            ServiceAccountTokenProvider::new(
                &config.google.service_account,
                config.google.token_uri.clone(),
                client.clone(),
                retry.clone(),
            )
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("GOOGLE_SERVICE_ACCOUNT_KEY: {}", e)))?,
        );

        let vertex_config = VertexConfig {
            url: config.google.generate_content_url(),
            model: config.google.model.clone(),
        };
        let text_provider: Arc<dyn TextProvider> =
            Arc::new(VertexTextProvider::new(vertex_config, client, tokens, retry));

        tracing::info!(
            model = %config.google.model,
            location = %config.google.location,
            "Initialized Vertex AI text provider"
        );

        let state = AppState::new(Arc::new(db), text_provider, init_metrics());

        Self::with_state(&config.common, state).await
    }

    /// Bind the listener for an already assembled state (port 0 picks a free port).
    pub async fn with_state(common: &Config, state: AppState) -> Result<Self, AppError> {
        let listener = TcpListener::bind((common.host.as_str(), common.port))
            .await
            .map_err(|e| {
                tracing::error!("Failed to bind {}:{}: {}", common.host, common.port, e);
                AppError::from(e)
            })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Quiz service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            router: build_router(state),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until SIGINT/SIGTERM, then drain in-flight requests.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
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
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
