use crate::{config::UploadConfig, routes::api_routes, telemetry::Metrics};
use axum::{extract::DefaultBodyLimit, Router};
use axum_otel_metrics::HttpMetricsLayerBuilder;
use ocr_inference::{settings::ServerConfig, ModelHandle, Preprocessor};
use std::{future::Future, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

#[derive(Clone)]
pub struct SharedState {
    pub model: ModelHandle,
    pub preprocessor: Arc<Preprocessor>,
    pub upload_config: Arc<UploadConfig>,
    pub metrics: Arc<Metrics>,
}

impl SharedState {
    pub fn new(
        model: ModelHandle,
        preprocessor: Preprocessor,
        upload_config: UploadConfig,
        metrics: Metrics,
    ) -> Self {
        Self {
            model,
            preprocessor: Arc::new(preprocessor),
            upload_config: Arc::new(upload_config),
            metrics: Arc::new(metrics),
        }
    }
}

pub fn build_router(state: SharedState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.upload_config.max_file_size_bytes);
    let metrics_layer = HttpMetricsLayerBuilder::new().build();
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes())
        .with_state(state)
        .layer(body_limit)
        .layer(metrics_layer)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(state: SharedState, config: &ServerConfig) -> anyhow::Result<Self> {
        let router = build_router(state);
        let listener = TcpListener::bind(config.get_address()).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        tracing::info!("Starting app on {}", self.listener.local_addr()?);

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
