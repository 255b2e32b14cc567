use crate::{config::CheckerConfig, routes::checker_routes};
use axum::{extract::DefaultBodyLimit, Router};
use ocr_inference::{settings::ServerConfig, ModelHandle, Preprocessor};
use std::{future::Future, sync::Arc};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct CheckerState {
    pub model: ModelHandle,
    pub preprocessor: Arc<Preprocessor>,
    pub checker: Arc<CheckerConfig>,
}

impl CheckerState {
    pub fn new(model: ModelHandle, preprocessor: Preprocessor, checker: CheckerConfig) -> Self {
        Self {
            model,
            preprocessor: Arc::new(preprocessor),
            checker: Arc::new(checker),
        }
    }
}

pub fn build_router(state: CheckerState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.checker.max_file_size_bytes);

    Router::new()
        .merge(checker_routes())
        .with_state(state)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(state: CheckerState, config: &ServerConfig) -> anyhow::Result<Self> {
        let router = build_router(state);
        let listener = TcpListener::bind(config.get_address()).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        tracing::info!("Checker available on http://{}", self.listener.local_addr()?);

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
