use crate::{config::Config, server::HttpServer, server::SharedState, telemetry::Metrics};
use ocr_inference::{shutdown_signal, ModelHandle, Preprocessor};

pub async fn start_app(config: Config) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.upload.upload_dir).await?;

    let preprocessor = Preprocessor::new(config.preprocess.clone());
    let input_shape = preprocessor.config().input_shape();
    let model = ModelHandle::load_blocking(config.model.clone(), input_shape).await;
    if !model.is_loaded() {
        tracing::warn!("Serving without a model, predictions will fail until restart");
    }

    let metrics = Metrics::new()?;
    opentelemetry::global::set_meter_provider(metrics.provider());

    let state = SharedState::new(model, preprocessor, config.upload.clone(), metrics);
    let server = HttpServer::new(state, &config.server).await?;

    let shutdown = async {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown");
    };
    server.run(shutdown).await
}
