use crate::{
    config::Config,
    server::{CheckerState, HttpServer},
};
use ocr_inference::{shutdown_signal, ModelHandle, Preprocessor};

pub async fn start_app(config: Config) -> anyhow::Result<()> {
    let preprocessor = Preprocessor::new(config.preprocess.clone());
    let input_shape = preprocessor.config().input_shape();
    let model = ModelHandle::load_blocking(config.model.clone(), input_shape).await;

    let state = CheckerState::new(model, preprocessor, config.checker.clone());
    let server = HttpServer::new(state, &config.server).await?;

    server
        .run(async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, stopping checker");
        })
        .await
}
