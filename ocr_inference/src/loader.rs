use crate::{
    model_service::{ModelError, ModelService},
    ort_service::OrtModelService,
    settings::ModelConfig,
};
use std::{fmt, sync::Arc};

/// Process-wide handle to the model, built once at startup and cloned into
/// every request. An unloaded handle rejects inference immediately.
#[derive(Clone, Default)]
pub struct ModelHandle {
    model: Option<Arc<dyn ModelService>>,
}

impl ModelHandle {
    /// Loads and warms up the ONNX model. Failures are logged and produce an
    /// unloaded handle; the caller keeps running.
    pub fn load(model_config: &ModelConfig, input_shape: [usize; 4]) -> Self {
        let loaded = OrtModelService::new(model_config).and_then(|service| {
            service.warm_up(input_shape)?;
            Ok(service)
        });

        match loaded {
            Ok(service) => {
                tracing::info!("Model loaded from {:?}", model_config.get_path());
                Self::from_service(service)
            }
            Err(e) => {
                tracing::error!("Error loading model: {}", e);
                Self::unloaded()
            }
        }
    }

    /// [`ModelHandle::load`] on a blocking task. A panic while loading is
    /// treated like any other load failure.
    pub async fn load_blocking(model_config: ModelConfig, input_shape: [usize; 4]) -> Self {
        Self::build_blocking(move || Self::load(&model_config, input_shape)).await
    }

    async fn build_blocking<F>(build: F) -> Self
    where
        F: FnOnce() -> Self + Send + 'static,
    {
        match tokio::task::spawn_blocking(build).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("Error loading model: {}", e);
                Self::unloaded()
            }
        }
    }

    pub fn from_service(service: impl ModelService) -> Self {
        Self {
            model: Some(Arc::new(service)),
        }
    }

    pub fn unloaded() -> Self {
        Self { model: None }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn get(&self) -> Result<Arc<dyn ModelService>, ModelError> {
        self.model.clone().ok_or(ModelError::NotLoaded)
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model_service::Prediction, preprocess::NormalizedTensor};
    use ndarray::{ArrayD, IxDyn};
    use std::path::PathBuf;

    struct ConstantModel(f32);

    impl ModelService for ConstantModel {
        fn predict(&self, _input: &NormalizedTensor) -> Result<Prediction, ModelError> {
            Ok(Prediction::new(ArrayD::from_elem(IxDyn(&[1, 1]), self.0)))
        }
    }

    #[test]
    fn test_failed_load_leaves_handle_unset() {
        let model_config = ModelConfig {
            model_dir: PathBuf::from("./no_models_here"),
            onnx_file: "ocr_model_50_epoch.onnx".to_string(),
            num_instances: 1,
            output_name: None,
        };

        let handle = ModelHandle::load(&model_config, [1, 224, 224, 3]);

        assert!(!handle.is_loaded());
        assert!(matches!(handle.get(), Err(ModelError::NotLoaded)));
    }

    #[tokio::test]
    async fn test_panicking_load_leaves_handle_unset() {
        let handle = ModelHandle::build_blocking(|| panic!("no output named `typo`")).await;

        assert!(!handle.is_loaded());
        assert!(matches!(handle.get(), Err(ModelError::NotLoaded)));
    }

    #[tokio::test]
    async fn test_blocking_load_of_missing_model() {
        let model_config = ModelConfig {
            model_dir: PathBuf::from("./no_models_here"),
            onnx_file: "ocr_model.onnx".to_string(),
            num_instances: 2,
            output_name: Some("probabilities".to_string()),
        };

        let handle = ModelHandle::load_blocking(model_config, [1, 224, 224, 3]).await;

        assert!(!handle.is_loaded());
    }

    #[test]
    fn test_injected_service_is_shared_between_clones() {
        let handle = ModelHandle::from_service(ConstantModel(0.75));
        let clone = handle.clone();
        let input = NormalizedTensor::zeros([1, 2, 2, 3]);

        let first = handle.get().unwrap().predict(&input).unwrap();
        let second = clone.get().unwrap().predict(&input).unwrap();

        assert!(clone.is_loaded());
        assert_eq!(first, second);
        assert_eq!(first.scalar().unwrap(), 0.75);
    }

    #[test]
    fn test_debug_hides_model_internals() {
        assert_eq!(
            format!("{:?}", ModelHandle::unloaded()),
            "ModelHandle { loaded: false }"
        );
    }
}
