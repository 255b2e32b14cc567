use crate::{
    model_service::{ModelError, ModelService, Prediction},
    preprocess::NormalizedTensor,
    settings::ModelConfig,
};
use ndarray::ArrayD;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

/// ONNX Runtime backed model. Sessions are handed out round-robin so that
/// concurrent requests never wait on the same session.
pub struct OrtModelService {
    sessions: Vec<Mutex<Session>>,
    counter: AtomicUsize,
    output_name: String,
}

impl OrtModelService {
    pub fn new(model_config: &ModelConfig) -> Result<Self, ModelError> {
        model_config.validate().map_err(ModelError::Load)?;
        let model_path = model_config.get_path();

        let sessions = (0..model_config.num_instances.max(1))
            .map(|_| {
                Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(&model_path)
            })
            .collect::<Result<Vec<_>, ort::Error>>()
            .map_err(|e| ModelError::Load(format!("{}: {}", model_path.display(), e)))?;

        let available = sessions
            .first()
            .map(|session| {
                session
                    .outputs
                    .iter()
                    .map(|output| output.name.clone())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let output_name = resolve_output_name(model_config.output_name.as_deref(), &available)?;

        tracing::info!(
            "Created {} ONNX sessions for {:?}, reading output {:?}",
            sessions.len(),
            model_path,
            output_name
        );

        Ok(Self {
            sessions: sessions.into_iter().map(Mutex::new).collect(),
            counter: AtomicUsize::new(0),
            output_name,
        })
    }

    /// Runs a zero tensor through every session so the first real request
    /// does not pay for lazy initialization.
    pub fn warm_up(&self, input_shape: [usize; 4]) -> Result<(), ModelError> {
        let input = NormalizedTensor::zeros(input_shape);
        for _ in 0..self.sessions.len() {
            self.run_inference(&input)?;
        }
        tracing::debug!("Warm-up finished with input shape {:?}", input_shape);
        Ok(())
    }

    fn run_inference(&self, input: &NormalizedTensor) -> Result<ArrayD<f32>, ModelError> {
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| ModelError::Inference(format!("session mutex poisoned: {}", e)))?;

        tracing::debug!("Running inference on session {}", index);
        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| ModelError::Inference(format!("failed to build tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| ModelError::Inference(format!("inference failed: {}", e)))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            ModelError::Inference(format!("model produced no output {:?}", self.output_name))
        })?;
        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Inference(format!("failed to extract tensor: {}", e)))?;

        ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec())
            .map_err(|e| ModelError::Inference(format!("invalid tensor shape: {}", e)))
    }
}

/// Picks the configured output, or the first one the model declares.
fn resolve_output_name(
    configured: Option<&str>,
    available: &[String],
) -> Result<String, ModelError> {
    match configured {
        Some(name) if available.iter().any(|output| output == name) => Ok(name.to_string()),
        Some(name) => Err(ModelError::Load(format!(
            "model has no output named {:?}, available outputs: {:?}",
            name, available
        ))),
        None => available
            .first()
            .cloned()
            .ok_or_else(|| ModelError::Load("model declares no outputs".to_string())),
    }
}

impl ModelService for OrtModelService {
    fn predict(&self, input: &NormalizedTensor) -> Result<Prediction, ModelError> {
        self.run_inference(input).map(Prediction::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_model_file_fails_before_touching_runtime() {
        let model_config = ModelConfig {
            model_dir: PathBuf::from("./does_not_exist"),
            onnx_file: "ocr_model.onnx".to_string(),
            num_instances: 1,
            output_name: None,
        };

        let result = OrtModelService::new(&model_config);

        assert!(matches!(result, Err(ModelError::Load(msg)) if msg.contains("not found")));
    }

    #[test]
    fn test_resolve_output_name() {
        let available = vec!["logits".to_string(), "probabilities".to_string()];

        assert_eq!(resolve_output_name(None, &available).unwrap(), "logits");
        assert_eq!(
            resolve_output_name(Some("probabilities"), &available).unwrap(),
            "probabilities"
        );
        assert!(matches!(
            resolve_output_name(Some("typo"), &available),
            Err(ModelError::Load(msg)) if msg.contains("typo")
        ));
        assert!(matches!(
            resolve_output_name(None, &[]),
            Err(ModelError::Load(_))
        ));
    }
}
