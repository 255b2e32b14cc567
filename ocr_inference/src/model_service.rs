use crate::preprocess::NormalizedTensor;
use ndarray::ArrayD;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model not loaded")]
    NotLoaded,
    #[error("Failed to load model: {0}")]
    Load(String),
    #[error("{0}")]
    Inference(String),
    #[error("Model returned an empty prediction")]
    EmptyOutput,
}

/// Forward pass of a loaded model. Implementations are shared read-only
/// between concurrent requests.
pub trait ModelService: Send + Sync + 'static {
    fn predict(&self, input: &NormalizedTensor) -> Result<Prediction, ModelError>;
}

/// Raw model output for a single input tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction(ArrayD<f32>);

impl Prediction {
    pub fn new(values: ArrayD<f32>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &ArrayD<f32> {
        &self.0
    }

    /// First output value, i.e. `prediction[0][0]` for a `(1, 1)` sigmoid head.
    pub fn scalar(&self) -> Result<f32, ModelError> {
        self.0.iter().next().copied().ok_or(ModelError::EmptyOutput)
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn test_scalar_reads_first_value() {
        let values = ArrayD::from_shape_vec(IxDyn(&[1, 3]), vec![0.25, 0.5, 0.75]).unwrap();

        assert_eq!(Prediction::new(values).scalar().unwrap(), 0.25);
    }

    #[test]
    fn test_scalar_of_empty_output() {
        let prediction = Prediction::new(ArrayD::zeros(IxDyn(&[1, 0])));

        assert!(matches!(prediction.scalar(), Err(ModelError::EmptyOutput)));
    }

    #[test]
    fn test_display_prints_raw_array() {
        let prediction = Prediction::new(ArrayD::from_elem(IxDyn(&[1, 1]), 0.5));

        assert_eq!(prediction.to_string(), "[[0.5]]");
    }
}
