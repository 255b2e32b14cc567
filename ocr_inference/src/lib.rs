mod loader;
mod model_service;
mod ort_service;
mod preprocess;
mod shutdown;

pub mod settings;

pub use loader::ModelHandle;
pub use model_service::{ModelError, ModelService, Prediction};
pub use ort_service::OrtModelService;
pub use preprocess::{
    NormalizedTensor, PreprocessConfig, PreprocessError, Preprocessor, ResizeFilter,
};
pub use shutdown::shutdown_signal;
