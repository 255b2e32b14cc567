use ocr_inference::{
    settings::{self, LogLevel, ModelConfig, ServerConfig},
    PreprocessConfig,
};
use serde::Deserialize;
use std::path::PathBuf;

const ENV_PREFIX: &str = "UPLOAD";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub log_level: LogLevel,
    pub upload: UploadConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub preprocess: PreprocessConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    pub upload_dir: PathBuf,
    #[serde(default = "default_max_file_size_bytes")]
    pub max_file_size_bytes: usize,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_max_file_size_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    ["png", "jpg", "jpeg", "pdf"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl UploadConfig {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            max_file_size_bytes: default_max_file_size_bytes(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    settings::get_configuration(ENV_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocr_inference::settings::{load_configuration, Environment};
    use std::path::Path;

    #[test]
    fn test_shipped_configuration_parses() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("configuration");

        let config: Config =
            load_configuration(&dir, Environment::Production, "UPLOAD_CONFIG_TEST").unwrap();

        assert_eq!(config.server.get_address(), "0.0.0.0:8080");
        assert_eq!(config.upload.max_file_size_bytes, 5 * 1024 * 1024);
        assert_eq!(config.upload.allowed_extensions, default_allowed_extensions());
        assert_eq!(config.preprocess.input_shape(), [1, 224, 224, 3]);
        assert_eq!(config.model.num_instances, 2);
    }
}
