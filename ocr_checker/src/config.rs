use ocr_inference::{
    settings::{self, LogLevel, ModelConfig, ServerConfig},
    PreprocessConfig,
};
use serde::Deserialize;

const ENV_PREFIX: &str = "CHECKER";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub log_level: LogLevel,
    pub checker: CheckerConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub preprocess: PreprocessConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CheckerConfig {
    #[serde(default = "default_max_file_size_bytes")]
    pub max_file_size_bytes: usize,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_max_file_size_bytes() -> usize {
    200 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    ["png", "jpg", "jpeg"].into_iter().map(String::from).collect()
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size_bytes(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl CheckerConfig {
    pub fn allows(&self, filename: &str) -> bool {
        filename
            .rsplit_once('.')
            .map(|(_, extension)| {
                self.allowed_extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(extension))
            })
            .unwrap_or(false)
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
            load_configuration(&dir, Environment::Local, "CHECKER_CONFIG_TEST").unwrap();

        assert_eq!(config.server.get_address(), "127.0.0.1:8501");
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.model.onnx_file, "ocr_model.onnx");
        assert_eq!(config.checker.allowed_extensions, default_allowed_extensions());
    }

    #[test]
    fn test_pdf_is_not_checkable() {
        let checker = CheckerConfig::default();

        assert!(checker.allows("scan.JPG"));
        assert!(!checker.allows("report.pdf"));
        assert!(!checker.allows("png"));
    }
}
