use serde::{de::DeserializeOwned, Deserialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub model_dir: PathBuf,
    pub onnx_file: String,
    #[serde(default = "default_model_instances")]
    pub num_instances: usize,
    #[serde(default)]
    pub output_name: Option<String>,
}

fn default_model_instances() -> usize {
    1
}

impl ModelConfig {
    pub fn get_path(&self) -> PathBuf {
        self.model_dir.join(&self.onnx_file)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.get_path().exists() {
            return Err(format!("Model file not found: {:?}", self.get_path()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "String")]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

/// Loads `configuration/base.yaml`, then `configuration/<APP_ENVIRONMENT>.yaml`,
/// then `<env_prefix>_*` environment variables (`__` separates nested keys).
pub fn get_configuration<T: DeserializeOwned>(env_prefix: &str) -> Result<T, config::ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| {
        config::ConfigError::Message(format!("Failed to determine the current directory: {}", e))
    })?;

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    load_configuration(&base_path.join("configuration"), environment, env_prefix)
}

pub fn load_configuration<T: DeserializeOwned>(
    configuration_directory: &Path,
    environment: Environment,
    env_prefix: &str,
) -> Result<T, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(config::File::from(
            configuration_directory.join(format!("{}.yaml", environment.as_str())),
        ))
        .add_source(
            config::Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        log_level: LogLevel,
        server: ServerConfig,
        model: ModelConfig,
    }

    #[test]
    fn test_environment_overlay_wins_over_base() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.yaml"),
            "log_level: info\nserver:\n  host: 0.0.0.0\n  port: 8080\nmodel:\n  model_dir: model\n  onnx_file: ocr_model.onnx\n",
        )
        .unwrap();
        fs::write(dir.path().join("production.yaml"), "log_level: DEBUG\n").unwrap();

        let config: TestConfig =
            load_configuration(dir.path(), Environment::Production, "OCR_SETTINGS_TEST").unwrap();

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.server.get_address(), "0.0.0.0:8080");
        assert_eq!(config.model.num_instances, 1);
        assert_eq!(config.model.get_path(), PathBuf::from("model/ocr_model.onnx"));
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.yaml"),
            "log_level: trace\nserver:\n  host: 0.0.0.0\n  port: 8080\nmodel:\n  model_dir: model\n  onnx_file: ocr_model.onnx\n",
        )
        .unwrap();
        fs::write(dir.path().join("local.yaml"), "").unwrap();

        let result: Result<TestConfig, _> =
            load_configuration(dir.path(), Environment::Local, "OCR_SETTINGS_TEST");

        assert!(result.is_err());
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            Environment::try_from("Production".to_string()),
            Ok(Environment::Production)
        );
        assert!(Environment::try_from("staging".to_string()).is_err());
    }
}
