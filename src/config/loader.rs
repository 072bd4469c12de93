//! Configuration Loader
//!
//! Environment-aware configuration loading. Built-in defaults are overlaid by
//! the base YAML file, the environment-specific YAML file and finally by
//! `GRAPH_WORKERS__SECTION__KEY` environment variables.

use super::error::ConfigResult;
use super::WorkersConfig;
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const CONFIG_FILE_STEM: &str = "graph_workers";
const ENV_PREFIX: &str = "GRAPH_WORKERS";

pub struct ConfigManager {
    config: WorkersConfig,
    environment: String,
    config_directory: PathBuf,
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("environment", &self.environment)
            .field("config_directory", &self.config_directory)
            .finish()
    }
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_layered(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            evaluator_workers = config.workers.evaluator_workers,
            api_workers = config.workers.api_workers,
            rpc_topic = %config.rpc.topic,
            "⚙️ CONFIG: Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration (embedding and tests)
    pub fn from_config(config: WorkersConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: "test".to_string(),
            config_directory: PathBuf::from("config"),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &WorkersConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    fn load_layered(config_directory: &Path, environment: &str) -> ConfigResult<WorkersConfig> {
        let base_file = config_directory.join(format!("{CONFIG_FILE_STEM}.yaml"));
        let env_file = config_directory.join(format!("{CONFIG_FILE_STEM}.{environment}.yaml"));

        let settings = Config::builder()
            .add_source(Config::try_from(&WorkersConfig::default())?)
            .add_source(File::from(base_file).required(false))
            .add_source(File::from(env_file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Detect the current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("GRAPH_WORKERS_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| crate::constants::environments::DEVELOPMENT.to_string())
            .to_lowercase()
    }

    fn default_config_directory() -> PathBuf {
        env::var("GRAPH_WORKERS_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn test_defaults_when_no_files_present() {
        let temp_dir = TempDir::new().unwrap();
        let manager =
            ConfigManager::load_from_directory_with_env(Some(temp_dir.path().to_path_buf()), "test")
                .unwrap();

        assert_eq!(manager.environment(), "test");
        assert_eq!(manager.config().workers.evaluator_workers, 1);
        assert_eq!(manager.config().notifier.topic, "vitrage_notifications");
    }

    #[test]
    fn test_base_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        write_file(
            &temp_dir,
            "graph_workers.yaml",
            r#"
workers:
  evaluator_workers: 4
  api_workers: 2
rpc:
  topic: "rpc_api_test"
"#,
        );

        let manager =
            ConfigManager::load_from_directory_with_env(Some(temp_dir.path().to_path_buf()), "test")
                .unwrap();

        assert_eq!(manager.config().workers.evaluator_workers, 4);
        assert_eq!(manager.config().workers.api_workers, 2);
        assert_eq!(manager.config().rpc.topic, "rpc_api_test");
        // Untouched keys keep their defaults
        assert_eq!(manager.config().rpc.request_buffer_size, 256);
    }

    #[test]
    fn test_environment_specific_overrides() {
        let temp_dir = TempDir::new().unwrap();
        write_file(
            &temp_dir,
            "graph_workers.yaml",
            "workers:\n  evaluator_workers: 4\n",
        );
        write_file(
            &temp_dir,
            "graph_workers.production.yaml",
            "workers:\n  evaluator_workers: 8\nshutdown:\n  graceful_timeout_seconds: 30\n",
        );

        let production = ConfigManager::load_from_directory_with_env(
            Some(temp_dir.path().to_path_buf()),
            "production",
        )
        .unwrap();
        assert_eq!(production.config().workers.evaluator_workers, 8);
        assert_eq!(production.config().shutdown.graceful_timeout_seconds, 30);

        let development = ConfigManager::load_from_directory_with_env(
            Some(temp_dir.path().to_path_buf()),
            "development",
        )
        .unwrap();
        assert_eq!(development.config().workers.evaluator_workers, 4);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_file(
            &temp_dir,
            "graph_workers.yaml",
            "workers:\n  evaluator_workers: 0\n",
        );

        let result =
            ConfigManager::load_from_directory_with_env(Some(temp_dir.path().to_path_buf()), "test");
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_yaml_is_a_load_error() {
        let temp_dir = TempDir::new().unwrap();
        write_file(&temp_dir, "graph_workers.yaml", "workers: [unclosed\n");

        let result =
            ConfigManager::load_from_directory_with_env(Some(temp_dir.path().to_path_buf()), "test");
        assert!(result.is_err());
    }
}
