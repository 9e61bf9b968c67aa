use std::path::{Path, PathBuf};
use std::time::Duration;

use farmgate_core::engine::EngineConfig;
use farmgate_core::schema::{HARVEST_SCHEMA, SchemaLimits};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rest: RestConfig,
    pub engine: EngineConfigValues,
    pub consistency: ConsistencyConfig,
    pub schema_limits: SchemaLimitsConfig,
    pub schema: SchemaConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RestConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfigValues {
    pub max_depth: usize,
    pub max_concurrent_branches: usize,
    pub store_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsistencyConfig {
    pub staleness_window_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchemaLimitsConfig {
    pub max_types: usize,
    pub max_relations_per_type: usize,
    pub max_permissions_per_type: usize,
}

/// Schema loaded at start-up when the store holds none. Without a path the
/// built-in harvest schema is used.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for EngineConfigValues {
    fn default() -> Self {
        Self {
            max_depth: 6,
            max_concurrent_branches: 10,
            store_timeout_ms: 5000,
        }
    }
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            staleness_window_ms: 5000,
        }
    }
}

impl Default for SchemaLimitsConfig {
    fn default() -> Self {
        let limits = SchemaLimits::default();
        Self {
            max_types: limits.max_types,
            max_relations_per_type: limits.max_relations_per_type,
            max_permissions_per_type: limits.max_permissions_per_type,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e.to_string()))?;
            toml::from_str::<AppConfig>(&contents)
                .map_err(|e| ConfigError::ParseToml(e.to_string()))?
        } else {
            AppConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("FARMGATE_REST_HOST") {
            self.rest.host = v;
        }
        if let Ok(v) = std::env::var("FARMGATE_REST_PORT")
            && let Ok(port) = v.parse()
        {
            self.rest.port = port;
        }
        if let Ok(v) = std::env::var("FARMGATE_ENGINE_MAX_DEPTH")
            && let Ok(n) = v.parse()
        {
            self.engine.max_depth = n;
        }
        if let Ok(v) = std::env::var("FARMGATE_ENGINE_MAX_CONCURRENT_BRANCHES")
            && let Ok(n) = v.parse()
        {
            self.engine.max_concurrent_branches = n;
        }
        if let Ok(v) = std::env::var("FARMGATE_ENGINE_STORE_TIMEOUT_MS")
            && let Ok(n) = v.parse()
        {
            self.engine.store_timeout_ms = n;
        }
        if let Ok(v) = std::env::var("FARMGATE_CONSISTENCY_STALENESS_WINDOW_MS")
            && let Ok(n) = v.parse()
        {
            self.consistency.staleness_window_ms = n;
        }
        if let Ok(v) = std::env::var("FARMGATE_SCHEMA_PATH") {
            self.schema.path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("FARMGATE_LOG_LEVEL") {
            self.log.level = v;
        }
        if let Ok(v) = std::env::var("FARMGATE_LOG_FORMAT") {
            match v.as_str() {
                "json" => self.log.format = LogFormat::Json,
                "pretty" => self.log.format = LogFormat::Pretty,
                _ => {}
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.rest.port == 0 {
            return Err(ConfigError::Validation(
                "rest.port must be non-zero".to_string(),
            ));
        }
        if self.engine.max_depth == 0 {
            return Err(ConfigError::Validation(
                "engine.max_depth must be non-zero".to_string(),
            ));
        }
        if self.engine.max_concurrent_branches == 0 {
            return Err(ConfigError::Validation(
                "engine.max_concurrent_branches must be non-zero".to_string(),
            ));
        }
        if self.engine.store_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "engine.store_timeout_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_depth: self.engine.max_depth,
            max_concurrent_branches: self.engine.max_concurrent_branches,
            store_timeout: Duration::from_millis(self.engine.store_timeout_ms),
        }
    }

    pub fn to_schema_limits(&self) -> SchemaLimits {
        SchemaLimits {
            max_types: self.schema_limits.max_types,
            max_relations_per_type: self.schema_limits.max_relations_per_type,
            max_permissions_per_type: self.schema_limits.max_permissions_per_type,
        }
    }

    pub fn staleness_window(&self) -> Duration {
        Duration::from_millis(self.consistency.staleness_window_ms)
    }

    pub fn rest_addr(&self) -> String {
        format!("{}:{}", self.rest.host, self.rest.port)
    }

    pub fn load_schema_text(&self) -> Result<String, ConfigError> {
        match &self.schema.path {
            Some(path) => std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e.to_string())),
            None => Ok(HARVEST_SCHEMA.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read file '{0}': {1}")]
    ReadFile(String, String),

    #[error("failed to parse TOML config: {0}")]
    ParseToml(String),

    #[error("config validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("farmgate.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{contents}").unwrap();
        (dir, path)
    }

    #[test]
    fn default_config_has_sensible_values() {
        let config = AppConfig::default();

        assert_eq!(config.rest.host, "0.0.0.0");
        assert_eq!(config.rest.port, 8080);
        assert_eq!(config.engine.max_depth, 6);
        assert_eq!(config.engine.store_timeout_ms, 5000);
        assert_eq!(config.consistency.staleness_window_ms, 5000);
        assert!(config.schema.path.is_none());
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn load_from_toml_file() {
        let (_dir, path) = write_config(
            r#"
[rest]
host = "127.0.0.1"
port = 9090

[engine]
max_depth = 10
store_timeout_ms = 250

[consistency]
staleness_window_ms = 1000

[log]
format = "pretty"
level = "debug"
"#,
        );

        let config = AppConfig::load(Some(&path)).unwrap();

        assert_eq!(config.rest_addr(), "127.0.0.1:9090");
        assert_eq!(config.engine.max_depth, 10);
        assert_eq!(
            config.to_engine_config().store_timeout,
            Duration::from_millis(250)
        );
        assert_eq!(config.staleness_window(), Duration::from_secs(1));
        assert_eq!(config.log.format, LogFormat::Pretty);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn env_vars_override_toml() {
        let (_dir, path) = write_config(
            r#"
[engine]
max_concurrent_branches = 4
"#,
        );

        // SAFETY: no other test reads or asserts this variable
        unsafe { std::env::set_var("FARMGATE_ENGINE_MAX_CONCURRENT_BRANCHES", "16") };
        let config = AppConfig::load(Some(&path)).unwrap();
        unsafe { std::env::remove_var("FARMGATE_ENGINE_MAX_CONCURRENT_BRANCHES") };

        assert_eq!(config.engine.max_concurrent_branches, 16);
    }

    #[test]
    fn malformed_toml_is_reported() {
        let (_dir, path) = write_config("[rest\nport = ");

        let result = AppConfig::load(Some(&path));

        assert!(matches!(result, Err(ConfigError::ParseToml(_))));
    }

    #[test]
    fn missing_config_file_is_reported() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/farmgate.toml")));

        assert!(
            matches!(result, Err(ConfigError::ReadFile(ref p, _)) if p.contains("nonexistent"))
        );
    }

    #[test]
    fn validation_rejects_zero_port() {
        let mut config = AppConfig::default();
        config.rest.port = 0;

        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Validation(ref msg)) if msg.contains("port")));
    }

    #[test]
    fn validation_rejects_zero_max_depth() {
        let mut config = AppConfig::default();
        config.engine.max_depth = 0;

        let result = config.validate();
        assert!(
            matches!(result, Err(ConfigError::Validation(ref msg)) if msg.contains("max_depth"))
        );
    }

    #[test]
    fn validation_rejects_zero_store_timeout() {
        let mut config = AppConfig::default();
        config.engine.store_timeout_ms = 0;

        let result = config.validate();
        assert!(
            matches!(result, Err(ConfigError::Validation(ref msg)) if msg.contains("store_timeout"))
        );
    }

    #[test]
    fn schema_limits_follow_config() {
        let (_dir, path) = write_config(
            r#"
[schema_limits]
max_types = 3
"#,
        );

        let config = AppConfig::load(Some(&path)).unwrap();
        let limits = config.to_schema_limits();

        assert_eq!(limits.max_types, 3);
        assert_eq!(limits.max_relations_per_type, 30);
    }

    #[test]
    fn schema_text_defaults_to_harvest_model() {
        let config = AppConfig::default();

        assert_eq!(config.load_schema_text().unwrap(), HARVEST_SCHEMA);
    }

    #[test]
    fn schema_text_is_read_from_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let schema_path = dir.path().join("orchard.zed");
        std::fs::write(&schema_path, "definition user {}").unwrap();

        let mut config = AppConfig::default();
        config.schema.path = Some(schema_path);

        assert_eq!(config.load_schema_text().unwrap(), "definition user {}");
    }
}
