use config::{Config, ConfigError, Environment, File};
use engine::generator::{GeneratorOptions, DEFAULT_MAX_INPUT_BYTES};
use engine::template::DEFAULT_INDENT;
use engine::{AppContext, GenerationError};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct QuinectlConfig {
    pub defaults: GenerationDefaults,
    pub logging: LoggingConfig,
}

/// Values used when a request leaves something unspecified.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct GenerationDefaults {
    pub escape_strategy: String,
    pub target: String,
    pub indent: String,
    pub trailing_newline: bool,
    pub max_input_bytes: usize,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            escape_strategy: "standard".to_string(),
            target: "reflective".to_string(),
            indent: DEFAULT_INDENT.to_string(),
            trailing_newline: true,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

impl GenerationDefaults {
    /// Build the engine context these defaults describe.
    pub fn to_context(&self) -> Result<AppContext, GenerationError> {
        let options = GeneratorOptions {
            max_input_bytes: self.max_input_bytes,
            indent: self.indent.clone(),
            trailing_newline: self.trailing_newline,
        };
        Ok(AppContext::new(
            options,
            self.escape_strategy.parse()?,
            self.target.parse()?,
        ))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LoggingFormatConfig,
    pub levels: LoggingLevelsConfig,
    pub redaction: RedactionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct LoggingFormatConfig {
    pub show_time: bool,
    /// Emit one JSON object per event instead of plain lines.
    pub json: bool,
    pub location: LoggingLocationConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct LoggingLocationConfig {
    pub show_file: bool,
    pub show_line: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LoggingLevelsConfig {
    pub debug: bool,
    pub info: bool,
    pub warning: bool,
    pub error: bool,
}

impl Default for LoggingLevelsConfig {
    fn default() -> Self {
        Self {
            debug: false,
            info: false,
            warning: true,
            error: true,
        }
    }
}

impl LoggingLevelsConfig {
    /// The most verbose enabled level, as an `EnvFilter` directive.
    pub fn directive(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.info {
            "info"
        } else if self.warning {
            "warn"
        } else if self.error {
            "error"
        } else {
            "off"
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RedactionConfig {
    pub enabled: bool,
    pub patterns: Vec<RedactionPattern>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RedactionPattern {
    pub name: String,
    pub regex: String,
    pub placeholder: String,
}

/// Layer, lowest first: built-in defaults, `quinectl.yaml`,
/// `.quinectl.yaml`, `explicit` (required when given), then
/// `QUINECTL__SECTION__KEY` environment variables.
pub fn load_config(explicit: Option<&Path>) -> Result<QuinectlConfig, ConfigError> {
    let mut builder = Config::builder()
        .add_source(File::with_name("quinectl.yaml").required(false))
        .add_source(File::with_name(".quinectl.yaml").required(false));
    if let Some(path) = explicit {
        builder = builder.add_source(File::from(path).required(true));
    }
    builder
        .add_source(Environment::with_prefix("QUINECTL").separator("__"))
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{EscapeStrategy, TargetModel};
    use serial_test::serial;
    use std::env;

    struct EnvGuard(&'static str);
    impl EnvGuard {
        fn new(key: &'static str, val: &str) -> Self {
            env::set_var(key, val);
            Self(key)
        }
    }
    impl Drop for EnvGuard {
        fn drop(&mut self) {
            env::remove_var(self.0);
        }
    }

    #[test]
    #[serial]
    fn test_load_config() {
        let config = load_config(None);
        assert!(config.is_ok(), "Failed to load config: {:?}", config.err());

        let config = config.unwrap();
        assert_eq!(config.defaults.escape_strategy, "standard");
        assert_eq!(config.defaults.target, "reflective");
        assert_eq!(config.defaults.max_input_bytes, DEFAULT_MAX_INPUT_BYTES);
        assert!(config.logging.redaction.enabled);
    }

    #[test]
    #[serial]
    fn test_env_var_override_precedence() {
        let _guard = EnvGuard::new("QUINECTL__DEFAULTS__ESCAPE_STRATEGY", "hex");
        let config = load_config(None).expect("Should load config");
        assert_eq!(config.defaults.escape_strategy, "hex");
        let ctx = config.defaults.to_context().unwrap();
        assert_eq!(ctx.default_strategy, EscapeStrategy::Hex);
    }

    #[test]
    #[serial]
    fn test_type_coercion() {
        let _guard1 = EnvGuard::new("QUINECTL__DEFAULTS__TRAILING_NEWLINE", "false");
        let _guard2 = EnvGuard::new("QUINECTL__DEFAULTS__MAX_INPUT_BYTES", "64");
        let _guard3 = EnvGuard::new("QUINECTL__LOGGING__LEVELS__DEBUG", "true");

        let config = load_config(None).expect("Should load config");
        assert!(!config.defaults.trailing_newline);
        assert_eq!(config.defaults.max_input_bytes, 64);
        assert_eq!(config.logging.levels.directive(), "debug");
    }

    #[test]
    #[serial]
    fn test_explicit_file_layer() {
        let path = env::temp_dir().join("quinectl_config_test.yaml");
        std::fs::write(&path, "defaults:\n  target: classic\n  indent: \"\\t\"\n").unwrap();

        let config = load_config(Some(&path)).expect("Should load config");
        let ctx = config.defaults.to_context().unwrap();
        assert_eq!(ctx.default_target, TargetModel::Classic);
        assert_eq!(ctx.generator().options().indent, "\t");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_is_an_error() {
        let path = env::temp_dir().join("quinectl_config_does_not_exist.yaml");
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn test_unknown_default_strategy_is_rejected() {
        let defaults = GenerationDefaults {
            escape_strategy: "base64".into(),
            ..Default::default()
        };
        assert_eq!(
            defaults.to_context().unwrap_err(),
            GenerationError::UnsupportedStrategy("base64".into())
        );
    }
}
