//! YAML configuration loader for change management.
//!
//! This module reads the `change_management` section of the broker
//! configuration file:
//!
//! ```yaml
//! change_management:
//!   enable: true
//!   executable: change-oracle
//!   extra_options: "--edm-instance prod --mode enforce"
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use thiserror::Error;

/// Oracle executable used when the configuration does not name one.
pub const DEFAULT_ORACLE_EXECUTABLE: &str = "change-oracle";

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML configuration: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
}

/// Change-management settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeManagementConfig {
    /// Whether changes are checked at all.
    #[serde(default)]
    pub enable: bool,
    /// Oracle executable to invoke.
    #[serde(default = "default_executable")]
    pub executable: String,
    /// Extra oracle arguments, split like a shell command line.
    #[serde(default)]
    pub extra_options: String,
}

fn default_executable() -> String {
    DEFAULT_ORACLE_EXECUTABLE.to_string()
}

impl Default for ChangeManagementConfig {
    fn default() -> Self {
        Self {
            enable: false,
            executable: default_executable(),
            extra_options: String::new(),
        }
    }
}

impl ChangeManagementConfig {
    /// Creates an enabled configuration with the given extra options.
    pub fn enabled(extra_options: impl Into<String>) -> Self {
        Self {
            enable: true,
            extra_options: extra_options.into(),
            ..Self::default()
        }
    }

    /// Splits `extra_options` into oracle arguments.
    pub fn extra_args(&self) -> Result<Vec<String>, ConfigError> {
        shlex::split(&self.extra_options).ok_or_else(|| {
            ConfigError::InvalidValue(format!(
                "change_management.extra_options is not a valid argument list: {}",
                self.extra_options
            ))
        })
    }
}

#[derive(Debug, Deserialize)]
struct BrokerConfigFile {
    #[serde(default)]
    change_management: ChangeManagementConfig,
}

/// Substitutes environment variables in a string.
///
/// Replaces patterns like `${VAR_NAME}` with the corresponding environment variable value.
fn substitute_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
    let mut result = input.to_string();
    let mut errors = Vec::new();

    for cap in re.captures_iter(input) {
        let full_match = &cap[0];
        let var_name = &cap[1];

        match env::var(var_name) {
            Ok(value) => {
                result = result.replace(full_match, &value);
            }
            Err(_) => {
                errors.push(var_name.to_string());
            }
        }
    }

    if !errors.is_empty() {
        return Err(ConfigError::EnvVarNotFound(errors.join(", ")));
    }

    Ok(result)
}

/// Parses the change-management section out of a YAML document.
pub fn parse_change_management_config(content: &str) -> Result<ChangeManagementConfig, ConfigError> {
    let content = substitute_env_vars(content)?;
    let file: BrokerConfigFile = serde_yaml::from_str(&content)?;
    validate_config(&file.change_management)?;
    Ok(file.change_management)
}

/// Loads and parses the change-management configuration from a YAML file.
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use cmdb_policy::config::load_change_management_config;
///
/// let config = load_change_management_config(Path::new("config/broker.yaml")).unwrap();
/// ```
pub fn load_change_management_config(path: &Path) -> Result<ChangeManagementConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_change_management_config(&content)
}

/// Validates the loaded configuration.
fn validate_config(config: &ChangeManagementConfig) -> Result<(), ConfigError> {
    if config.enable && config.executable.trim().is_empty() {
        return Err(ConfigError::MissingField(
            "change_management.executable".to_string(),
        ));
    }

    config.extra_args()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_valid_config() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"
change_management:
  enable: true
  executable: /opt/bin/check-change
  extra_options: "--edm-instance uat --mode 'dry run'"
"#,
        )
        .unwrap();

        let config = load_change_management_config(file.path()).unwrap();
        assert!(config.enable);
        assert_eq!(config.executable, "/opt/bin/check-change");
        assert_eq!(
            config.extra_args().unwrap(),
            vec!["--edm-instance", "uat", "--mode", "dry run"]
        );
    }

    #[test]
    fn test_missing_section_defaults_to_disabled() {
        let config = parse_change_management_config("other_section: {}\n").unwrap();
        assert_eq!(config, ChangeManagementConfig::default());
        assert!(!config.enable);
        assert_eq!(config.executable, DEFAULT_ORACLE_EXECUTABLE);
        assert!(config.extra_args().unwrap().is_empty());
    }

    #[test]
    fn test_missing_file() {
        let result = load_change_management_config(Path::new("/nonexistent/broker.yaml"));
        assert!(matches!(result.unwrap_err(), ConfigError::IoError(_)));
    }

    #[test]
    fn test_invalid_yaml() {
        let result = parse_change_management_config("change_management: [enable");
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_)));
    }

    #[test]
    fn test_unbalanced_quotes_rejected() {
        let yaml = "change_management:\n  enable: true\n  extra_options: \"--mode 'enforce\"\n";
        let result = parse_change_management_config(yaml);
        assert!(matches!(result.unwrap_err(), ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_empty_executable_rejected_when_enabled() {
        let yaml = "change_management:\n  enable: true\n  executable: \"\"\n";
        let result = parse_change_management_config(yaml);
        assert!(matches!(result.unwrap_err(), ConfigError::MissingField(_)));
    }

    #[test]
    fn test_env_var_substitution() {
        env::set_var("CMDB_TEST_ORACLE_INSTANCE", "qa");
        let yaml = "change_management:\n  enable: true\n  extra_options: \"--edm-instance ${CMDB_TEST_ORACLE_INSTANCE}\"\n";

        let config = parse_change_management_config(yaml).unwrap();
        assert_eq!(config.extra_args().unwrap(), vec!["--edm-instance", "qa"]);
        env::remove_var("CMDB_TEST_ORACLE_INSTANCE");
    }

    #[test]
    fn test_missing_env_var() {
        let yaml = "change_management:\n  executable: ${CMDB_TEST_UNSET_ORACLE_PATH}\n";
        let result = parse_change_management_config(yaml);
        match result.unwrap_err() {
            ConfigError::EnvVarNotFound(name) => assert_eq!(name, "CMDB_TEST_UNSET_ORACLE_PATH"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_enabled_constructor() {
        let config = ChangeManagementConfig::enabled("--disable_edm");
        assert!(config.enable);
        assert_eq!(config.extra_args().unwrap(), vec!["--disable_edm"]);
    }
}
