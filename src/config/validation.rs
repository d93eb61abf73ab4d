//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::{Config, PushProvider};
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("push.getui.app_key is required when push.enable = \"getui\"")]
    MissingGetuiAppKey,
    #[error("push.getui.base_url is required when push.enable = \"getui\"")]
    MissingGetuiBaseUrl,
    #[error("push.jpush.app_key is required when push.enable = \"jpush\"")]
    MissingJPushAppKey,
    #[error("discovery.max_fanout_workers must be at least 1")]
    InvalidWorkerCap,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.is_empty() {
        errors.push(ValidationError::MissingServerName);
    }

    match config.push.enable {
        PushProvider::Getui => {
            if config.push.getui.app_key.is_empty() {
                errors.push(ValidationError::MissingGetuiAppKey);
            }
            if config.push.getui.base_url.is_empty() {
                errors.push(ValidationError::MissingGetuiBaseUrl);
            }
        }
        PushProvider::JPush => {
            if config.push.jpush.app_key.is_empty() {
                errors.push(ValidationError::MissingJPushAppKey);
            }
        }
        PushProvider::Fcm | PushProvider::Dummy => {}
    }

    if config.discovery.max_fanout_workers == 0 {
        errors.push(ValidationError::InvalidWorkerCap);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_valid_config() -> String {
        r#"
[server]
name = "impush-ng"
"#
        .to_string()
    }

    #[test]
    fn test_valid_config_passes() {
        let config: Config = toml::from_str(&minimal_valid_config()).unwrap();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_server_name_fails() {
        let toml = r#"
[server]
name = ""
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::MissingServerName))
        );
    }

    #[test]
    fn test_getui_without_app_key_fails() {
        let toml = r#"
[server]
name = "impush-ng"

[push]
enable = "getui"

[push.getui]
channel_id = "c"
channel_name = "n"
app_key = ""
master_secret = "s"
base_url = "https://getui.example"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::MissingGetuiAppKey))
        );
    }

    #[test]
    fn test_zero_worker_cap_fails() {
        let toml = r#"
[server]
name = "impush-ng"

[discovery]
max_fanout_workers = 0
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::InvalidWorkerCap))
        );
    }
}
