//! Config command handler

use crate::application::ports::ConfigStore;
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

const NOT_SET: &str = "(not set)";

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    ensure_known_key(key)?;

    let mut config = store.load().await?;
    apply_value(&mut config, key, value)?;
    store.save(&config).await?;

    let shown = if key == "password" {
        mask_secret(value)
    } else {
        value.to_string()
    };
    presenter.success(&format!("{} = {}", key, shown));

    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    ensure_known_key(key)?;

    let config = store.load().await?;
    presenter.output(&display_value(&config, key).unwrap_or_else(|| NOT_SET.to_string()));

    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;

    for key in VALID_CONFIG_KEYS {
        presenter.key_value(
            key,
            &display_value(&config, key).unwrap_or_else(|| NOT_SET.to_string()),
        );
    }

    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn ensure_known_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            key: key.to_string(),
            message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
        })
    }
}

/// Validate `value` and store it under `key`
fn apply_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = |message: &str| ConfigError::ValidationError {
        key: key.to_string(),
        message: message.to_string(),
    };

    let trimmed = value.trim();
    match key {
        "base_uri" => {
            if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
                return Err(invalid("Value must be an http:// or https:// URL"));
            }
            config.base_uri = Some(trimmed.to_string());
        }
        "username" | "password" => {
            if trimmed.is_empty() {
                return Err(invalid("Value must not be empty"));
            }
            let slot = if key == "username" {
                &mut config.username
            } else {
                &mut config.password
            };
            *slot = Some(value.to_string());
        }
        "buffer_size" => {
            let size = trimmed
                .parse::<usize>()
                .ok()
                .filter(|&size| size > 0)
                .ok_or_else(|| invalid("Value must be a positive number of bytes"))?;
            config.buffer_size = Some(size);
        }
        _ => return Err(invalid("Unknown key")),
    }
    Ok(())
}

/// Value of `key` as shown to the user; the password is masked
fn display_value(config: &AppConfig, key: &str) -> Option<String> {
    match key {
        "base_uri" => config.base_uri.clone(),
        "username" => config.username.clone(),
        "password" => config.password.as_deref().map(mask_secret),
        "buffer_size" => config.buffer_size.map(|size| size.to_string()),
        _ => None,
    }
}

/// Mask a secret for display (show first 4 and last 4 chars)
fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::XdgConfigStore;

    #[test]
    fn mask_secret_long() {
        assert_eq!(mask_secret("abcdefghijklmnop"), "abcd...mnop");
    }

    #[test]
    fn mask_secret_short() {
        assert_eq!(mask_secret("short"), "*****");
    }

    #[test]
    fn apply_base_uri() {
        let mut config = AppConfig::empty();
        apply_value(&mut config, "base_uri", " https://convert.example.com ").unwrap();
        assert_eq!(config.base_uri.as_deref(), Some("https://convert.example.com"));

        assert!(apply_value(&mut config, "base_uri", "ftp://nope").is_err());
    }

    #[test]
    fn apply_buffer_size() {
        let mut config = AppConfig::empty();
        apply_value(&mut config, "buffer_size", "4096").unwrap();
        assert_eq!(config.buffer_size, Some(4096));

        assert!(apply_value(&mut config, "buffer_size", "0").is_err());
        assert!(apply_value(&mut config, "buffer_size", "-1").is_err());
        assert!(apply_value(&mut config, "buffer_size", "big").is_err());
        assert_eq!(config.buffer_size, Some(4096));
    }

    #[test]
    fn apply_credentials() {
        let mut config = AppConfig::empty();
        apply_value(&mut config, "username", "relay").unwrap();
        apply_value(&mut config, "password", "s3cret").unwrap();
        assert_eq!(config.username.as_deref(), Some("relay"));
        assert_eq!(config.password.as_deref(), Some("s3cret"));

        assert!(apply_value(&mut config, "username", "  ").is_err());
    }

    #[test]
    fn password_is_masked_for_display() {
        let config = AppConfig {
            password: Some("a-very-long-secret".to_string()),
            ..Default::default()
        };
        assert_eq!(display_value(&config, "password").as_deref(), Some("a-ve...cret"));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = ensure_known_key("api_key").unwrap_err();
        assert!(err.to_string().contains("base_uri"));
    }

    #[tokio::test]
    async fn set_persists_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("config.toml"));
        let presenter = Presenter::new();

        handle_config_command(
            ConfigAction::Set {
                key: "buffer_size".to_string(),
                value: "8192".to_string(),
            },
            &store,
            &presenter,
        )
        .await
        .unwrap();

        assert_eq!(store.load().await.unwrap().buffer_size, Some(8192));
    }
}
