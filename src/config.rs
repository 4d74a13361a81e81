use std::env;

use teloxide::types::{ChatId, UserId};
use thiserror::Error;

const DEFAULT_WEBHOOK_HOST: &str = "0.0.0.0";
const DEFAULT_WEBHOOK_PORT: u16 = 8080;
const DEFAULT_PENDING_TTL_SECS: u64 = 900;
const DEFAULT_SCHEDULE_INTERVAL_SECS: u64 = 86_400;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidVar(&'static str, String),
}

/// Which storage adapter backs the `BotStorage` trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Rest,
}

/// Represents the application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// The Telegram bot token.
    pub telegram_bot_token: String,
    /// Base URL of the external workflow engine's webhook endpoints.
    pub workflow_base_url: String,
    /// Numeric ids of operators allowed to use the bot.
    pub admin_user_ids: Vec<UserId>,
    /// Operator on whose behalf scheduled searches run.
    pub content_operator_id: UserId,
    /// Host the callback HTTP server binds to.
    pub webhook_host: String,
    /// Port the callback HTTP server binds to.
    pub webhook_port: u16,
    /// Storage adapter selection.
    pub storage_backend: StorageBackend,
    /// Base URL of the remote REST store (required for the `rest` backend).
    pub rest_base_url: Option<String>,
    /// API key for the remote REST store.
    pub rest_api_key: Option<String>,
    /// Seconds after which an unanswered pending request is considered stale.
    pub pending_ttl_secs: u64,
    /// Seconds between scheduled search fan-outs; 0 disables the scheduler.
    pub schedule_interval_secs: u64,
    /// Fallback channel for the `/posts` broadcast endpoint.
    pub default_channel_chat_id: Option<ChatId>,
}

impl Config {
    /// Creates a new `Config` instance from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let telegram_bot_token =
            env::var("TELOXIDE_TOKEN").map_err(|_| ConfigError::MissingVar("TELOXIDE_TOKEN"))?;
        let workflow_base_url = env::var("WORKFLOW_BASE_URL")
            .map_err(|_| ConfigError::MissingVar("WORKFLOW_BASE_URL"))?
            .trim_end_matches('/')
            .to_string();

        let admin_user_ids = parse_admin_ids(
            &env::var("ADMIN_USER_IDS").map_err(|_| ConfigError::MissingVar("ADMIN_USER_IDS"))?,
        )?;

        let content_operator_id = match env::var("CONTENT_OPERATOR_ID") {
            Ok(raw) => UserId(
                raw.parse()
                    .map_err(|_| ConfigError::InvalidVar("CONTENT_OPERATOR_ID", raw.clone()))?,
            ),
            // First allow-listed operator by default.
            Err(_) => admin_user_ids[0],
        };

        let storage_backend = match env::var("STORAGE_BACKEND").ok().as_deref() {
            Some("rest") => StorageBackend::Rest,
            Some("memory") | None => StorageBackend::Memory,
            Some(other) => {
                return Err(ConfigError::InvalidVar("STORAGE_BACKEND", other.to_string()));
            }
        };

        let rest_base_url =
            env::var("REST_BASE_URL").ok().map(|v| v.trim_end_matches('/').to_string());
        let rest_api_key = env::var("REST_API_KEY").ok();
        if storage_backend == StorageBackend::Rest {
            if rest_base_url.is_none() {
                return Err(ConfigError::MissingVar("REST_BASE_URL"));
            }
            if rest_api_key.is_none() {
                return Err(ConfigError::MissingVar("REST_API_KEY"));
            }
        }

        let default_channel_chat_id = match env::var("DEFAULT_CHANNEL_CHAT_ID") {
            Ok(raw) => Some(ChatId(raw.parse().map_err(|_| {
                ConfigError::InvalidVar("DEFAULT_CHANNEL_CHAT_ID", raw.clone())
            })?)),
            Err(_) => None,
        };

        Ok(Self {
            telegram_bot_token,
            workflow_base_url,
            admin_user_ids,
            content_operator_id,
            webhook_host: env::var("WEBHOOK_HOST")
                .unwrap_or_else(|_| DEFAULT_WEBHOOK_HOST.to_string()),
            webhook_port: env::var("WEBHOOK_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_WEBHOOK_PORT),
            storage_backend,
            rest_base_url,
            rest_api_key,
            pending_ttl_secs: env::var("PENDING_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PENDING_TTL_SECS),
            schedule_interval_secs: env::var("SCHEDULE_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SCHEDULE_INTERVAL_SECS),
            default_channel_chat_id,
        })
    }

    /// Checks whether the given user may run bot commands.
    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admin_user_ids.contains(&user_id)
    }
}

fn parse_admin_ids(raw: &str) -> Result<Vec<UserId>, ConfigError> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map(UserId)
                .map_err(|_| ConfigError::InvalidVar("ADMIN_USER_IDS", raw.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if ids.is_empty() {
        return Err(ConfigError::MissingVar("ADMIN_USER_IDS"));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use temp_env::with_vars;

    use super::*;

    fn base_vars() -> Vec<(&'static str, Option<&'static str>)> {
        vec![
            ("TELOXIDE_TOKEN", Some("test telegram bot token")),
            ("WORKFLOW_BASE_URL", Some("https://workflow.example.com/webhook/")),
            ("ADMIN_USER_IDS", Some("111, 222")),
            ("CONTENT_OPERATOR_ID", None),
            ("STORAGE_BACKEND", None),
            ("PENDING_TTL_SECS", None),
            ("WEBHOOK_PORT", None),
        ]
    }

    #[test]
    fn test_from_env() {
        with_vars(base_vars(), || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.telegram_bot_token, "test telegram bot token");
            // The trailing slash is trimmed so endpoint paths can be appended.
            assert_eq!(config.workflow_base_url, "https://workflow.example.com/webhook");
            assert_eq!(config.admin_user_ids, vec![UserId(111), UserId(222)]);
            assert_eq!(config.content_operator_id, UserId(111));
            assert_eq!(config.webhook_port, DEFAULT_WEBHOOK_PORT);
            assert_eq!(config.storage_backend, StorageBackend::Memory);
            assert_eq!(config.pending_ttl_secs, DEFAULT_PENDING_TTL_SECS);
        });
    }

    #[test]
    fn test_missing_token_error() {
        let mut vars = base_vars();
        vars.push(("TELOXIDE_TOKEN", None));
        with_vars(vars, || {
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    fn test_invalid_admin_ids_error() {
        let mut vars = base_vars();
        vars.push(("ADMIN_USER_IDS", Some("not-a-number")));
        with_vars(vars, || {
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    fn test_rest_backend_requires_credentials() {
        let mut vars = base_vars();
        vars.push(("STORAGE_BACKEND", Some("rest")));
        vars.push(("REST_BASE_URL", None));
        vars.push(("REST_API_KEY", None));
        with_vars(vars, || {
            assert!(Config::from_env().is_err());
        });

        let mut vars = base_vars();
        vars.push(("STORAGE_BACKEND", Some("rest")));
        vars.push(("REST_BASE_URL", Some("https://db.example.com/")));
        vars.push(("REST_API_KEY", Some("secret")));
        with_vars(vars, || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.storage_backend, StorageBackend::Rest);
            assert_eq!(config.rest_base_url.as_deref(), Some("https://db.example.com"));
        });
    }

    #[test]
    fn test_explicit_operator_id() {
        let mut vars = base_vars();
        vars.push(("CONTENT_OPERATOR_ID", Some("222")));
        with_vars(vars, || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.content_operator_id, UserId(222));
        });
    }

    #[test]
    fn test_is_admin() {
        with_vars(base_vars(), || {
            let config = Config::from_env().unwrap();
            assert!(config.is_admin(UserId(111)));
            assert!(!config.is_admin(UserId(333)));
        });
    }
}
