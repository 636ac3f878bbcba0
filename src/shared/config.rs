//! Application configuration. API credentials, endpoints, paths.
//!
//! Optional knobs come from the `TG_DIGEST_*` environment namespace (or a
//! config file via `TG_DIGEST_CONFIG`); the credential variables keep their
//! plain `.env` names: `BOT_TOKEN`, `CLIENT_ID`, `CLIENT_SECRET`, `API_ID`,
//! `API_HASH`, `SESSION_NAME`.

use crate::domain::DomainError;
use serde::Deserialize;
use std::path::PathBuf;

/// GigaChat OAuth client-credentials token endpoint.
pub const DEFAULT_OAUTH_URL: &str = "https://ngw.devices.sberbank.ru:9443/api/v2/oauth";

/// GigaChat chat-completions endpoint.
pub const DEFAULT_CHAT_URL: &str = "https://gigachat.devices.sberbank.ru/api/v1/chat/completions";

/// Default per-request timeout for GigaChat calls, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Bot API token. Read from BOT_TOKEN.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// GigaChat OAuth client id. Read from CLIENT_ID.
    #[serde(default)]
    pub client_id: Option<String>,

    /// GigaChat OAuth client secret. Read from CLIENT_SECRET.
    #[serde(default)]
    pub client_secret: Option<String>,

    /// MTProto application id. Read from API_ID. Get from https://my.telegram.org
    #[serde(default)]
    pub api_id: Option<i32>,

    /// MTProto application hash. Read from API_HASH.
    #[serde(default)]
    pub api_hash: Option<String>,

    /// Session file stem under the data dir. Read from SESSION_NAME.
    #[serde(default)]
    pub session_name: Option<String>,

    /// Base directory for the database, session and logs. Read from TG_DIGEST_DATA_DIR.
    #[serde(default)]
    pub data_dir: Option<String>,

    /// GigaChat OAuth endpoint override. Read from TG_DIGEST_OAUTH_URL.
    #[serde(default)]
    pub oauth_url: Option<String>,

    /// GigaChat chat-completions endpoint override. Read from TG_DIGEST_CHAT_URL.
    #[serde(default)]
    pub chat_url: Option<String>,

    /// GigaChat model name. Read from TG_DIGEST_MODEL.
    #[serde(default)]
    pub model: Option<String>,

    /// Per-request timeout in seconds for GigaChat calls. Read from TG_DIGEST_REQUEST_TIMEOUT_SECS.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Skip TLS certificate verification for GigaChat endpoints
    /// (corporate MITM proxies). Read from TG_DIGEST_INSECURE_TLS.
    #[serde(default)]
    pub insecure_tls: Option<bool>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix("TG_DIGEST"));
        if let Ok(path) = std::env::var("TG_DIGEST_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        let mut cfg: Self = c.build()?.try_deserialize()?;
        // Credential variables keep their unprefixed names so existing .env
        // files keep working.
        if cfg.bot_token.is_none() {
            cfg.bot_token = std::env::var("BOT_TOKEN").ok();
        }
        if cfg.client_id.is_none() {
            cfg.client_id = std::env::var("CLIENT_ID").ok();
        }
        if cfg.client_secret.is_none() {
            cfg.client_secret = std::env::var("CLIENT_SECRET").ok();
        }
        if cfg.api_id.is_none() {
            cfg.api_id = std::env::var("API_ID").ok().and_then(|s| s.parse().ok());
        }
        if cfg.api_hash.is_none() {
            cfg.api_hash = std::env::var("API_HASH").ok();
        }
        if cfg.session_name.is_none() {
            cfg.session_name = std::env::var("SESSION_NAME").ok();
        }
        Ok(cfg)
    }

    /// Base data directory. Defaults to `./data`.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(self.data_dir.as_deref().unwrap_or("./data"))
    }

    /// Path of the shared SQLite database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join("messages.db")
    }

    /// Path of the MTProto session file.
    pub fn session_path(&self) -> PathBuf {
        let stem = self.session_name.as_deref().unwrap_or("telegram_session");
        self.data_dir().join(format!("{stem}.session"))
    }

    pub fn oauth_url_or_default(&self) -> String {
        self.oauth_url
            .clone()
            .unwrap_or_else(|| DEFAULT_OAUTH_URL.to_string())
    }

    pub fn chat_url_or_default(&self) -> String {
        self.chat_url
            .clone()
            .unwrap_or_else(|| DEFAULT_CHAT_URL.to_string())
    }

    pub fn model_or_default(&self) -> String {
        self.model.clone().unwrap_or_else(|| "GigaChat".to_string())
    }

    pub fn request_timeout_secs_or_default(&self) -> u64 {
        self.request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
    }

    pub fn insecure_tls(&self) -> bool {
        self.insecure_tls.unwrap_or(false)
    }

    /// Bot API token, validated for the `digits:secret` shape. Startup-fatal
    /// for the bot subcommands when missing.
    pub fn require_bot_token(&self) -> Result<String, DomainError> {
        let token = self
            .bot_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                DomainError::Config(
                    "BOT_TOKEN is not set. Put BOT_TOKEN=<token from @BotFather> in .env".into(),
                )
            })?;
        if !token.contains(':') {
            return Err(DomainError::Config(
                "BOT_TOKEN looks malformed: expected the `123456789:ABC...` shape".into(),
            ));
        }
        Ok(token)
    }

    /// GigaChat OAuth credentials. Startup-fatal when either half is missing.
    pub fn require_gigachat_credentials(&self) -> Result<(String, String), DomainError> {
        let id = self.client_id.clone().filter(|s| !s.is_empty());
        let secret = self.client_secret.clone().filter(|s| !s.is_empty());
        match (id, secret) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(DomainError::Config(
                "CLIENT_ID and CLIENT_SECRET must be set in .env for GigaChat access".into(),
            )),
        }
    }

    /// MTProto credentials for the collector. Startup-fatal when missing.
    pub fn require_mtproto_credentials(&self) -> Result<(i32, String), DomainError> {
        let api_id = self.api_id.filter(|id| *id != 0).ok_or_else(|| {
            DomainError::Config(
                "API_ID is not set. Get credentials from https://my.telegram.org/apps".into(),
            )
        })?;
        let api_hash = self
            .api_hash
            .clone()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                DomainError::Config(
                    "API_HASH is not set. Get credentials from https://my.telegram.org/apps".into(),
                )
            })?;
        Ok((api_id, api_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> AppConfig {
        AppConfig::default()
    }

    #[test]
    fn missing_bot_token_is_a_config_error() {
        let err = empty().require_bot_token().unwrap_err();
        assert!(matches!(err, DomainError::Config(_)));
    }

    #[test]
    fn bot_token_without_colon_is_rejected() {
        let cfg = AppConfig {
            bot_token: Some("not-a-token".into()),
            ..AppConfig::default()
        };
        assert!(cfg.require_bot_token().is_err());
    }

    #[test]
    fn valid_bot_token_passes() {
        let cfg = AppConfig {
            bot_token: Some("123456789:ABCdefGHI".into()),
            ..AppConfig::default()
        };
        assert_eq!(cfg.require_bot_token().unwrap(), "123456789:ABCdefGHI");
    }

    #[test]
    fn gigachat_credentials_require_both_halves() {
        let cfg = AppConfig {
            client_id: Some("id".into()),
            ..AppConfig::default()
        };
        assert!(cfg.require_gigachat_credentials().is_err());
    }

    #[test]
    fn defaults_point_at_production_endpoints() {
        let cfg = empty();
        assert_eq!(cfg.oauth_url_or_default(), DEFAULT_OAUTH_URL);
        assert_eq!(cfg.chat_url_or_default(), DEFAULT_CHAT_URL);
        assert_eq!(cfg.model_or_default(), "GigaChat");
        assert_eq!(cfg.request_timeout_secs_or_default(), 30);
        assert!(cfg.db_path().ends_with("messages.db"));
        assert!(
            cfg.session_path()
                .to_string_lossy()
                .ends_with("telegram_session.session")
        );
    }
}
