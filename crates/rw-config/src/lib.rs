//! # rw-config
//!
//! Layered settings for Rusty-Wiki. Sources, lowest precedence first:
//! built-in defaults, `config/default.toml`, `config/{environment}.toml`,
//! then `WIKI__SECTION__KEY` environment variables. A `.env` file is read
//! into the environment before anything else.

use std::path::Path;

use config::{Config, Environment as EnvSource, File};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunEnvironment {
    #[default]
    Development,
    Production,
}

impl RunEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunEnvironment::Development => "development",
            RunEnvironment::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, RunEnvironment::Production)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Deadline applied to every service call made by a handler.
    pub request_timeout_secs: u64,
    pub body_limit_bytes: usize,
    /// CORS allow-list. Empty means same-origin only.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// May carry credentials, so it stays wrapped until the pool is built.
    #[serde(deserialize_with = "secret")]
    pub url: SecretString,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub session_ttl_hours: i64,
    pub cookie_name: String,
    /// Set the `Secure` attribute on the session cookie.
    pub cookie_secure: bool,
    pub max_failed_logins: u32,
    pub lock_minutes: i64,
    pub password_min_len: usize,
    pub password_require_mixed: bool,
    /// Accounts registered under these names are admins.
    #[serde(default)]
    pub admin_usernames: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    pub window_secs: u64,
    pub max_requests: u32,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub environment: RunEnvironment,
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub rate_limit: RateLimitSettings,
}

fn secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

impl Settings {
    /// Loads `.env`, then the layered sources rooted at `./config`.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::load_from(Path::new("config"))
    }

    /// Same as [`Settings::load`] without touching `.env`, reading the
    /// optional TOML files from `dir`.
    pub fn load_from(dir: &Path) -> Result<Self, ConfigError> {
        let environment = std::env::var("WIKI__ENVIRONMENT")
            .unwrap_or_else(|_| RunEnvironment::default().as_str().to_string());

        let settings: Settings = Config::builder()
            .set_default("environment", "development")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.request_timeout_secs", 10)?
            .set_default("server.body_limit_bytes", 2 * 1024 * 1024)?
            .set_default("server.allowed_origins", Vec::<String>::new())?
            .set_default("database.url", "sqlite://rusty_wiki.db")?
            .set_default("database.max_connections", 5)?
            .set_default("auth.session_ttl_hours", 24)?
            .set_default("auth.cookie_name", "wiki.sid")?
            .set_default("auth.cookie_secure", false)?
            .set_default("auth.max_failed_logins", 5)?
            .set_default("auth.lock_minutes", 120)?
            .set_default("auth.password_min_len", 6)?
            .set_default("auth.password_require_mixed", false)?
            .set_default("auth.admin_usernames", Vec::<String>::new())?
            .set_default("rate_limit.window_secs", 60)?
            .set_default("rate_limit.max_requests", 10)?
            .add_source(File::from(dir.join("default")).required(false))
            .add_source(File::from(dir.join(&environment)).required(false))
            .add_source(
                EnvSource::with_prefix("WIKI")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.allowed_origins")
                    .with_list_parse_key("auth.admin_usernames"),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Rejects settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        if self.server.host.trim().is_empty() {
            problems.push("server.host must not be empty");
        }
        if self.server.port == 0 {
            problems.push("server.port must not be 0");
        }
        if self.server.request_timeout_secs == 0 {
            problems.push("server.request_timeout_secs must be positive");
        }
        if self.database.max_connections == 0 {
            problems.push("database.max_connections must be positive");
        }
        if self.auth.session_ttl_hours <= 0 {
            problems.push("auth.session_ttl_hours must be positive");
        }
        if self.auth.max_failed_logins == 0 {
            problems.push("auth.max_failed_logins must be positive");
        }
        if self.auth.lock_minutes <= 0 {
            problems.push("auth.lock_minutes must be positive");
        }
        if self.rate_limit.window_secs == 0 || self.rate_limit.max_requests == 0 {
            problems.push("rate_limit budget must be positive");
        }
        if self.environment.is_production() && !self.auth.cookie_secure {
            tracing::warn!("auth.cookie_secure is off in production");
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems.join("; ")))
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::sync::Mutex;

    // Tests below mutate process-wide environment variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn empty_dir() -> std::path::PathBuf {
        std::env::temp_dir().join("rw-config-tests-no-such-dir")
    }

    #[test]
    fn defaults_apply_without_any_source() {
        let _guard = ENV_LOCK.lock().unwrap();
        let settings = Settings::load_from(&empty_dir()).unwrap();

        assert_eq!(settings.environment, RunEnvironment::Development);
        assert_eq!(settings.bind_address(), "127.0.0.1:3000");
        assert_eq!(settings.server.request_timeout_secs, 10);
        assert_eq!(settings.database.url.expose_secret(), "sqlite://rusty_wiki.db");
        assert_eq!(settings.auth.max_failed_logins, 5);
        assert_eq!(settings.auth.lock_minutes, 120);
        assert_eq!(settings.auth.cookie_name, "wiki.sid");
        assert!(settings.auth.admin_usernames.is_empty());
        assert_eq!(settings.rate_limit.max_requests, 10);
    }

    #[test]
    fn environment_variables_override_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("WIKI__SERVER__PORT", "8088");
        std::env::set_var("WIKI__AUTH__ADMIN_USERNAMES", "root,admin");
        let settings = Settings::load_from(&empty_dir());
        std::env::remove_var("WIKI__SERVER__PORT");
        std::env::remove_var("WIKI__AUTH__ADMIN_USERNAMES");

        let settings = settings.unwrap();
        assert_eq!(settings.server.port, 8088);
        assert_eq!(settings.auth.admin_usernames, vec!["root", "admin"]);
    }

    #[test]
    fn validate_collects_every_problem() {
        let _guard = ENV_LOCK.lock().unwrap();
        let mut settings = Settings::load_from(&empty_dir()).unwrap();
        settings.server.port = 0;
        settings.rate_limit.max_requests = 0;

        let err = settings.validate().unwrap_err().to_string();
        assert!(err.contains("server.port"));
        assert!(err.contains("rate_limit"));
    }

    #[test]
    fn debug_output_hides_the_database_url() {
        let _guard = ENV_LOCK.lock().unwrap();
        let settings = Settings::load_from(&empty_dir()).unwrap();
        assert!(!format!("{settings:?}").contains("rusty_wiki.db"));
    }
}
