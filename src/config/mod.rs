//! Configuration system (layered: code > env > config file).

pub mod credentials;

pub use credentials::ProviderCredentials;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(10_000);
pub const DEFAULT_SUCCESS_REDIRECT: &str = "/home";

const ENV_PREFIX: &str = "SWIFT_AUTH_";

/// Validated configuration for the provider client and poll orchestrator.
///
/// There is no default for `attempt_lifetime`: an attempt that is never bounded
/// would poll forever when the user walks away from the QR code.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use swift_qr_auth::config::AuthConfig;
///
/// let config = AuthConfig::builder()
///     .client_id("my-app")
///     .client_secret("s3cret")
///     .callback_url("https://app.example.com/swift-auth/callback")
///     .auth_url("https://id.example.com/auth")
///     .polling_url("https://id.example.com/auth/status")
///     .attempt_lifetime(Duration::from_secs(120))
///     .build();
/// config.validate()?;
/// # Ok::<(), swift_qr_auth::error::AuthError>(())
/// ```
#[derive(Clone, Builder)]
pub struct AuthConfig {
    #[builder(into)]
    pub client_id: String,
    #[builder(into)]
    pub client_secret: String,
    #[builder(into)]
    pub callback_url: String,
    #[builder(into)]
    pub auth_url: String,
    #[builder(into)]
    pub polling_url: String,
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    pub poll_interval: Duration,
    pub attempt_lifetime: Duration,
    #[builder(default = DEFAULT_REQUEST_TIMEOUT)]
    pub request_timeout: Duration,
    #[builder(into, default = DEFAULT_SUCCESS_REDIRECT.to_string())]
    pub success_redirect: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"..")
            .field("callback_url", &self.callback_url)
            .field("auth_url", &self.auth_url)
            .field("polling_url", &self.polling_url)
            .field("poll_interval", &self.poll_interval)
            .field("attempt_lifetime", &self.attempt_lifetime)
            .field("request_timeout", &self.request_timeout)
            .field("success_redirect", &self.success_redirect)
            .finish()
    }
}

impl AuthConfig {
    /// Load from `SWIFT_AUTH_*` environment variables (a `.env` file is honoured).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        AuthSettings::from_env()?.into_config()
    }

    /// Load the config file (explicit path, or the default path when it exists)
    /// and apply environment overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let file = match path {
            Some(path) => AuthSettings::load_from_path(path)?,
            None => {
                let default = Self::default_path();
                if default.exists() {
                    AuthSettings::load_from_path(&default)?
                } else {
                    AuthSettings::default()
                }
            }
        };
        file.merge(AuthSettings::from_env()?).into_config()
    }

    /// Default config file path (`~/.swift-auth/config.toml`).
    pub fn default_path() -> PathBuf {
        directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().join(".swift-auth"))
            .unwrap_or_else(|| PathBuf::from(".swift-auth"))
            .join("config.toml")
    }

    /// Reject configurations the protocol cannot run with.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("clientId", &self.client_id),
            ("clientSecret", &self.client_secret),
            ("callbackUrl", &self.callback_url),
        ] {
            if value.trim().is_empty() {
                return Err(AuthError::Configuration(format!("{name} must not be empty")));
            }
        }
        for (name, value) in [("authUrl", &self.auth_url), ("pollingUrl", &self.polling_url)] {
            reqwest::Url::parse(value)
                .map_err(|e| AuthError::Configuration(format!("{name} is not a valid URL: {e}")))?;
        }
        if self.poll_interval.is_zero() {
            return Err(AuthError::Configuration(
                "pollIntervalMs must be greater than zero".to_string(),
            ));
        }
        if self.attempt_lifetime < self.poll_interval {
            return Err(AuthError::Configuration(format!(
                "attemptLifetimeMs ({}) must be at least pollIntervalMs ({})",
                self.attempt_lifetime.as_millis(),
                self.poll_interval.as_millis()
            )));
        }
        Ok(())
    }

    /// Build the credentials (and their encoded header) for provider calls.
    pub fn credentials(&self) -> Result<ProviderCredentials> {
        ProviderCredentials::new(&self.client_id, &self.client_secret)
    }
}

/// Raw, partially filled settings as read from a file or the environment.
///
/// Keys use the provider's camelCase names (`clientId`, `pollIntervalMs`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AuthSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub callback_url: Option<String>,
    pub auth_url: Option<String>,
    pub polling_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub attempt_lifetime_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub success_redirect: Option<String>,
}

impl AuthSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary variable lookup (`SWIFT_AUTH_CLIENT_ID`, ...).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |key: &str| lookup(&format!("{ENV_PREFIX}{key}"));
        let millis = |key: &str| -> Result<Option<u64>> {
            let name = format!("{ENV_PREFIX}{key}");
            lookup(&name)
                .map(|raw| {
                    raw.trim().parse::<u64>().map_err(|_| {
                        AuthError::Configuration(format!("{name} must be milliseconds, got {raw:?}"))
                    })
                })
                .transpose()
        };

        Ok(Self {
            client_id: text("CLIENT_ID"),
            client_secret: text("CLIENT_SECRET"),
            callback_url: text("CALLBACK_URL"),
            auth_url: text("AUTH_URL"),
            polling_url: text("POLLING_URL"),
            poll_interval_ms: millis("POLL_INTERVAL_MS")?,
            attempt_lifetime_ms: millis("ATTEMPT_LIFETIME_MS")?,
            request_timeout_ms: millis("REQUEST_TIMEOUT_MS")?,
            success_redirect: text("SUCCESS_REDIRECT"),
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            AuthError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Layer `overrides` on top of `self`; set fields in `overrides` win.
    pub fn merge(self, overrides: AuthSettings) -> AuthSettings {
        AuthSettings {
            client_id: overrides.client_id.or(self.client_id),
            client_secret: overrides.client_secret.or(self.client_secret),
            callback_url: overrides.callback_url.or(self.callback_url),
            auth_url: overrides.auth_url.or(self.auth_url),
            polling_url: overrides.polling_url.or(self.polling_url),
            poll_interval_ms: overrides.poll_interval_ms.or(self.poll_interval_ms),
            attempt_lifetime_ms: overrides.attempt_lifetime_ms.or(self.attempt_lifetime_ms),
            request_timeout_ms: overrides.request_timeout_ms.or(self.request_timeout_ms),
            success_redirect: overrides.success_redirect.or(self.success_redirect),
        }
    }

    /// Fill defaults, check required options and validate.
    pub fn into_config(self) -> Result<AuthConfig> {
        fn required(value: Option<String>, name: &str) -> Result<String> {
            value.ok_or_else(|| AuthError::Configuration(format!("{name} is required")))
        }

        let attempt_lifetime_ms = self.attempt_lifetime_ms.ok_or_else(|| {
            AuthError::Configuration("attemptLifetimeMs is required".to_string())
        })?;

        let config = AuthConfig {
            client_id: required(self.client_id, "clientId")?,
            client_secret: required(self.client_secret, "clientSecret")?,
            callback_url: required(self.callback_url, "callbackUrl")?,
            auth_url: required(self.auth_url, "authUrl")?,
            polling_url: required(self.polling_url, "pollingUrl")?,
            poll_interval: self
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            attempt_lifetime: Duration::from_millis(attempt_lifetime_ms),
            request_timeout: self
                .request_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            success_redirect: self
                .success_redirect
                .unwrap_or_else(|| DEFAULT_SUCCESS_REDIRECT.to_string()),
        };
        config.validate()?;
        Ok(config)
    }
}

impl TryFrom<AuthSettings> for AuthConfig {
    type Error = AuthError;

    fn try_from(settings: AuthSettings) -> Result<Self> {
        settings.into_config()
    }
}
