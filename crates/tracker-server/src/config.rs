//! Server configuration.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. The file named by `TRACKER_CONFIG`, then `./config/tracker`
//! 3. `TRACKER__*` environment variables (e.g. `TRACKER__DB__URL`)

use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tracker_auth::AuthConfig;
use tracker_db::DbConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub db: DbConfig,
    pub auth: AuthSettings,
    #[serde(default)]
    pub log: LogSettings,
}

/// Token, password and two-factor settings as they appear on disk.
/// Keys are read from PEM files; the phone key is 64 hex characters.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub jwt_private_key_path: PathBuf,
    pub jwt_public_key_path: PathBuf,
    pub jwt_issuer: String,
    pub access_token_lifetime_secs: u64,
    pub refresh_token_lifetime_secs: u64,
    pub remember_me_lifetime_secs: u64,
    pub sign_up_token_lifetime_secs: u64,
    pub authenticate_token_lifetime_secs: u64,
    #[serde(default)]
    pub pepper: Option<String>,
    pub min_password_length: usize,
    pub max_failed_login_attempts: u32,
    #[serde(default)]
    pub phone_encryption_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "tracker=info".into(),
            json: true,
        }
    }
}

impl ServerConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Self::set_defaults(Config::builder())?;

        if let Ok(path) = std::env::var("TRACKER_CONFIG") {
            builder = builder.add_source(File::with_name(&path).required(false));
        }
        builder = builder
            .add_source(File::with_name("./config/tracker").required(false))
            .add_source(
                Environment::with_prefix("TRACKER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: ServerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let auth = AuthConfig::default();
        builder
            .set_default("auth.jwt_private_key_path", "./keys/jwt.pem")?
            .set_default("auth.jwt_public_key_path", "./keys/jwt.pub.pem")?
            .set_default("auth.jwt_issuer", auth.jwt_issuer)?
            .set_default("auth.access_token_lifetime_secs", auth.access_token_lifetime_secs)?
            .set_default("auth.refresh_token_lifetime_secs", auth.refresh_token_lifetime_secs)?
            .set_default("auth.remember_me_lifetime_secs", auth.remember_me_lifetime_secs)?
            .set_default("auth.sign_up_token_lifetime_secs", auth.sign_up_token_lifetime_secs)?
            .set_default(
                "auth.authenticate_token_lifetime_secs",
                auth.authenticate_token_lifetime_secs,
            )?
            .set_default("auth.min_password_length", auth.min_password_length as u64)?
            .set_default(
                "auth.max_failed_login_attempts",
                u64::from(auth.max_failed_login_attempts),
            )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let auth = &self.auth;
        if auth.jwt_issuer.trim().is_empty() {
            return Err(ConfigError::Message("auth.jwt_issuer must not be empty".into()));
        }
        if auth.access_token_lifetime_secs == 0 || auth.refresh_token_lifetime_secs == 0 {
            return Err(ConfigError::Message(
                "auth token lifetimes must be > 0".into(),
            ));
        }
        if auth.remember_me_lifetime_secs < auth.refresh_token_lifetime_secs {
            return Err(ConfigError::Message(
                "auth.remember_me_lifetime_secs must be >= refresh_token_lifetime_secs".into(),
            ));
        }
        if auth.min_password_length == 0 {
            return Err(ConfigError::Message(
                "auth.min_password_length must be > 0".into(),
            ));
        }
        if auth.max_failed_login_attempts == 0 {
            return Err(ConfigError::Message(
                "auth.max_failed_login_attempts must be > 0".into(),
            ));
        }
        if let Some(key) = &auth.phone_encryption_key {
            decode_phone_key(key)?;
        }
        Ok(())
    }

    /// Read the key files and build the runtime [`AuthConfig`].
    pub fn auth_config(&self) -> Result<AuthConfig, ConfigError> {
        let auth = &self.auth;
        let phone_encryption_key = auth
            .phone_encryption_key
            .as_deref()
            .map(decode_phone_key)
            .transpose()?;
        Ok(AuthConfig {
            jwt_private_key_pem: read_key(&auth.jwt_private_key_path)?,
            jwt_public_key_pem: read_key(&auth.jwt_public_key_path)?,
            jwt_issuer: auth.jwt_issuer.clone(),
            access_token_lifetime_secs: auth.access_token_lifetime_secs,
            refresh_token_lifetime_secs: auth.refresh_token_lifetime_secs,
            remember_me_lifetime_secs: auth.remember_me_lifetime_secs,
            sign_up_token_lifetime_secs: auth.sign_up_token_lifetime_secs,
            authenticate_token_lifetime_secs: auth.authenticate_token_lifetime_secs,
            pepper: auth.pepper.clone(),
            min_password_length: auth.min_password_length,
            max_failed_login_attempts: auth.max_failed_login_attempts,
            phone_encryption_key,
        })
    }
}

fn read_key(path: &PathBuf) -> Result<String, ConfigError> {
    std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Message(format!("unable to read {}: {e}", path.display())))
}

fn decode_phone_key(raw: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = hex::decode(raw.trim())
        .map_err(|e| ConfigError::Message(format!("auth.phone_encryption_key: {e}")))?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
        ConfigError::Message("auth.phone_encryption_key must be 32 bytes of hex".into())
    })
}
