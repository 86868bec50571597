//! Token issuance settings.

use std::time::Duration;

use thiserror::Error;

/// Secrets shorter than this still work but get a startup warning.
pub const MIN_RECOMMENDED_SECRET_LEN: usize = 32;

pub const DEFAULT_ACCESS_TTL_SECS: u64 = 1800;
pub const DEFAULT_REFRESH_TTL_SECS: u64 = 604_800;

const DEV_SECRET: &str = "tollgate-dev-secret-change-me-please-0123456789";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a whole number of seconds, got '{value}'")]
    InvalidTtl { var: &'static str, value: String },

    #[error("signing secret must not be empty")]
    EmptySecret,
}

/// Signing secret plus token lifetimes.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl core::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

impl AuthConfig {
    /// Config with default lifetimes.
    pub fn new(secret: impl Into<String>) -> Result<Self, ConfigError> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        if secret.len() < MIN_RECOMMENDED_SECRET_LEN {
            tracing::warn!(
                len = secret.len(),
                recommended = MIN_RECOMMENDED_SECRET_LEN,
                "signing secret is shorter than recommended"
            );
        }
        Ok(Self {
            secret,
            access_ttl: Duration::from_secs(DEFAULT_ACCESS_TTL_SECS),
            refresh_ttl: Duration::from_secs(DEFAULT_REFRESH_TTL_SECS),
        })
    }

    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    /// Read `JWT_SECRET`, `JWT_ACCESS_TTL_SECS` and `JWT_REFRESH_TTL_SECS`.
    ///
    /// A missing secret falls back to an insecure development value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AuthConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_SECRET.to_string()
        });

        let mut config = Self::new(secret)?;
        if let Some(ttl) = parse_ttl(&lookup, "JWT_ACCESS_TTL_SECS")? {
            config.access_ttl = ttl;
        }
        if let Some(ttl) = parse_ttl(&lookup, "JWT_REFRESH_TTL_SECS")? {
            config.refresh_ttl = ttl;
        }
        Ok(config)
    }
}

fn parse_ttl<F>(lookup: &F, var: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| ConfigError::InvalidTtl { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = AuthConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.access_ttl, Duration::from_secs(1800));
        assert_eq!(config.refresh_ttl, Duration::from_secs(604_800));
        assert!(config.secret.len() >= MIN_RECOMMENDED_SECRET_LEN);
    }

    #[test]
    fn env_overrides_are_read() {
        let config = AuthConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "an-explicit-secret-that-is-long-enough!!"),
            ("JWT_ACCESS_TTL_SECS", "60"),
            ("JWT_REFRESH_TTL_SECS", " 120 "),
        ]))
        .unwrap();
        assert_eq!(config.secret, "an-explicit-secret-that-is-long-enough!!");
        assert_eq!(config.access_ttl, Duration::from_secs(60));
        assert_eq!(config.refresh_ttl, Duration::from_secs(120));
    }

    #[test]
    fn bad_ttl_is_an_error() {
        let err = AuthConfig::from_lookup(lookup(&[("JWT_ACCESS_TTL_SECS", "soon")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidTtl {
                var: "JWT_ACCESS_TTL_SECS",
                value: "soon".into()
            }
        );
    }

    #[test]
    fn huge_ttl_is_accepted_and_saturates_in_the_codec() {
        let config = AuthConfig::from_lookup(lookup(&[
            ("JWT_ACCESS_TTL_SECS", "100000000000000000"),
            ("JWT_REFRESH_TTL_SECS", "18446744073709551615"),
        ]))
        .unwrap();
        let codec = crate::TokenCodec::new(&config);
        assert_eq!(codec.access_ttl(), chrono::Duration::MAX);
        assert_eq!(codec.refresh_ttl(), chrono::Duration::MAX);
    }

    #[test]
    fn blank_secret_is_rejected() {
        assert_eq!(AuthConfig::new("   ").unwrap_err(), ConfigError::EmptySecret);
    }

    #[test]
    fn debug_hides_secret() {
        let config = AuthConfig::new("super-secret-value-super-secret-value").unwrap();
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
