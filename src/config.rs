//! Process configuration sourced from environment variables.
//!
//! Precedence: CLI flags (handled in `main`) > environment > built-in
//! defaults. The signing secret falls back to a hard-coded placeholder when
//! `JWT_SECRET` is unset — a documented weakness of the original deployment
//! that is kept as-is rather than silently tightened.

use std::time::Duration;

/// Placeholder signing secret used when `JWT_SECRET` is not set.
pub const DEFAULT_JWT_SECRET: &str = "sua_chave_secreta_super_segura_2024";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;

/// Bearer token lifetime: 24 hours (seconds).
const TOKEN_TTL_SECS: u64 = 24 * 3600;

/// Per-IP request budget and window for the gateway rate limiter.
const RATE_LIMIT_MAX_REQUESTS: u32 = 100;
const RATE_LIMIT_WINDOW_SECS: u64 = 15 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window: Duration,
}

impl Config {
    /// Read `HOST`, `PORT` and `JWT_SECRET` from the environment, falling
    /// back to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_owned());
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("JWT_SECRET not set, falling back to the built-in placeholder secret");
                DEFAULT_JWT_SECRET.to_owned()
            }
        };

        Self {
            host,
            port,
            jwt_secret,
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            jwt_secret: DEFAULT_JWT_SECRET.to_owned(),
            token_ttl: Duration::from_secs(TOKEN_TTL_SECS),
            rate_limit_max_requests: RATE_LIMIT_MAX_REQUESTS,
            rate_limit_window: Duration::from_secs(RATE_LIMIT_WINDOW_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_deployment() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.jwt_secret, DEFAULT_JWT_SECRET);
        assert_eq!(config.token_ttl, Duration::from_secs(86_400));
    }

    #[test]
    fn rate_limit_window_is_15_minutes() {
        let config = Config::default();
        assert_eq!(config.rate_limit_window, Duration::from_secs(900));
        assert_eq!(config.rate_limit_max_requests, 100);
    }
}
