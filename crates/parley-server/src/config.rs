//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;

use parley_shared::constants::HEARTBEAT_INTERVAL_SECS;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP/WebSocket (axum) server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Coordination store connection URL.
    /// Env: `REDIS_URL`
    /// Default: `redis://127.0.0.1:6379`
    pub redis_url: String,

    /// HMAC secret for session tokens.
    /// Env: `JWT_SECRET`
    /// Default: a development-only value (warns at startup).
    pub jwt_secret: String,

    /// Session token lifetime in seconds.
    /// Env: `TOKEN_TTL_SECS`
    /// Default: 7 days.
    pub token_ttl_secs: u64,

    /// Seconds between presence heartbeats on each connection.
    /// Env: `HEARTBEAT_INTERVAL_SECS`
    /// Default: 10.
    pub heartbeat_interval_secs: u64,

    /// Whether to broadcast `user_online`/`user_offline` to every
    /// connected peer. On-demand lookup stays available either way; this
    /// global fan-out does not scale past a small user base.
    /// Env: `PRESENCE_BROADCAST` (true/false)
    /// Default: `true`
    pub presence_broadcast: bool,

    /// Include the issued OTP in the send-otp response instead of
    /// delivering it over SMS. Development only.
    /// Env: `EXPOSE_OTP` (true/false)
    /// Default: `false`
    pub expose_otp: bool,
}

const DEV_JWT_SECRET: &str = "parley-dev-secret";

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_secs: 7 * 24 * 3600,
            heartbeat_interval_secs: HEARTBEAT_INTERVAL_SECS,
            presence_broadcast: true,
            expose_otp: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(url) = std::env::var("REDIS_URL") {
            config.redis_url = url;
        }

        if let Ok(secret) = std::env::var("JWT_SECRET") {
            if !secret.is_empty() {
                config.jwt_secret = secret;
            }
        }
        if config.jwt_secret == DEV_JWT_SECRET {
            tracing::warn!("JWT_SECRET not set, using development-only default");
        }

        if let Ok(val) = std::env::var("TOKEN_TTL_SECS") {
            if let Ok(n) = val.parse::<u64>() {
                config.token_ttl_secs = n;
            }
        }

        if let Ok(val) = std::env::var("HEARTBEAT_INTERVAL_SECS") {
            if let Ok(n) = val.parse::<u64>() {
                config.heartbeat_interval_secs = n;
            }
        }

        if let Ok(val) = std::env::var("PRESENCE_BROADCAST") {
            config.presence_broadcast = val != "false" && val != "0";
        }

        if let Ok(val) = std::env::var("EXPOSE_OTP") {
            config.expose_otp = val == "true" || val == "1";
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.heartbeat_interval_secs, 10);
        assert!(config.presence_broadcast);
        assert!(!config.expose_otp);
    }
}
