use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub http: HttpConfig,
    pub session: SessionConfig,
    pub redis: RedisConfig,
    pub admin: AdminConfig,
    pub smtp: SmtpConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub environment: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            environment: "development".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    /// The single origin allowed to read responses with credentials.
    pub allowed_origin: String,
    pub body_limit_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            allowed_origin: "http://localhost:5173".to_string(),
            body_limit_bytes: 1_048_576,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    /// Signs the session cookie; rotate to invalidate every cookie at once.
    pub secret: String,
    pub cookie_name: String,
    pub cookie_domain: Option<String>,
    pub ttl_seconds: u64,
    pub admin_ttl_seconds: u64,
    pub csrf_ttl_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: "dev-session-secret".to_string(),
            cookie_name: "aperture.sid".to_string(),
            cookie_domain: None,
            ttl_seconds: 86_400,
            admin_ttl_seconds: 7_200,
            csrf_ttl_seconds: 3_600,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct RedisConfig {
    /// When set, sessions are persisted to Redis instead of process memory.
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AdminConfig {
    pub username: String,
    pub password: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "changeme".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
    /// TLS from the first byte; leave off for local relays like MailHog.
    pub secure: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1025,
            username: String::new(),
            password: String::new(),
            from_address: "Aperture Studio <no-reply@aperture.studio>".to_string(),
            secure: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_seconds: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_seconds: 900,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default").required(false))
            // Add in the current environment file
            // Default to 'development' env
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of APERTURE)
            // Eg.. `APERTURE__SERVER__PORT=9000` would set the server port
            .add_source(config::Environment::with_prefix("APERTURE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_every_section() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.session.cookie_name, "aperture.sid");
        assert!(config.redis.url.is_none());
        assert_eq!(config.rate_limit.max_requests, 100);
    }
}
