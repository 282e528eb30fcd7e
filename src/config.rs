//! Layered runtime configuration.
//!
//! Precedence, lowest to highest: built-in defaults, `gate.toml`, environment
//! variables prefixed with `GATE_` (sections separated by `__`, e.g.
//! `GATE_BASIC__BIND_ADDR`). `main` reads the process-wide [`CONFIG`]; the
//! rest of the crate takes configuration through constructors.

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use std::sync::LazyLock;
use url::Url;

pub static CONFIG: LazyLock<Config> =
    LazyLock::new(|| Config::load().unwrap_or_else(|e| panic!("invalid configuration: {e}")));

pub const DEFAULT_JWT_SECRET: &str = "insecure-dev-secret";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub auth: AuthConfig,
    pub proxy: ProxyConfig,
    pub cors: CorsConfig,
    pub routes: Vec<RouteRule>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub bind_addr: String,
    pub loglevel: String,
    pub database_url: String,
    /// Guards `/internal/*`; empty disables the admin surface entirely.
    pub admin_key: String,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub token_ttl_secs: i64,
    pub login_attempts_per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub retry_attempts: usize,
    /// Consecutive failures before an upstream is taken out of rotation.
    pub max_failures: u32,
    pub cooldown_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Scheme+host origin prefixes, matched on any port.
    pub allowed_origins: Vec<String>,
}

/// One forwarding rule: requests whose path starts with `prefix` (on a path
/// boundary) are dispatched to `upstream`.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteRule {
    pub id: String,
    pub prefix: String,
    pub upstream: Url,
    #[serde(default = "default_true")]
    pub require_auth: bool,
    #[serde(default)]
    pub strip_prefix: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            basic: BasicConfig::default(),
            auth: AuthConfig::default(),
            proxy: ProxyConfig::default(),
            cors: CorsConfig::default(),
            routes: Vec::new(),
        }
    }
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            loglevel: "info".to_string(),
            database_url: "sqlite:campus-gate.db".to_string(),
            admin_key: String::new(),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            issuer: "campus-gate".to_string(),
            token_ttl_secs: 86_400,
            login_attempts_per_minute: 10,
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
            retry_attempts: 3,
            max_failures: 3,
            cooldown_secs: 30,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost".to_string(),
                "http://127.0.0.1".to_string(),
                "http://[::1]".to_string(),
            ],
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("gate.toml"))
            .merge(Env::prefixed("GATE_").split("__"))
            .extract()
    }
}
