use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub location: LocationConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    /// Longest wait for a row lock inside a unit of work
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_ms: u64,
    /// Longest single statement inside a unit of work
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
    /// Bound on every cache round trip
    #[serde(default = "default_redis_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocationConfig {
    pub geocoder_url: String,
    pub router_url: String,
    #[serde(default = "default_location_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingConfig {
    #[serde(default = "default_simulation_ttl")]
    pub simulation_ttl_secs: u64,
    #[serde(default = "default_max_code_attempts")]
    pub max_code_attempts: usize,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            simulation_ttl_secs: default_simulation_ttl(),
            max_code_attempts: default_max_code_attempts(),
        }
    }
}

fn default_max_connections() -> u32 { 5 }
fn default_acquire_timeout() -> u64 { 3 }
fn default_lock_timeout() -> u64 { 5_000 }
fn default_statement_timeout() -> u64 { 15_000 }
fn default_redis_timeout() -> u64 { 2 }
fn default_location_timeout() -> u64 { 10 }
fn default_simulation_ttl() -> u64 { 3600 }
fn default_max_code_attempts() -> usize { 20 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Developer overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `RELAY_DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("RELAY").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_sections_fall_back_to_defaults() {
        let raw = r#"
            [server]
            port = 3000
            [database]
            url = "postgres://localhost/relay"
            [redis]
            url = "redis://127.0.0.1/"
            [location]
            geocoder_url = "http://localhost:8081/search"
            router_url = "http://localhost:8082/route"
            [auth]
            jwt_secret = "secret"
        "#;

        let cfg: Config = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.pricing.simulation_ttl_secs, 3600);
        assert_eq!(cfg.pricing.max_code_attempts, 20);
        assert_eq!(cfg.database.max_connections, 5);
        assert_eq!(cfg.database.lock_timeout_ms, 5_000);
        assert_eq!(cfg.database.statement_timeout_ms, 15_000);
        assert_eq!(cfg.location.timeout_secs, 10);
    }
}
