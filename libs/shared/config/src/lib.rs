use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub idle_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/clinic.db?mode=rwc".to_string(),
            max_connections: 20,
            min_connections: 5,
            idle_timeout: Duration::from_secs(30),
        }
    }
}

/// Credentials for the reverse-proxy basic-auth gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuthCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub server_host: String,
    pub server_port: u16,
    pub database: DatabaseConfig,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub basic_auth: Option<BasicAuthCredentials>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| {
            let path = env::var("DB_PATH").unwrap_or_else(|_| {
                warn!("DATABASE_URL and DB_PATH not set, using data/clinic.db");
                "data/clinic.db".to_string()
            });
            format!("sqlite://{}?mode=rwc", path)
        });

        let defaults = DatabaseConfig::default();
        let database = DatabaseConfig {
            url: database_url,
            max_connections: parse_or("DB_MAX_CONNECTIONS", defaults.max_connections),
            min_connections: parse_or("DB_MIN_CONNECTIONS", defaults.min_connections),
            idle_timeout: Duration::from_secs(parse_or(
                "DB_IDLE_TIMEOUT_SECS",
                defaults.idle_timeout.as_secs(),
            )),
        };

        let basic_auth = match (env::var("BASIC_AUTH_USER"), env::var("BASIC_AUTH_PASSWORD")) {
            (Ok(username), Ok(password)) if !username.is_empty() && !password.is_empty() => {
                Some(BasicAuthCredentials { username, password })
            }
            (Ok(_), Err(_)) | (Err(_), Ok(_)) => {
                warn!("Only one of BASIC_AUTH_USER / BASIC_AUTH_PASSWORD set, basic auth gate disabled");
                None
            }
            _ => None,
        };

        let config = Self {
            environment: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parse_or("SERVER_PORT", 3000),
            database,
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| {
                warn!("JWT_SECRET not set, using empty value");
                String::new()
            }),
            jwt_expiry_hours: parse_or("JWT_EXPIRY_HOURS", 24),
            basic_auth,
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.jwt_secret.is_empty() && !self.database.url.is_empty()
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_defaults_match_pool_bounds() {
        let db = DatabaseConfig::default();
        assert_eq!(db.max_connections, 20);
        assert_eq!(db.min_connections, 5);
        assert_eq!(db.idle_timeout, Duration::from_secs(30));
    }

    #[test]
    fn parse_or_falls_back_on_garbage() {
        std::env::set_var("SHARED_CONFIG_TEST_PORT", "not-a-number");
        assert_eq!(parse_or("SHARED_CONFIG_TEST_PORT", 3000u16), 3000);
        std::env::set_var("SHARED_CONFIG_TEST_PORT", " 8080 ");
        assert_eq!(parse_or("SHARED_CONFIG_TEST_PORT", 3000u16), 8080);
        std::env::remove_var("SHARED_CONFIG_TEST_PORT");
    }
}
