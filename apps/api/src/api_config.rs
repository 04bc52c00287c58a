use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use geogrant_core::AppError;
use tracing_subscriber::EnvFilter;

const MIN_SHARED_SECRET_LENGTH: usize = 32;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub database_max_connections: u32,
    pub api_host: String,
    pub api_port: u16,
    pub shared_secret: String,
    pub reconciler_batch_size: usize,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let database_url = required_non_empty_env("DATABASE_URL")?;
        let database_max_connections = parse_positive_env("DATABASE_MAX_CONNECTIONS", 10_u32)?;

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let shared_secret = if migrate_only {
            env::var("API_SHARED_SECRET").unwrap_or_default()
        } else {
            let secret = required_env("API_SHARED_SECRET")?;
            if secret.len() < MIN_SHARED_SECRET_LENGTH {
                return Err(AppError::Validation(format!(
                    "API_SHARED_SECRET must be at least {MIN_SHARED_SECRET_LENGTH} characters"
                )));
            }
            secret
        };

        let reconciler_batch_size = parse_positive_env("RECONCILER_BATCH_SIZE", 100_usize)?;

        Ok(Self {
            migrate_only,
            database_url,
            database_max_connections,
            api_host,
            api_port,
            shared_secret,
            reconciler_batch_size,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Validation(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn parse_positive_env<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let Ok(raw) = env::var(name) else {
        return Ok(default);
    };

    let value = raw
        .trim()
        .parse::<T>()
        .map_err(|error| AppError::Validation(format!("invalid {name}: {error}")))?;
    if value <= T::default() {
        return Err(AppError::Validation(format!(
            "{name} must be greater than zero"
        )));
    }

    Ok(value)
}
