use std::env;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub google_maps_api_base: String,
    pub google_maps_api_key: String,
    pub weather_api_base: String,
    pub weather_api_key: String,
    pub driver_directory_url: String,
    pub upstream_timeout: Duration,
    pub weather_sample_stride: usize,
    pub traffic_model_intercept: f64,
    pub traffic_model_slope: f64,
    pub offer_ttl: Duration,
    pub offer_sweep_interval: Duration,
    pub accepted_retention: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            google_maps_api_base: env::var("GOOGLE_MAPS_API_BASE")
                .unwrap_or_else(|_| "maps.googleapis.com".to_string()),
            google_maps_api_key: required("GOOGLE_MAPS_API_KEY")?,
            weather_api_base: env::var("WEATHER_API_BASE")
                .unwrap_or_else(|_| "api.openweathermap.org".to_string()),
            weather_api_key: required("WEATHER_API_KEY")?,
            driver_directory_url: required("DRIVER_DIRECTORY_URL")?,
            upstream_timeout: Duration::from_secs(parse_or_default("UPSTREAM_TIMEOUT_SECS", 10)?),
            weather_sample_stride: parse_or_default("WEATHER_SAMPLE_STRIDE", 30)?,
            traffic_model_intercept: parse_or_default("TRAFFIC_MODEL_INTERCEPT", 1.0)?,
            traffic_model_slope: parse_or_default("TRAFFIC_MODEL_SLOPE", 0.08)?,
            offer_ttl: Duration::from_secs(parse_or_default("OFFER_TTL_SECS", 300)?),
            offer_sweep_interval: Duration::from_secs(parse_or_default(
                "OFFER_SWEEP_INTERVAL_SECS",
                30,
            )?),
            accepted_retention: Duration::from_secs(parse_or_default(
                "ACCEPTED_RETENTION_SECS",
                86_400,
            )?),
        })
    }
}

fn required(key: &str) -> Result<String, AppError> {
    env::var(key).map_err(|_| AppError::Internal(format!("missing required {key}")))
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
