use std::env;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_GATEWAY_BASE: &str = "https://api.razorpay.com/v1";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Process configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub gateway: GatewayConfig,
}

/// Everything the payment adapter needs; handed to it at construction.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub key_id: Option<String>,
    pub key_secret: Option<String>,
    pub webhook_secret: Option<String>,
    pub api_base: String,
    pub timeout: Duration,
    pub currency: String,
    pub merchant_name: String,
}

/// Credentials for one outbound call. Only obtainable when both halves are configured.
#[derive(Clone, Copy, Debug)]
pub struct Credentials<'a> {
    pub key_id: &'a str,
    pub key_secret: &'a str,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            key_id: None,
            key_secret: None,
            webhook_secret: None,
            api_base: DEFAULT_GATEWAY_BASE.to_string(),
            timeout: Duration::from_secs(10),
            currency: "INR".to_string(),
            merchant_name: "Furniture Shop".to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = GatewayConfig::default();
        let timeout = match optional("RAZORPAY_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.parse().map_err(|_| ConfigError::Invalid {
                name: "RAZORPAY_TIMEOUT_SECS",
                value: raw.clone(),
            })?),
            None => defaults.timeout,
        };
        Ok(GatewayConfig {
            key_id: optional("RAZORPAY_KEY_ID"),
            key_secret: optional("RAZORPAY_KEY_SECRET"),
            webhook_secret: optional("RAZORPAY_WEBHOOK_SECRET"),
            api_base: optional("RAZORPAY_API_BASE").unwrap_or(defaults.api_base),
            timeout,
            currency: optional("RAZORPAY_CURRENCY").unwrap_or(defaults.currency),
            merchant_name: optional("SHOP_NAME").unwrap_or(defaults.merchant_name),
        })
    }

    pub fn credentials(&self) -> Option<Credentials<'_>> {
        match (self.key_id.as_deref(), self.key_secret.as_deref()) {
            (Some(key_id), Some(key_secret)) => Some(Credentials { key_id, key_secret }),
            _ => None,
        }
    }
}

impl Settings {
    /// Loads `.env`, then the gateway credential files when the keys are still absent.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        if optional("RAZORPAY_KEY_ID").is_none() || optional("RAZORPAY_KEY_SECRET").is_none() {
            for file in ["pay.env", "payble.env"] {
                if dotenvy::from_filename(file).is_ok() {
                    tracing::debug!(file, "loaded gateway credentials file");
                }
            }
        }
        Self::from_env()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = optional("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let port = match optional("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: raw.clone(),
            })?,
            None => 8080,
        };
        Ok(Settings {
            database_url,
            redis_url: optional("REDIS_URL"),
            host: optional("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            gateway: GatewayConfig::from_env()?,
        })
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
