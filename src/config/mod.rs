use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;

use crate::adapters::vnpay::VnpayConfig;

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub request_timeout: u64, // 秒
}

impl ServerConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64, // 秒
}

#[derive(Clone, Debug, Deserialize)]
pub struct PaymentConfig {
    pub intent_ttl_minutes: i64,
    pub sweep_interval_secs: u64,
    /// 无法定位商户时, 浏览器返回路径兜底跳转的页面
    pub fallback_return_url: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProvidersConfig {
    pub vnpay: VnpayConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
    pub file_path: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub payment: PaymentConfig,
    pub providers: ProvidersConfig,
    pub logging: LoggingConfig,
    pub environment: String,
    pub service_name: String,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let config_path = dotenvy::var("CONFIG_PATH").unwrap_or_else(|_| {
            format!("{}/config/application.toml", env!("CARGO_MANIFEST_DIR"))
        });

        info!("Loading configuration from {}", &config_path);

        let builder = Config::builder()
            .add_source(File::from(Path::new(&config_path)))
            .add_source(Environment::with_prefix("APP").separator("__"));

        let config = builder.build().context("Failed to build configuration")?;
        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(config)
    }

    pub fn is_development(&self) -> bool {
        self.environment.to_lowercase() == "development"
    }

    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }

    pub fn is_testing(&self) -> bool {
        self.environment.to_lowercase() == "testing"
    }
}
