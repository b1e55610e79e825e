use crate::config::AppConfig;
use anyhow::Result;
use std::path::Path;
use std::str::FromStr;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

pub fn init_logging(config: &AppConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::from_str(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match &config.logging.file_path {
        Some(file_path) => {
            let path = Path::new(file_path);
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let file_appender = RollingFileAppender::new(
                Rotation::DAILY,
                dir,
                path.file_name().unwrap_or_default(),
            );
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            // guard 必须活到进程结束, 否则缓冲日志会丢
            Box::leak(Box::new(guard));

            if config.logging.json_format {
                let file_layer = fmt::layer()
                    .with_ansi(false)
                    .with_writer(non_blocking)
                    .json();
                registry
                    .with(fmt::layer().json().with_span_events(FmtSpan::CLOSE))
                    .with(file_layer)
                    .init();
            } else {
                let file_layer = fmt::layer().with_ansi(false).with_writer(non_blocking);
                registry
                    .with(fmt::layer().with_span_events(FmtSpan::CLOSE))
                    .with(file_layer)
                    .init();
            }
        }
        None => {
            if config.logging.json_format {
                registry
                    .with(fmt::layer().json().with_span_events(FmtSpan::CLOSE))
                    .init();
            } else {
                registry
                    .with(fmt::layer().with_span_events(FmtSpan::CLOSE))
                    .init();
            }
        }
    }

    tracing::info!("Logging initialized with level: {}", config.logging.level);
    Ok(())
}
