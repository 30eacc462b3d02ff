use app_config::{LoggingConfig, SentryConfig};
use app_error::{AppError, AppResult};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Start the Sentry client. Without a usable DSN error reporting stays off.
pub fn init_sentry(config: &SentryConfig) -> Option<sentry::ClientInitGuard> {
    if config.dsn.trim().is_empty() {
        return None;
    }

    let dsn = match config.dsn.parse::<sentry::types::Dsn>() {
        Ok(dsn) => dsn,
        Err(e) => {
            eprintln!("Ignoring invalid Sentry DSN: {}", e);
            return None;
        }
    };

    Some(sentry::init(sentry::ClientOptions {
        dsn: Some(dsn),
        release: sentry::release_name!(),
        environment: Some(config.environment.clone().into()),
        sample_rate: config.sample_rate,
        traces_sample_rate: config.traces_sample_rate,
        ..Default::default()
    }))
}

/// The configured level applies unless `RUST_LOG` is set.
pub fn log_filter(config: &LoggingConfig) -> AppResult<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Invalid log level '{}': {}",
                config.level,
                e
            ))
        })
}

pub fn init_tracing(config: &LoggingConfig) -> AppResult<()> {
    let registry = tracing_subscriber::registry()
        .with(log_filter(config)?)
        .with(sentry_tracing::layer());

    let result = match config.format.as_str() {
        "compact" => registry.with(fmt::layer().compact()).try_init(),
        "full" => registry.with(fmt::layer()).try_init(),
        _ => registry.with(fmt::layer().pretty()).try_init(),
    };

    result.map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!("Failed to set tracing subscriber: {}", e))
    })
}
