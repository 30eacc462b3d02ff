use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use app_authentication::LoginRateLimiter;
use app_config::AppConfig;
use app_database::db_connect::initialize_db;
use app_error::{AppError, AppErrorExt};
use micro_user::{
    routes,
    schema::create_schema,
    service::AuthService,
    telemetry::{init_sentry, init_tracing},
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = AppConfig::load()?;

    // keep the guard alive so buffered events are flushed on exit
    let _guard = init_sentry(&config.monitoring.sentry);
    init_tracing(&config.monitoring.logging)?;

    info!(
        environment = %config.environment,
        "Starting application at {}",
        chrono::Utc::now()
    );

    let db = initialize_db(&config).await?;

    let rate_limiter = Arc::new(LoginRateLimiter::from_settings(
        &config.security.rate_limiting.login,
    ));
    let auth_service =
        Arc::new(AuthService::new(db, &config.security)?.with_rate_limiter(rate_limiter));

    let schema = create_schema(Arc::clone(&auth_service));
    let app = routes::create_routes(schema, auth_service, &config);

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&address)
        .await
        .context(format!("Failed to bind to address: {}", address))
        .server_err()?;

    info!("GraphQL playground available at: http://{}", address);

    axum::serve(listener, app)
        .await
        .context("Server error")
        .server_err()?;

    Ok(())
}
