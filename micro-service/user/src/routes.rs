use crate::{
    handlers::graphql::{graphql_handler, graphql_playground, health_check},
    schema::ApiSchema,
    service::{AuthService, AuthServiceTrait},
};
use std::{sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use axum::{
    Router,
    extract::Extension,
    http::{HeaderName, HeaderValue, Method},
    routing::get,
};

use app_config::{AppConfig, CorsConfig};
use app_error::middleware_handling::error_handling_middleware;

fn cors_layer(cors_config: &CorsConfig) -> CorsLayer {
    // "*" allows any origin, otherwise only the exact list
    let origins = if cors_config.allowed_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            cors_config
                .allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        )
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(
            cors_config
                .allowed_methods
                .iter()
                .filter_map(|method| method.parse::<Method>().ok())
                .collect::<Vec<_>>(),
        )
        .allow_headers(
            cors_config
                .allowed_headers
                .iter()
                .filter_map(|header| header.parse::<HeaderName>().ok())
                .collect::<Vec<_>>(),
        )
}

pub fn create_routes(schema: ApiSchema, auth_service: Arc<AuthService>, config: &AppConfig) -> Router {
    let jwt_service = auth_service.get_jwt_service();

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(config.server.request_timeout)))
        .layer(cors_layer(&config.security.cors));

    let app = Router::new()
        .route("/", get(graphql_playground))
        .route("/health", get(health_check))
        .route("/graphql", get(graphql_playground).post(graphql_handler));

    let app = app
        .layer(Extension(schema))
        .layer(Extension(jwt_service));

    // outermost, so it also sees the 413 and 408 produced by the limit and timeout layers
    app.layer(RequestBodyLimitLayer::new(config.server.body_limit))
        .layer(middleware_stack)
        .layer(axum::middleware::from_fn(error_handling_middleware))
}
