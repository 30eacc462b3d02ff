use app_authentication::{JwtService, bearer_token};
use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse},
};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::schema::ApiSchema;

// Handler for GraphQL POST requests with optional authentication
pub async fn graphql_handler(
    Extension(schema): Extension<ApiSchema>,
    Extension(jwt_service): Extension<Arc<JwtService>>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let mut request = req.into_inner();

    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token);

    if let Some(token) = token {
        // An invalid token is treated as anonymous; resolvers that need a
        // user report the missing authentication themselves.
        match jwt_service.validate_token(token) {
            Ok(claims) => request = request.data(claims),
            Err(e) => debug!("Ignoring bearer token: {}", e),
        }
    }

    schema.execute(request).await.into()
}

// Handler for GraphQL playground UI
pub async fn graphql_playground() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}
