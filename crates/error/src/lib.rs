pub mod macros;
pub mod middleware_handling;

use async_graphql::{Error as GraphQLError, ErrorExtensions, FieldError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),
    #[error("GraphQL error: {0:?}")]
    GraphQLError(GraphQLError),
    #[error("Server error: {0}")]
    ServerError(anyhow::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFoundError(String),
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
    #[error("Authorization error: {0}")]
    AuthorizationError(String),
    #[error("Rate limit error: {0}")]
    RateLimitError(String),
    #[error("Resource exists error: {0}")]
    ResourceExistsError(String),
}

impl AppError {
    pub fn account_locked(seconds: u64) -> Self {
        Self::RateLimitError(format!(
            "Your account has been temporarily locked for security. Please try again in {} seconds.",
            seconds
        ))
    }

    pub fn authentication_required() -> Self {
        Self::AuthenticationError(
            "Not authenticated. Please log in to access this resource.".to_string(),
        )
    }

    pub fn token_invalid() -> Self {
        Self::AuthenticationError("Invalid authentication token. Please log in again.".to_string())
    }

    // Resource errors
    pub fn resource_not_found(resource_type: &str, identifier: &str) -> Self {
        Self::NotFoundError(format!(
            "{} with identifier '{}' was not found.",
            resource_type, identifier
        ))
    }

    pub fn resource_exists(resource_type: &str, identifier: &str) -> Self {
        Self::ResourceExistsError(format!(
            "{} with identifier '{}' already exists.",
            resource_type, identifier
        ))
    }

    pub fn validation(field: &str, message: &str) -> Self {
        Self::ValidationError(format!("Validation failed for '{}': {}", field, message))
    }

    pub fn database_operation_failed(operation: &str, resource: &str) -> Self {
        Self::DatabaseError(anyhow::anyhow!(
            "Database operation '{}' failed on resource '{}'",
            operation,
            resource
        ))
    }

    /// Stable machine-readable code, shared by the HTTP and GraphQL surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::GraphQLError(_) => "GRAPHQL_ERROR",
            Self::ServerError(_) => "SERVER_ERROR",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::NotFoundError(_) => "NOT_FOUND_ERROR",
            Self::AuthenticationError(_) => "AUTHENTICATION_ERROR",
            Self::AuthorizationError(_) => "AUTHORIZATION_ERROR",
            Self::RateLimitError(_) => "RATE_LIMIT_ERROR",
            Self::ResourceExistsError(_) => "RESOURCE_EXISTS_ERROR",
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::ServerError(error)
    }
}

impl From<GraphQLError> for AppError {
    fn from(error: GraphQLError) -> Self {
        Self::GraphQLError(error)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, help_text) = match &self {
            Self::ConfigError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "System configuration error",
                None,
            ),
            Self::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database operation failed",
                None,
            ),
            Self::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                msg.as_str(),
                Some("Please review your input and try again."),
            ),
            Self::NotFoundError(msg) => (
                StatusCode::NOT_FOUND,
                msg.as_str(),
                Some("The requested resource was not found."),
            ),
            Self::AuthenticationError(msg) => (
                StatusCode::UNAUTHORIZED,
                msg.as_str(),
                Some("Please log in to access this resource."),
            ),
            Self::AuthorizationError(msg) => (
                StatusCode::FORBIDDEN,
                msg.as_str(),
                Some("You don't have permission to access this resource."),
            ),
            Self::RateLimitError(msg) => (
                StatusCode::TOO_MANY_REQUESTS,
                msg.as_str(),
                Some("Please try again later."),
            ),
            Self::ResourceExistsError(msg) => (StatusCode::CONFLICT, msg.as_str(), None),
            Self::GraphQLError(_) | Self::ServerError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                None,
            ),
        };

        let error_code = self.code();
        if status.is_server_error() {
            tracing::error!(error_code, status_code = %status.as_u16(), %error_message, "{}", self);
        } else {
            tracing::warn!(error_code, status_code = %status.as_u16(), %error_message, "{}", self);
        }

        let body = Json(ErrorResponse {
            status: status.to_string(),
            message: error_message.to_string(),
            code: error_code.to_string(),
            // Internal details never reach the client
            details: if status.is_server_error() {
                None
            } else {
                Some(self.to_string())
            },
            help: help_text.map(String::from),
        });

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

// Extension trait to wrap anyhow errors with specific context
pub trait AppErrorExt<T> {
    fn config_err(self) -> AppResult<T>;
    fn db_err(self) -> AppResult<T>;
    fn server_err(self) -> AppResult<T>;
}

impl<T, E> AppErrorExt<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn config_err(self) -> AppResult<T> {
        self.map_err(|e| AppError::ConfigError(e.into()))
    }

    fn db_err(self) -> AppResult<T> {
        self.map_err(|e| AppError::DatabaseError(e.into()))
    }

    fn server_err(self) -> AppResult<T> {
        self.map_err(|e| AppError::ServerError(e.into()))
    }
}

impl AppError {
    /// Convert to a GraphQL `FieldError` carrying `code` and `details` extensions.
    ///
    /// Infrastructure failures keep their details out of the response.
    pub fn to_field_error(&self) -> FieldError {
        let code = self.code();
        let details = match self {
            Self::ValidationError(msg)
            | Self::AuthenticationError(msg)
            | Self::AuthorizationError(msg)
            | Self::NotFoundError(msg)
            | Self::RateLimitError(msg)
            | Self::ResourceExistsError(msg) => msg.clone(),
            Self::DatabaseError(_) => "A database error occurred".to_string(),
            Self::ConfigError(_) => "A configuration error occurred".to_string(),
            Self::ServerError(_) => "An internal server error occurred".to_string(),
            Self::GraphQLError(err) => err.message.clone(),
        };

        let message = match self {
            Self::DatabaseError(_) | Self::ConfigError(_) | Self::ServerError(_) => details.clone(),
            _ => self.to_string(),
        };

        let error = FieldError::new(message).extend_with(|_, e| {
            e.set("code", code);
            e.set("details", details);
        });

        match self {
            Self::ServerError(_) | Self::DatabaseError(_) | Self::ConfigError(_) => {
                tracing::error!(error = %self, "GraphQL resolver error");
            }
            Self::AuthenticationError(_) | Self::AuthorizationError(_) | Self::RateLimitError(_) => {
                tracing::warn!(error = %self, "Authentication/authorization error");
            }
            _ => {
                tracing::info!(error = %self, "Client request error");
            }
        }

        error
    }
}
