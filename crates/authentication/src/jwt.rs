use app_config::MAX_JWT_EXPIRY_HOURS;
use app_error::{AppError, AppResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    pub sub: String,      // Subject (user id, hex)
    pub username: String, // Username for convenience
    pub sid: String,      // Session the token belongs to
    pub iat: i64,         // Issued at
    pub exp: i64,         // Expiration time
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry: Duration,
}

impl JwtService {
    pub fn new(secret: &[u8], expiry_hours: u64) -> AppResult<Self> {
        let expiry = Some(expiry_hours)
            .filter(|hours| (1..=MAX_JWT_EXPIRY_HOURS).contains(hours))
            .and_then(|hours| Duration::try_hours(hours as i64))
            .ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!(
                    "JWT expiry must be between 1 and {} hours, got {}",
                    MAX_JWT_EXPIRY_HOURS,
                    expiry_hours
                ))
            })?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            expiry,
        })
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    pub fn generate_token(&self, user_id: &str, username: &str, session_id: &str) -> AppResult<String> {
        let now = Utc::now();
        let expires_at = now.checked_add_signed(self.expiry).ok_or_else(|| {
            AppError::ServerError(anyhow::anyhow!("Token expiry is out of range"))
        })?;

        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            sid: session_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::ServerError(anyhow::anyhow!("Failed to generate token: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| {
                warn!("Token validation failed: {}", e);
                AppError::token_invalid()
            })?;

        debug!("Token validated for user: {}", token_data.claims.username);
        Ok(token_data.claims)
    }
}

/// The token part of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
