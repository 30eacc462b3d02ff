use async_graphql::{Context, Object, Result};
use tracing::info;

use app_models::{AuthResponse, LoginInput, RegisterInput};

use crate::{
    schema::{auth_service, require_claims},
    service::AuthServiceTrait,
};

#[derive(Default)]
pub struct UserMutation;

#[Object]
impl UserMutation {
    async fn register(&self, ctx: &Context<'_>, input: RegisterInput) -> Result<AuthResponse> {
        auth_service(ctx)?
            .register(input)
            .await
            .map_err(|err| err.to_field_error())
    }

    /// Both fields of the response are null when the credentials are rejected
    async fn login(&self, ctx: &Context<'_>, input: LoginInput) -> Result<AuthResponse> {
        auth_service(ctx)?
            .login(input)
            .await
            .map_err(|err| err.to_field_error())
    }

    async fn logout(&self, ctx: &Context<'_>) -> Result<bool> {
        let claims = require_claims(ctx)?;

        let closed = auth_service(ctx)?
            .logout(claims)
            .await
            .map_err(|err| err.to_field_error())?;

        if !closed {
            info!(username = %claims.username, "Logout for a session that was already closed");
        }
        Ok(closed)
    }
}
