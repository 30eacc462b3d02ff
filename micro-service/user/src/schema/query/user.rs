use async_graphql::{Context, Object, Result};

use app_models::{SessionInfo, UserProfile};

use crate::{
    schema::{auth_service, require_claims},
    service::AuthServiceTrait,
};

#[derive(Default)]
pub struct UserQuery;

#[Object]
impl UserQuery {
    /// The signed-in user; null once the session has ended
    async fn me(&self, ctx: &Context<'_>) -> Result<Option<UserProfile>> {
        let claims = require_claims(ctx)?;

        auth_service(ctx)?
            .current_user(claims)
            .await
            .map_err(|err| err.to_field_error())
    }

    async fn sessions(&self, ctx: &Context<'_>) -> Result<Vec<SessionInfo>> {
        let claims = require_claims(ctx)?;

        auth_service(ctx)?
            .sessions(claims)
            .await
            .map_err(|err| err.to_field_error())
    }
}
