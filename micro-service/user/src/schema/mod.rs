pub mod mutation;
pub mod query;

use app_authentication::Claims;
use app_error::AppError;
use async_graphql::{Context, EmptySubscription, Result, Schema};
use std::sync::Arc;

use crate::service::AuthService;
use mutation::{Mutation, create_mutation};
use query::{Query, create_query};

pub type ApiSchema = Schema<Query, Mutation, EmptySubscription>;

/// Build the schema with the service and the session owner resolver as data.
pub fn create_schema(auth_service: Arc<AuthService>) -> ApiSchema {
    let user_resolver = auth_service.user_resolver();

    Schema::build(create_query(), create_mutation(), EmptySubscription)
        .data(auth_service)
        .data(user_resolver)
        .finish()
}

pub(crate) fn auth_service<'a>(ctx: &Context<'a>) -> Result<&'a Arc<AuthService>> {
    ctx.data::<Arc<AuthService>>().map_err(|_| {
        AppError::ServerError(anyhow::anyhow!(
            "Internal configuration error: Auth service not available"
        ))
        .to_field_error()
    })
}

/// Claims attached by the HTTP handler for a valid bearer token
pub(crate) fn require_claims<'a>(ctx: &Context<'a>) -> Result<&'a Claims> {
    ctx.data::<Claims>()
        .map_err(|_| AppError::authentication_required().to_field_error())
}
