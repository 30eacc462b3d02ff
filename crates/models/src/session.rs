use async_graphql::{ComplexObject, Context, Result, SimpleObject};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::{
    reference::{Entity, ObjectId, Reference, ReferenceResolver, object_id_hex},
    user::{User, UserProfile},
};

/// Resolver for `Reference<User>` shared through the GraphQL schema data
pub type UserResolver = Arc<dyn ReferenceResolver<User>>;

/// A login session. Links to its owner lazily; stored with the owner unresolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "_id", with = "object_id_hex")]
    pub id: ObjectId,
    pub user: Reference<User>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn open(user: Reference<User>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: ObjectId::new(),
            user: user.downgrade(),
            created_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl Entity for Session {
    const COLLECTION: &'static str = "sessions";

    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(complex)]
pub struct SessionInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[graphql(skip)]
    pub owner: Reference<User>,
}

#[ComplexObject]
impl SessionInfo {
    /// The session owner, loaded only when the field is selected
    async fn user(&self, ctx: &Context<'_>) -> Result<Option<UserProfile>> {
        let resolver = ctx.data::<UserResolver>()?;

        match self.owner.try_resolve(resolver.as_ref()).await {
            Ok(Some(user)) => Ok(Some(UserProfile::from(user))),
            Ok(None) => {
                warn!(session = %self.id, user = %self.owner.id(), "Session owner no longer exists");
                Ok(None)
            }
            Err(e) => Err(e.to_field_error()),
        }
    }
}

impl From<Session> for SessionInfo {
    fn from(session: Session) -> Self {
        Self {
            id: session.id.to_hex(),
            created_at: session.created_at,
            expires_at: session.expires_at,
            owner: session.user,
        }
    }
}
