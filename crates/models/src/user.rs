use async_graphql::{InputObject, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reference::{Entity, ObjectId, object_id_hex};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    #[serde(rename = "_id", with = "object_id_hex")]
    pub id: ObjectId,
    pub name: String,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string, never the plain password
    pub password: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, username: String, email: String, password: String) -> Self {
        let now = Utc::now();
        Self {
            id: ObjectId::new(),
            name,
            username,
            email,
            password,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> ObjectId {
        self.id
    }
}

/// The GraphQL view of a [`User`]; the password hash never leaves the service.
#[derive(Debug, Clone, PartialEq, SimpleObject, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_hex(),
            name: user.name,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self::from(user.clone())
    }
}

#[derive(InputObject, Debug, Deserialize)]
pub struct RegisterInput {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(InputObject, Debug, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

/// Result of an authentication operation.
///
/// Both fields are independently nullable. The service fills both on success
/// and neither on rejected credentials, but the type accepts any combination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, SimpleObject)]
pub struct AuthResponse {
    user: Option<UserProfile>,
    token: Option<String>,
}

impl AuthResponse {
    pub fn new(user: Option<UserProfile>, token: Option<String>) -> Self {
        Self { user, token }
    }

    pub fn authenticated(user: UserProfile, token: String) -> Self {
        Self::new(Some(user), Some(token))
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.token.is_some()
    }

    pub fn into_parts(self) -> (Option<UserProfile>, Option<String>) {
        (self.user, self.token)
    }
}
