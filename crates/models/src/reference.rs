//! Lazy links between documents.
//!
//! A document that points at another document stores either the target
//! itself or only the target's [`ObjectId`]. [`Reference`] makes that choice
//! explicit so every reader handles both cases.

use app_error::{AppError, AppResult};
use async_trait::async_trait;
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, MapAccess, Unexpected, Visitor, value::MapAccessDeserializer},
};
use std::{fmt, marker::PhantomData};

pub use bson::oid::ObjectId;

/// A persisted document type addressable by an [`ObjectId`].
pub trait Entity {
    /// Collection (table) the documents live in
    const COLLECTION: &'static str;

    fn id(&self) -> ObjectId;
}

/// Loads the entity an unresolved [`Reference`] points at.
#[async_trait]
pub trait ReferenceResolver<T>: Send + Sync {
    /// `Ok(None)` when no document with `id` exists.
    async fn fetch(&self, id: &ObjectId) -> AppResult<Option<T>>;
}

/// Either the referenced entity or only its identifier.
///
/// On the wire an unresolved reference is the 24 character hex form of the
/// identifier and a resolved reference is the embedded document.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference<T> {
    Resolved(T),
    Unresolved(ObjectId),
}

impl<T> Reference<T> {
    pub fn resolved(entity: T) -> Self {
        Self::Resolved(entity)
    }

    pub fn unresolved(id: ObjectId) -> Self {
        Self::Unresolved(id)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    pub fn as_resolved(&self) -> Option<&T> {
        match self {
            Self::Resolved(entity) => Some(entity),
            Self::Unresolved(_) => None,
        }
    }

    pub fn into_resolved(self) -> Option<T> {
        match self {
            Self::Resolved(entity) => Some(entity),
            Self::Unresolved(_) => None,
        }
    }
}

impl<T: Entity> Reference<T> {
    pub fn id(&self) -> ObjectId {
        match self {
            Self::Resolved(entity) => entity.id(),
            Self::Unresolved(id) => *id,
        }
    }

    /// Forget the loaded entity, keeping only its identifier.
    pub fn downgrade(self) -> Self {
        Self::Unresolved(self.id())
    }

    pub fn points_to(&self, id: &ObjectId) -> bool {
        self.id() == *id
    }
}

impl<T> Reference<T>
where
    T: Entity + Clone + Send + Sync,
{
    /// The referenced entity, fetched through `resolver` when only the id is held.
    pub async fn resolve<R>(&self, resolver: &R) -> AppResult<T>
    where
        R: ReferenceResolver<T> + ?Sized,
    {
        match self {
            Self::Resolved(entity) => Ok(entity.clone()),
            Self::Unresolved(id) => fetch_required(resolver, id).await,
        }
    }

    /// Like [`Reference::resolve`] but a dangling reference yields `Ok(None)`.
    pub async fn try_resolve<R>(&self, resolver: &R) -> AppResult<Option<T>>
    where
        R: ReferenceResolver<T> + ?Sized,
    {
        match self {
            Self::Resolved(entity) => Ok(Some(entity.clone())),
            Self::Unresolved(id) => resolver.fetch(id).await,
        }
    }

    /// Replace the identifier with the fetched entity.
    ///
    /// On failure the reference is left unresolved.
    pub async fn resolve_in_place<R>(&mut self, resolver: &R) -> AppResult<&T>
    where
        R: ReferenceResolver<T> + ?Sized,
    {
        if let Self::Unresolved(id) = *self {
            let entity = fetch_required(resolver, &id).await?;
            *self = Self::Resolved(entity);
        }

        self.as_resolved()
            .ok_or_else(|| AppError::resource_not_found(T::COLLECTION, &self.id().to_hex()))
    }
}

async fn fetch_required<T, R>(resolver: &R, id: &ObjectId) -> AppResult<T>
where
    T: Entity,
    R: ReferenceResolver<T> + ?Sized,
{
    match resolver.fetch(id).await? {
        Some(entity) => Ok(entity),
        None => {
            tracing::debug!(collection = T::COLLECTION, id = %id, "Dangling reference");
            app_error::not_found_error!(T::COLLECTION, id)
        }
    }
}

impl<T> From<ObjectId> for Reference<T> {
    fn from(id: ObjectId) -> Self {
        Self::Unresolved(id)
    }
}

impl<T: Serialize> Serialize for Reference<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Resolved(entity) => entity.serialize(serializer),
            Self::Unresolved(id) => serializer.serialize_str(&id.to_hex()),
        }
    }
}

struct ReferenceVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for ReferenceVisitor<T> {
    type Value = Reference<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an ObjectId hex string or an embedded document")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        ObjectId::parse_str(value)
            .map(Reference::Unresolved)
            .map_err(|_| E::invalid_value(Unexpected::Str(value), &self))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
        T::deserialize(MapAccessDeserializer::new(map)).map(Reference::Resolved)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Reference<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ReferenceVisitor(PhantomData))
    }
}

/// Serde helper storing a plain [`ObjectId`] field as its hex string.
///
/// Use with `#[serde(with = "object_id_hex")]`.
pub mod object_id_hex {
    use super::ObjectId;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(id: &ObjectId, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&id.to_hex())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ObjectId, D::Error> {
        let hex = String::deserialize(deserializer)?;
        ObjectId::parse_str(&hex).map_err(de::Error::custom)
    }
}
