use app_error::AppResult;
use app_models::{Entity, ObjectId, ReferenceResolver};
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::service::DbService;

// Records are keyed by the identifier's hex form, so a fetch is a plain select.
#[async_trait]
impl<T> ReferenceResolver<T> for DbService<T>
where
    T: Entity + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn fetch(&self, id: &ObjectId) -> AppResult<Option<T>> {
        tracing::debug!(collection = T::COLLECTION, id = %id, "Resolving reference");
        self.get_record_by_id(&id.to_hex()).await
    }
}
