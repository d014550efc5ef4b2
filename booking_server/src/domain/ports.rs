use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::entities::{SearchPage, SearchRequest, StoredResource};
use crate::domain::errors::StoreError;

// Port for the external search/update API holding booking documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn search(&self, request: SearchRequest) -> Result<SearchPage, StoreError>;
    async fn fetch(&self, public_id: &str) -> Result<Option<StoredResource>, StoreError>;
    // Replaces the resource context with the given flat key/value map.
    async fn update_context(
        &self,
        public_id: &str,
        context: &Map<String, Value>,
    ) -> Result<StoredResource, StoreError>;
    // Returns whether the store reported the resource as deleted.
    async fn delete(&self, public_id: &str) -> Result<bool, StoreError>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    async fn search(&self, request: SearchRequest) -> Result<SearchPage, StoreError> {
        (**self).search(request).await
    }

    async fn fetch(&self, public_id: &str) -> Result<Option<StoredResource>, StoreError> {
        (**self).fetch(public_id).await
    }

    async fn update_context(
        &self,
        public_id: &str,
        context: &Map<String, Value>,
    ) -> Result<StoredResource, StoreError> {
        (**self).update_context(public_id, context).await
    }

    async fn delete(&self, public_id: &str) -> Result<bool, StoreError> {
        (**self).delete(public_id).await
    }
}

// Port for retrieving the current time.
pub trait Clock: Send + Sync {
    fn now_epoch_seconds(&self) -> u64;
}
