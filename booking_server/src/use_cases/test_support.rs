use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::entities::{SearchPage, SearchRequest, StoredResource};
use crate::domain::errors::StoreError;
use crate::domain::ports::{Clock, DocumentStore};
use crate::domain::token::{CredentialClaims, TokenCodec};

pub(crate) const TEST_SECRET: &str = "test-secret";
pub(crate) const TEST_NOW: u64 = 1_700_000_000;

pub(crate) type ResourceTable = Arc<Mutex<BTreeMap<String, StoredResource>>>;

// Shared fixed time source for deterministic use-case tests.
pub(crate) struct FixedClock(pub(crate) u64);

impl Clock for FixedClock {
    fn now_epoch_seconds(&self) -> u64 {
        self.0
    }
}

pub(crate) fn test_codec() -> TokenCodec {
    TokenCodec::new(TEST_SECRET)
}

pub(crate) fn admin_token(expires_at: u64) -> String {
    test_codec()
        .sign(&CredentialClaims {
            subject: "admin".to_string(),
            expires_at,
        })
        .expect("test token signs")
}

pub(crate) fn resource(public_id: &str, context: Value) -> StoredResource {
    StoredResource {
        public_id: public_id.to_string(),
        created_at: Some("2025-10-01T02:00:00Z".to_string()),
        resource_type: Some("raw".to_string()),
        delivery_type: Some("upload".to_string()),
        context: Some(context),
        ..StoredResource::default()
    }
}

#[derive(Clone, Copy, Default)]
pub(crate) struct FailureFlags {
    pub search: bool,
    pub fetch: bool,
    pub update: bool,
    pub delete: bool,
}

#[derive(Clone)]
pub(crate) struct RecordingStore {
    resources: ResourceTable,
    searches: Arc<Mutex<Vec<SearchRequest>>>,
    deletes: Arc<Mutex<Vec<String>>>,
    next_cursor: Option<String>,
    failures: FailureFlags,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self {
            resources: Arc::new(Mutex::new(BTreeMap::new())),
            searches: Arc::new(Mutex::new(Vec::new())),
            deletes: Arc::new(Mutex::new(Vec::new())),
            next_cursor: None,
            failures: FailureFlags::default(),
        }
    }

    pub(crate) fn with_failures(mut self, failures: FailureFlags) -> Self {
        self.failures = failures;
        self
    }

    pub(crate) fn with_next_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.next_cursor = Some(cursor.into());
        self
    }

    pub(crate) fn insert_test_resource(&self, resource: StoredResource) {
        let mut guard = self.resources.lock().expect("resources mutex poisoned");
        guard.insert(resource.public_id.clone(), resource);
    }

    pub(crate) fn get_test_resource(&self, public_id: &str) -> Option<StoredResource> {
        let guard = self.resources.lock().expect("resources mutex poisoned");
        guard.get(public_id).cloned()
    }

    pub(crate) fn recorded_searches(&self) -> Vec<SearchRequest> {
        self.searches
            .lock()
            .expect("searches mutex poisoned")
            .clone()
    }

    pub(crate) fn recorded_deletes(&self) -> Vec<String> {
        self.deletes.lock().expect("deletes mutex poisoned").clone()
    }
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn search(&self, request: SearchRequest) -> Result<SearchPage, StoreError> {
        if self.failures.search {
            return Err(StoreError::Upstream {
                status: 500,
                body: "search failed".to_string(),
            });
        }

        let limit = request.max_results as usize;
        self.searches
            .lock()
            .expect("searches mutex poisoned")
            .push(request);

        let guard = self.resources.lock().expect("resources mutex poisoned");
        Ok(SearchPage {
            resources: guard.values().take(limit).cloned().collect(),
            next_cursor: self.next_cursor.clone(),
        })
    }

    async fn fetch(&self, public_id: &str) -> Result<Option<StoredResource>, StoreError> {
        if self.failures.fetch {
            return Err(StoreError::Transport("fetch failed".to_string()));
        }

        Ok(self.get_test_resource(public_id))
    }

    async fn update_context(
        &self,
        public_id: &str,
        context: &Map<String, Value>,
    ) -> Result<StoredResource, StoreError> {
        if self.failures.update {
            return Err(StoreError::Upstream {
                status: 500,
                body: "update failed".to_string(),
            });
        }

        let mut guard = self.resources.lock().expect("resources mutex poisoned");
        let entry = guard
            .get_mut(public_id)
            .ok_or_else(|| StoreError::InvalidResource(public_id.to_string()))?;
        entry.context = Some(Value::Object(context.clone()));
        Ok(entry.clone())
    }

    async fn delete(&self, public_id: &str) -> Result<bool, StoreError> {
        if self.failures.delete {
            return Err(StoreError::Transport("delete failed".to_string()));
        }

        self.deletes
            .lock()
            .expect("deletes mutex poisoned")
            .push(public_id.to_string());
        let mut guard = self.resources.lock().expect("resources mutex poisoned");
        Ok(guard.remove(public_id).is_some())
    }
}
