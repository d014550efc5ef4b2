use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::normalizer::{FieldNormalizer, NormalizedFields};

// Resource document as returned by the document store search and admin APIs.
// Mirrors the store's wire shape, so serde derives live here.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredResource {
    pub public_id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default, rename = "type")]
    pub delivery_type: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub bytes: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub secure_url: Option<String>,
    #[serde(default)]
    pub context: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl StoredResource {
    // Flatten the context and metadata bags into one raw key/value map.
    // Context wins over metadata when both carry the same key.
    pub fn raw_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        if let Some(metadata) = self.metadata.as_ref().and_then(Value::as_object) {
            for (key, value) in metadata {
                fields.insert(key.clone(), value.clone());
            }
        }
        if let Some(context) = self.context.as_ref().and_then(context_bag) {
            for (key, value) in context {
                fields.insert(key.clone(), value.clone());
            }
        }
        fields
    }
}

// The admin API nests user context under `custom`; search returns it flat.
fn context_bag(context: &Value) -> Option<&Map<String, Value>> {
    let bag = context.as_object()?;
    match bag.get("custom").and_then(Value::as_object) {
        Some(custom) => Some(custom),
        None => Some(bag),
    }
}

// Canonical view of one booking document.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BookingRecord {
    pub public_id: String,
    pub created_at: Option<String>,
    pub resource_type: Option<String>,
    #[serde(rename = "type")]
    pub delivery_type: Option<String>,
    pub format: Option<String>,
    pub bytes: Option<u64>,
    pub url: Option<String>,
    pub secure_url: Option<String>,
    #[serde(flatten)]
    pub fields: NormalizedFields,
}

impl BookingRecord {
    pub fn from_resource(resource: StoredResource, normalizer: &FieldNormalizer) -> Self {
        let fields = normalizer.normalize(&resource.raw_fields());
        Self {
            public_id: resource.public_id,
            created_at: resource.created_at,
            resource_type: resource.resource_type,
            delivery_type: resource.delivery_type,
            format: resource.format,
            bytes: resource.bytes,
            url: resource.url,
            secure_url: resource.secure_url,
            fields,
        }
    }
}

// Ad hoc filter entered by the administrator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryFilter {
    pub keyword: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

// Compiled search sent to the document store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRequest {
    pub expression: String,
    pub max_results: u32,
    pub next_cursor: Option<String>,
}

// One page of search results.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchPage {
    pub resources: Vec<StoredResource>,
    pub next_cursor: Option<String>,
}
