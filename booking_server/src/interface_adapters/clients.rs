use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use url::Url;

use crate::domain::entities::{SearchPage, SearchRequest, StoredResource};
use crate::domain::errors::StoreError;
use crate::domain::ports::DocumentStore;

const CONTEXT_SEPARATOR: char = '|';
const SEARCH_FIELDS: [&str; 2] = ["context", "metadata"];

// Connection settings for the Cloudinary admin API.
#[derive(Clone, Debug)]
pub struct CloudinaryConfig {
    pub api_base: String,
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub resource_type: String,
    pub delivery_type: String,
}

// Thin wrapper around reqwest for the Cloudinary admin API.
#[derive(Clone)]
pub struct CloudinaryClient {
    http: Client,
    base_url: Url,
    api_key: String,
    api_secret: String,
    resource_type: String,
    delivery_type: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponseBody {
    #[serde(default)]
    resources: Vec<StoredResource>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteResponseBody {
    #[serde(default)]
    deleted: Map<String, Value>,
}

impl CloudinaryClient {
    pub fn new(config: CloudinaryConfig) -> Result<Self, StoreError> {
        let mut base_url = Url::parse(config.api_base.trim_end_matches('/'))
            .map_err(|err| StoreError::Transport(format!("bad api base: {err}")))?;
        base_url
            .path_segments_mut()
            .map_err(cannot_be_base)?
            .pop_if_empty()
            .push(&config.cloud_name)
            .push("resources");

        Ok(Self {
            http: Client::new(),
            base_url,
            api_key: config.api_key,
            api_secret: config.api_secret,
            resource_type: config.resource_type,
            delivery_type: config.delivery_type,
        })
    }

    // `{base}/{cloud}/resources/` followed by `segments`, each percent-encoded as one segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(cannot_be_base)?
            .extend(segments);
        Ok(url)
    }

    fn resource_url(&self, public_id: &str) -> Result<Url, StoreError> {
        if public_id.trim().is_empty() {
            return Err(StoreError::InvalidResource(public_id.to_string()));
        }
        let (kind, delivery) = self.scope();
        self.endpoint(&[kind, delivery, public_id])
    }

    fn scope(&self) -> (&str, &str) {
        (&self.resource_type, &self.delivery_type)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, StoreError> {
        request
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .send()
            .await
            .map_err(|err| StoreError::Transport(err.to_string()))
    }
}

fn cannot_be_base(_: ()) -> StoreError {
    StoreError::Transport("api base cannot carry a path".to_string())
}

// Keep the upstream status and body so operators can see why the store refused.
async fn upstream_error(response: Response) -> StoreError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    StoreError::Upstream { status, body }
}

// Cloudinary context string: `key=value|key=value`, with `|` inside values turned into `/`.
pub fn encode_context(context: &Map<String, Value>) -> String {
    context
        .iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::Null => return None,
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            let text = text.replace(CONTEXT_SEPARATOR, "/").trim().to_string();
            (!text.is_empty()).then(|| format!("{key}={text}"))
        })
        .collect::<Vec<_>>()
        .join("|")
}

#[async_trait]
impl DocumentStore for CloudinaryClient {
    async fn search(&self, request: SearchRequest) -> Result<SearchPage, StoreError> {
        let url = self.endpoint(&["search"])?;
        let mut payload = json!({
            "expression": request.expression,
            "max_results": request.max_results,
            "sort_by": [{ "created_at": "desc" }],
            "with_field": SEARCH_FIELDS,
        });
        if let Some(cursor) = request.next_cursor {
            payload["next_cursor"] = Value::String(cursor);
        }

        let response = self.send(self.http.post(url).json(&payload)).await?;
        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        let body = response
            .json::<SearchResponseBody>()
            .await
            .map_err(|err| StoreError::Decode(err.to_string()))?;
        Ok(SearchPage {
            resources: body.resources,
            next_cursor: body.next_cursor,
        })
    }

    async fn fetch(&self, public_id: &str) -> Result<Option<StoredResource>, StoreError> {
        let url = self.resource_url(public_id)?;
        let response = self.send(self.http.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        response
            .json::<StoredResource>()
            .await
            .map(Some)
            .map_err(|err| StoreError::Decode(err.to_string()))
    }

    async fn update_context(
        &self,
        public_id: &str,
        context: &Map<String, Value>,
    ) -> Result<StoredResource, StoreError> {
        let url = self.resource_url(public_id)?;
        let form = [("context", encode_context(context))];
        let response = self.send(self.http.post(url).form(&form)).await?;
        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        response
            .json::<StoredResource>()
            .await
            .map_err(|err| StoreError::Decode(err.to_string()))
    }

    async fn delete(&self, public_id: &str) -> Result<bool, StoreError> {
        if public_id.trim().is_empty() {
            return Err(StoreError::InvalidResource(public_id.to_string()));
        }
        let (kind, delivery) = self.scope();
        let url = self.endpoint(&[kind, delivery])?;
        let request = self.http.delete(url).query(&[("public_ids[]", public_id)]);
        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        let body = response
            .json::<DeleteResponseBody>()
            .await
            .map_err(|err| StoreError::Decode(err.to_string()))?;
        let status = body.deleted.get(public_id).and_then(Value::as_str);
        Ok(status == Some("deleted"))
    }
}
