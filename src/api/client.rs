use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use super::{Accessor, ApiError, RawResource, ResourceKind};
use crate::config::CliConfig;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Accessor implementation over the management REST API using a blocking
/// HTTP client with bearer-token authentication.
pub struct HttpAccessor {
    client: Client,
    base: Url,
    token: String,
}

impl HttpAccessor {
    pub fn new(config: &CliConfig) -> Result<Self, ApiError> {
        let base = Url::parse(&config.management_url)
            .map_err(|e| ApiError::transport(format!("invalid management URL: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ApiError::transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base,
            token: config.token.clone(),
        })
    }

    fn endpoint(&self, kind: ResourceKind, id: Option<&str>) -> Result<Url, ApiError> {
        let mut path = format!("api/{}", kind.api_path());
        if let Some(id) = id {
            path.push('/');
            path.push_str(id);
        }

        self.base
            .join(&path)
            .map_err(|e| ApiError::transport(format!("invalid API path: {}", e)))
    }

    fn send(&self, request: RequestBuilder) -> Result<Value, ApiError> {
        let response = request
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| ApiError::transport(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| ApiError::transport(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            // Prefer the API's message field when the body is JSON
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or_else(|| {
                    if body.is_empty() {
                        status
                            .canonical_reason()
                            .unwrap_or("request failed")
                            .to_string()
                    } else {
                        body.clone()
                    }
                });

            return Err(ApiError::new(Some(status.as_u16()), message));
        }

        serde_json::from_str(&body)
            .map_err(|e| ApiError::invalid_response(format!("malformed JSON: {}", e)))
    }

    fn get(&self, kind: ResourceKind, id: Option<&str>) -> Result<Value, ApiError> {
        let url = self.endpoint(kind, id)?;
        self.send(self.client.get(url))
    }
}

impl Accessor for HttpAccessor {
    fn list(&self, kind: ResourceKind) -> Result<Vec<RawResource>, ApiError> {
        let value = self.get(kind, None)?;

        let items = value
            .as_array()
            .ok_or_else(|| ApiError::invalid_response("expected a JSON array"))?;

        items
            .iter()
            .map(|item| RawResource::from_value(item.clone()))
            .collect()
    }

    fn resolve_by_name_or_id(
        &self,
        kind: ResourceKind,
        identifier: &str,
    ) -> Result<String, ApiError> {
        // The identifier may be a literal backend ID; that interpretation
        // wins when it matches.
        match self.get(kind, Some(identifier)) {
            Ok(value) => return Ok(RawResource::from_value(value)?.id),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        let resources = self.list(kind)?;
        resources
            .into_iter()
            .find(|r| r.name == identifier)
            .map(|r| r.id)
            .ok_or_else(|| ApiError::not_found(kind, identifier))
    }

    fn create(&self, kind: ResourceKind, payload: &Value) -> Result<RawResource, ApiError> {
        let url = self.endpoint(kind, None)?;
        let value = self.send(self.client.post(url).json(payload))?;
        RawResource::from_value(value)
    }

    fn update(&self, kind: ResourceKind, id: &str, payload: &Value) -> Result<RawResource, ApiError> {
        let url = self.endpoint(kind, Some(id))?;
        let value = self.send(self.client.put(url).json(payload))?;
        RawResource::from_value(value)
    }
}
