use crate::api::{ApiError, CollectionApi, ListQuery};
use crate::models::{PaginatedListing, RecordId};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// reqwest-backed client for the gallery's collection API
#[derive(Clone)]
pub struct GalleryClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl GalleryClient {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("curator/0.1")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Resolve an endpoint path against the base URL.
    /// Absolute URLs are used as-is.
    fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn record_url(&self, endpoint: &str, id: &RecordId) -> String {
        format!("{}/{}", self.url(endpoint).trim_end_matches('/'), id)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(response)
        } else if status == StatusCode::NOT_FOUND {
            Err(ApiError::NotFound)
        } else {
            // Surface the server's own message when it sends one
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| {
                    body.get("message")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));

            warn!("API request failed ({}): {}", status, message);

            Err(ApiError::Status {
                status: status.as_u16(),
                message,
            })
        }
    }

    /// Decode a JSON body, treating an empty body as null
    async fn json_body(response: Response) -> Result<Value, ApiError> {
        let text = response.text().await?;
        if text.trim().is_empty() {
            Ok(Value::Null)
        } else {
            Ok(serde_json::from_str(&text)?)
        }
    }
}

#[async_trait::async_trait]
impl CollectionApi for GalleryClient {
    async fn list(
        &self,
        endpoint: &str,
        query: &ListQuery,
    ) -> Result<PaginatedListing<Value>, ApiError> {
        let url = self.url(endpoint);
        debug!(
            "GET {} page={} limit={} search={:?}",
            url, query.page, query.limit, query.search
        );

        // Generic tables read `limit`, the image/link endpoints read `pageSize`
        let mut params = vec![
            ("page", query.page.to_string()),
            ("limit", query.limit.to_string()),
            ("pageSize", query.limit.to_string()),
        ];
        if let Some(search) = &query.search {
            params.push(("search", search.clone()));
        }

        let response = self.send(self.client.get(&url).query(&params)).await?;
        let body = Self::json_body(response).await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn get(&self, endpoint: &str, id: &RecordId) -> Result<Value, ApiError> {
        let url = self.record_url(endpoint, id);
        debug!("GET {}", url);

        let response = self.send(self.client.get(&url)).await?;
        Self::json_body(response).await
    }

    async fn create(&self, endpoint: &str, body: &Value) -> Result<Value, ApiError> {
        let url = self.url(endpoint);
        debug!("POST {}", url);

        let response = self.send(self.client.post(&url).json(body)).await?;
        Self::json_body(response).await
    }

    async fn update(
        &self,
        endpoint: &str,
        id: &RecordId,
        body: &Value,
    ) -> Result<Value, ApiError> {
        let url = self.record_url(endpoint, id);
        debug!("PUT {}", url);

        let response = self.send(self.client.put(&url).json(body)).await?;
        Self::json_body(response).await
    }

    async fn delete(
        &self,
        endpoint: &str,
        id: &RecordId,
        body: Option<&Value>,
    ) -> Result<(), ApiError> {
        let url = self.record_url(endpoint, id);
        debug!("DELETE {}", url);

        let mut request = self.client.delete(&url);
        if let Some(body) = body {
            request = request.json(body);
        }

        self.send(request).await?;
        Ok(())
    }
}
