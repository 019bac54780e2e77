// # Collection API
//
// The network collaborator behind every surface. Listings, detail loads and
// mutations all go through `CollectionApi`, so sessions and the dispatcher can
// be driven against an in-memory implementation in tests.

use crate::models::{PaginatedListing, RecordId};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Record not found")]
    NotFound,
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Message suitable for an inline error banner
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Query parameters for one listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
}

impl ListQuery {
    pub fn new(page: u32, limit: u32, search: &str) -> Self {
        let search = search.trim();
        Self {
            page,
            limit,
            search: if search.is_empty() {
                None
            } else {
                Some(search.to_string())
            },
        }
    }
}

/// CRUD operations on one REST resource family (allows mocking for tests)
#[async_trait::async_trait]
pub trait CollectionApi: Send + Sync {
    /// `GET {endpoint}?page&limit&search`
    async fn list(
        &self,
        endpoint: &str,
        query: &ListQuery,
    ) -> Result<PaginatedListing<Value>, ApiError>;

    /// `GET {endpoint}/{id}`. Missing records are `ApiError::NotFound`.
    async fn get(&self, endpoint: &str, id: &RecordId) -> Result<Value, ApiError>;

    /// `POST {endpoint}`
    async fn create(&self, endpoint: &str, body: &Value) -> Result<Value, ApiError>;

    /// `PUT {endpoint}/{id}`
    async fn update(&self, endpoint: &str, id: &RecordId, body: &Value)
        -> Result<Value, ApiError>;

    /// `DELETE {endpoint}/{id}`, optionally with a JSON body
    async fn delete(
        &self,
        endpoint: &str,
        id: &RecordId,
        body: Option<&Value>,
    ) -> Result<(), ApiError>;
}
