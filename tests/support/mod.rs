// Test support utilities for integration tests
#![allow(dead_code)]

use curator::api::{ApiError, CollectionApi, ListQuery};
use curator::import::{EncodeError, Encoder, FileRef};
use curator::models::{PaginatedListing, RecordId};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Initialize tracing for tests with proper test output handling
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// One call made against the mock API
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    List { endpoint: String, query: ListQuery },
    Get { endpoint: String, id: RecordId },
    Create { endpoint: String, body: Value },
    Update { endpoint: String, id: RecordId, body: Value },
    Delete { endpoint: String, id: RecordId, body: Option<Value> },
}

impl Request {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Request::List { .. } | Request::Get { .. })
    }
}

/// In-memory collection API
///
/// Keeps one list of records, pages and searches it like the server does,
/// and records every request. Mutations can be made to fail with a status.
pub struct MockCollectionApi {
    records: Mutex<Vec<Value>>,
    requests: Mutex<Vec<Request>>,
    fail_mutations: Mutex<Option<(u16, String)>>,
    next_id: AtomicU64,
}

impl Default for MockCollectionApi {
    fn default() -> Self {
        MockCollectionApi {
            records: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            fail_mutations: Mutex::new(None),
            next_id: AtomicU64::new(1000),
        }
    }
}

impl MockCollectionApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<Value>) -> Self {
        let api = Self::default();
        *api.records.lock().unwrap() = records;
        api
    }

    /// `count` plain records titled "Item 1".."Item N"
    pub fn with_items(count: usize) -> Self {
        Self::with_records(
            (1..=count)
                .map(|n| json!({"id": n, "title": format!("Item {}", n), "name": format!("item-{}", n)}))
                .collect(),
        )
    }

    pub fn fail_mutations(&self, status: u16, message: &str) {
        *self.fail_mutations.lock().unwrap() = Some((status, message.to_string()));
    }

    pub fn records(&self) -> Vec<Value> {
        self.records.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<Request> {
        self.requests().into_iter().filter(Request::is_mutation).collect()
    }

    pub fn list_queries(&self) -> Vec<ListQuery> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                Request::List { query, .. } => Some(query),
                _ => None,
            })
            .collect()
    }

    fn record(&self, request: Request) {
        self.requests.lock().unwrap().push(request);
    }

    fn check_failure(&self) -> Result<(), ApiError> {
        match &*self.fail_mutations.lock().unwrap() {
            Some((status, message)) => Err(ApiError::Status {
                status: *status,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn id_matches(record: &Value, id: &RecordId) -> bool {
    match record.get("id") {
        Some(Value::String(s)) => s == id.as_str(),
        Some(Value::Number(n)) => n.to_string() == id.as_str(),
        _ => false,
    }
}

fn owns_link(record: &Value, id: &RecordId) -> bool {
    record
        .get("links")
        .and_then(Value::as_array)
        .is_some_and(|links| links.iter().any(|link| id_matches(link, id)))
}

#[async_trait::async_trait]
impl CollectionApi for MockCollectionApi {
    async fn list(
        &self,
        endpoint: &str,
        query: &ListQuery,
    ) -> Result<PaginatedListing<Value>, ApiError> {
        self.record(Request::List {
            endpoint: endpoint.to_string(),
            query: query.clone(),
        });

        let records = self.records.lock().unwrap();
        let matching: Vec<&Value> = records
            .iter()
            .filter(|record| match &query.search {
                Some(search) => record
                    .get("title")
                    .and_then(Value::as_str)
                    .is_some_and(|title| title.to_lowercase().contains(&search.to_lowercase())),
                None => true,
            })
            .collect();

        let limit = query.limit.max(1) as usize;
        let total = matching.len();
        let total_pages = total.div_ceil(limit).max(1) as u32;
        let start = (query.page.max(1) as usize - 1) * limit;

        Ok(PaginatedListing {
            items: matching.into_iter().skip(start).take(limit).cloned().collect(),
            total: total as u64,
            page: query.page,
            page_size: query.limit,
            total_pages,
        })
    }

    async fn get(&self, endpoint: &str, id: &RecordId) -> Result<Value, ApiError> {
        self.record(Request::Get {
            endpoint: endpoint.to_string(),
            id: id.clone(),
        });

        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|record| id_matches(record, id))
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn create(&self, endpoint: &str, body: &Value) -> Result<Value, ApiError> {
        self.record(Request::Create {
            endpoint: endpoint.to_string(),
            body: body.clone(),
        });
        self.check_failure()?;

        let mut created = body.clone();
        created["id"] = json!(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.records.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update(&self, endpoint: &str, id: &RecordId, body: &Value) -> Result<Value, ApiError> {
        self.record(Request::Update {
            endpoint: endpoint.to_string(),
            id: id.clone(),
            body: body.clone(),
        });
        self.check_failure()?;

        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|record| id_matches(record, id))
            .ok_or(ApiError::NotFound)?;

        if let (Some(target), Some(changes)) = (record.as_object_mut(), body.as_object()) {
            for (key, value) in changes {
                if key == "images" {
                    // New images are appended to the existing ones
                    let mut images = target
                        .get("images")
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default();
                    for (n, uri) in value.as_array().into_iter().flatten().enumerate() {
                        images.push(json!({"id": format!("{}-new-{}", id, n), "image": uri}));
                    }
                    target.insert(key.clone(), Value::Array(images));
                } else {
                    target.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(record.clone())
    }

    async fn delete(
        &self,
        endpoint: &str,
        id: &RecordId,
        body: Option<&Value>,
    ) -> Result<(), ApiError> {
        self.record(Request::Delete {
            endpoint: endpoint.to_string(),
            id: id.clone(),
            body: body.cloned(),
        });
        self.check_failure()?;

        let mut records = self.records.lock().unwrap();
        records.retain(|record| !id_matches(record, id) && !owns_link(record, id));
        Ok(())
    }
}

/// Encoder whose outcome is chosen per file name
///
/// Files listed as failing return an error, every other file becomes
/// `data:text/plain;name,<name>`. Delays let a test choose completion order.
#[derive(Default)]
pub struct ScriptedEncoder {
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn delayed(mut self, name: &str, millis: u64) -> Self {
        self.delays
            .insert(name.to_string(), Duration::from_millis(millis));
        self
    }

    /// Names passed to `encode`, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn payload_for(name: &str) -> String {
        format!("data:text/plain;name,{}", name)
    }
}

#[async_trait::async_trait]
impl Encoder for ScriptedEncoder {
    async fn encode(&self, file: &FileRef) -> Result<String, EncodeError> {
        self.calls.lock().unwrap().push(file.name().to_string());

        if let Some(delay) = self.delays.get(file.name()) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(file.name()) {
            return Err(EncodeError::NotAFile(file.name().to_string()));
        }
        Ok(Self::payload_for(file.name()))
    }
}

/// A staged file that never touches disk
pub fn file(name: &str, byte_size: u64) -> FileRef {
    FileRef::new(format!("/staged/{}", name), name, byte_size, Some("text/plain".to_string()))
}

/// An image collection record as the server returns it
pub fn image_collection(id: u64, title: &str, image_ids: &[&str]) -> Value {
    json!({
        "id": id,
        "title": title,
        "description": format!("{} description", title),
        "created_at": "2024-03-01T10:00:00Z",
        "images": image_ids
            .iter()
            .map(|image| json!({"id": image, "image": format!("data:image/png;base64,{}", image)}))
            .collect::<Vec<_>>(),
    })
}

/// A link collection record, optionally without any link
pub fn link_collection(id: u64, title: &str, link: Option<(u64, &str)>) -> Value {
    json!({
        "id": id,
        "title": title,
        "description": "",
        "links": link
            .map(|(link_id, url)| vec![json!({"id": link_id, "url": url})])
            .unwrap_or_default(),
    })
}
