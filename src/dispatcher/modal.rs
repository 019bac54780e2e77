use crate::api::{ApiError, CollectionApi};
use crate::dispatcher::resource::{FieldDescriptor, FieldKind, ResourceConfig, ResourceKind, Row};
use crate::import::{Encoder, SubmitError, UploadSession, ValidationError};
use crate::models::{LinkPayload, RecordId};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

/// A create/edit surface opened from a listing (allows mocking for tests)
#[async_trait::async_trait]
pub trait RecordModal: Send {
    fn heading(&self) -> String;

    fn error_message(&self) -> Option<&str>;

    /// Submit control is disabled while this is true
    fn is_pending(&self) -> bool;

    /// Validate and send the mutation, returning the server's response body
    async fn submit(&mut self) -> Result<Value, SubmitError>;
}

/// Generic form built from field descriptors
pub struct FieldFormModal {
    api: Arc<dyn CollectionApi>,
    endpoint: String,
    title: String,
    fields: Vec<FieldDescriptor>,
    values: HashMap<String, String>,
    pending: bool,
    error: Option<String>,
}

impl FieldFormModal {
    pub fn new(api: Arc<dyn CollectionApi>, config: &ResourceConfig) -> Self {
        Self {
            api,
            endpoint: config.endpoint.clone(),
            title: config.title.clone(),
            fields: config.fields.clone(),
            values: HashMap::new(),
            pending: false,
            error: None,
        }
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn set_value(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn value(&self, name: &str) -> &str {
        self.values.get(name).map(String::as_str).unwrap_or("")
    }

    /// Request body: blank fields omitted, number fields sent as numbers
    pub fn body(&self) -> Result<Value, ValidationError> {
        let mut body = Map::new();
        for field in &self.fields {
            let raw = self.value(&field.name).trim();
            if raw.is_empty() {
                continue;
            }
            let value = match field.kind {
                FieldKind::Number => Value::Number(parse_number(raw).ok_or_else(|| {
                    ValidationError::NotANumber {
                        label: field.label.clone(),
                    }
                })?),
                _ => Value::String(raw.to_string()),
            };
            body.insert(field.name.clone(), value);
        }
        Ok(Value::Object(body))
    }
}

fn parse_number(raw: &str) -> Option<Number> {
    if let Ok(n) = raw.parse::<i64>() {
        return Some(Number::from(n));
    }
    raw.parse::<f64>().ok().and_then(Number::from_f64)
}

#[async_trait::async_trait]
impl RecordModal for FieldFormModal {
    fn heading(&self) -> String {
        format!("Create {}", self.title)
    }

    fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn is_pending(&self) -> bool {
        self.pending
    }

    async fn submit(&mut self) -> Result<Value, SubmitError> {
        if self.pending {
            return Err(SubmitError::AlreadyPending);
        }
        let body = self.body().map_err(|e| {
            self.error = Some(e.to_string());
            e
        })?;

        self.pending = true;
        self.error = None;
        let result = self.api.create(&self.endpoint, &body).await;
        self.pending = false;

        match result {
            Ok(created) => {
                info!("Created record in {}", self.endpoint);
                self.values.clear();
                Ok(created)
            }
            Err(e) => {
                error!("Create in {} failed: {}", self.endpoint, e);
                self.error = Some("Failed to create item".to_string());
                Err(SubmitError::Network(e))
            }
        }
    }
}

/// Create or edit one link of a link collection
pub struct LinkFormModal {
    api: Arc<dyn CollectionApi>,
    endpoint: String,
    pub title: String,
    pub description: String,
    pub url: String,
    /// (link id, owning collection id) when editing
    editing: Option<(RecordId, RecordId)>,
    pending: bool,
    error: Option<String>,
}

impl LinkFormModal {
    pub fn create(api: Arc<dyn CollectionApi>, endpoint: &str) -> Self {
        Self {
            api,
            endpoint: endpoint.to_string(),
            title: String::new(),
            description: String::new(),
            url: String::new(),
            editing: None,
            pending: false,
            error: None,
        }
    }

    /// Open the form for a listed row. Rows without a link can't be edited.
    pub fn edit(
        api: Arc<dyn CollectionApi>,
        endpoint: &str,
        row: &Row,
    ) -> Result<Self, ValidationError> {
        let (Some(link_id), Some(product_id), Some(url)) = (&row.link_id, &row.id, &row.url)
        else {
            return Err(ValidationError::NoLinkData);
        };

        let text = |key: &str| {
            row.record
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Ok(Self {
            title: text("title"),
            description: text("description"),
            url: url.clone(),
            editing: Some((link_id.clone(), product_id.clone())),
            ..Self::create(api, endpoint)
        })
    }

    pub fn is_edit(&self) -> bool {
        self.editing.is_some()
    }

    pub fn payload(&self) -> Result<LinkPayload, ValidationError> {
        if self.title.trim().is_empty() || self.url.trim().is_empty() {
            return Err(ValidationError::MissingLinkFields);
        }
        Ok(LinkPayload {
            title: self.title.clone(),
            description: self.description.clone(),
            url: self.url.clone(),
            product_id: self.editing.as_ref().map(|(_, product)| product.clone()),
        })
    }
}

#[async_trait::async_trait]
impl RecordModal for LinkFormModal {
    fn heading(&self) -> String {
        if self.is_edit() {
            "Edit Link".to_string()
        } else {
            "Add Link".to_string()
        }
    }

    fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn is_pending(&self) -> bool {
        self.pending
    }

    async fn submit(&mut self) -> Result<Value, SubmitError> {
        if self.pending {
            return Err(SubmitError::AlreadyPending);
        }
        self.error = None;
        let payload = self.payload().map_err(|e| {
            self.error = Some(e.to_string());
            e
        })?;
        let body = serde_json::to_value(&payload).map_err(ApiError::from)?;

        self.pending = true;
        let result = match &self.editing {
            Some((link_id, _)) => self.api.update(&self.endpoint, link_id, &body).await,
            None => self.api.create(&self.endpoint, &body).await,
        };
        self.pending = false;

        result.map_err(|e| {
            error!("Saving link failed: {}", e);
            self.error = Some(match &e {
                ApiError::Status { message, .. } => message.clone(),
                _ => "Failed to save link".to_string(),
            });
            SubmitError::Network(e)
        })
    }
}

#[async_trait::async_trait]
impl RecordModal for UploadSession {
    fn heading(&self) -> String {
        "Upload Images".to_string()
    }

    fn error_message(&self) -> Option<&str> {
        UploadSession::error_message(self)
    }

    fn is_pending(&self) -> bool {
        UploadSession::is_pending(self)
    }

    async fn submit(&mut self) -> Result<Value, SubmitError> {
        UploadSession::submit(self).await.map(|outcome| outcome.created)
    }
}

/// The open create/edit surface of a listing, one variant per resource kind
pub enum CreateSurface {
    Fields(FieldFormModal),
    Images(UploadSession),
    Links(LinkFormModal),
}

impl CreateSurface {
    /// Open the create surface for a resource
    pub fn open(
        config: &ResourceConfig,
        api: Arc<dyn CollectionApi>,
        encoder: Arc<dyn Encoder>,
        concurrency: Option<usize>,
    ) -> Self {
        match config.kind {
            ResourceKind::Fields => CreateSurface::Fields(FieldFormModal::new(api, config)),
            ResourceKind::Images => CreateSurface::Images(UploadSession::new(
                api,
                config.endpoint.clone(),
                encoder,
                concurrency,
            )),
            ResourceKind::Links => {
                CreateSurface::Links(LinkFormModal::create(api, &config.endpoint))
            }
        }
    }

    pub fn modal(&self) -> &dyn RecordModal {
        match self {
            CreateSurface::Fields(m) => m,
            CreateSurface::Images(m) => m,
            CreateSurface::Links(m) => m,
        }
    }

    pub fn modal_mut(&mut self) -> &mut dyn RecordModal {
        match self {
            CreateSurface::Fields(m) => m,
            CreateSurface::Images(m) => m,
            CreateSurface::Links(m) => m,
        }
    }
}
