use crate::models::{parse_date, ImageCollection, LinkCollection, LinkDeleteBody, RecordId};
use serde_json::Value;

/// Input kind of an editable field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Textarea,
    Date,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Key in the request body
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub fn new(name: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind,
        }
    }
}

/// Which family of records a listing manages. Selects the create/edit modal,
/// the row projection and the delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Free-form records edited through the generic field form
    Fields,
    /// Collections carrying uploaded images
    Images,
    /// Collections carrying external links
    Links,
}

/// Request that deletes one row
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteTarget {
    pub endpoint: String,
    pub id: RecordId,
    pub body: Option<Value>,
}

/// One projected table row
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: Option<RecordId>,
    /// Display text, one per column
    pub cells: Vec<String>,
    /// First link of a link collection
    pub link_id: Option<RecordId>,
    pub url: Option<String>,
    /// First image of an image collection
    pub image: Option<String>,
    pub image_count: usize,
    /// Raw record as returned by the listing
    pub record: Value,
}

impl ResourceKind {
    pub fn project_row(&self, columns: &[String], record: &Value) -> Row {
        match self {
            ResourceKind::Images => match serde_json::from_value::<ImageCollection>(record.clone()) {
                Ok(collection) => image_row(collection, record),
                Err(_) => field_row(columns, record),
            },
            ResourceKind::Links => match serde_json::from_value::<LinkCollection>(record.clone()) {
                Ok(collection) => link_row(collection, record),
                Err(_) => field_row(columns, record),
            },
            ResourceKind::Fields => field_row(columns, record),
        }
    }

    /// The request that deletes `row`, or None when the row has nothing to delete
    pub fn delete_target(&self, endpoint: &str, row: &Row) -> Option<DeleteTarget> {
        let endpoint = endpoint.trim_end_matches('/');
        match self {
            ResourceKind::Images => Some(DeleteTarget {
                endpoint: format!("{}/delete-all", endpoint),
                id: row.id.clone()?,
                body: None,
            }),
            ResourceKind::Links => {
                let product_id = row.id.clone()?;
                let body = serde_json::to_value(LinkDeleteBody { product_id }).ok()?;
                Some(DeleteTarget {
                    endpoint: endpoint.to_string(),
                    id: row.link_id.clone()?,
                    body: Some(body),
                })
            }
            ResourceKind::Fields => Some(DeleteTarget {
                endpoint: endpoint.to_string(),
                id: row.id.clone()?,
                body: None,
            }),
        }
    }

    /// Banner text when a row deletion fails
    pub fn delete_failure_message(&self) -> &'static str {
        match self {
            ResourceKind::Images => "Failed to delete collection",
            ResourceKind::Links => "Failed to delete link",
            ResourceKind::Fields => "Failed to delete item",
        }
    }
}

fn field_row(columns: &[String], record: &Value) -> Row {
    Row {
        id: record_id(record),
        cells: columns
            .iter()
            .map(|column| display(record.get(column.to_lowercase())))
            .collect(),
        link_id: None,
        url: None,
        image: None,
        image_count: 0,
        record: record.clone(),
    }
}

fn image_row(collection: ImageCollection, record: &Value) -> Row {
    let image = collection.images.first().map(|img| img.image.clone());
    let upload_date = collection
        .upload_date()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();

    Row {
        id: Some(collection.id.clone()),
        cells: vec![
            collection.id.to_string(),
            image.clone().unwrap_or_default(),
            collection.title,
            collection.description,
            upload_date,
        ],
        link_id: None,
        url: None,
        image,
        image_count: collection.images.len(),
        record: record.clone(),
    }
}

fn link_row(collection: LinkCollection, record: &Value) -> Row {
    let first = collection.links.first();
    let url = first.map(|l| l.url.clone());

    Row {
        id: Some(collection.id.clone()),
        cells: vec![
            collection.id.to_string(),
            collection.title,
            url.clone().unwrap_or_else(|| "-".to_string()),
            collection.description,
        ],
        link_id: first.map(|l| l.id.clone()),
        url,
        image: None,
        image_count: 0,
        record: record.clone(),
    }
}

fn record_id(record: &Value) -> Option<RecordId> {
    match record.get("id")? {
        Value::String(s) => Some(RecordId::from(s.as_str())),
        Value::Number(n) => Some(match n.as_i64() {
            Some(n) => RecordId::from(n),
            None => RecordId::from(n.to_string()),
        }),
        _ => None,
    }
}

fn display(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Everything a listing surface needs to know about one resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceConfig {
    pub title: String,
    pub kind: ResourceKind,
    pub endpoint: String,
    /// Admin page route; detail pages live under `{route}/{id}`
    pub route: String,
    pub columns: Vec<String>,
    pub fields: Vec<FieldDescriptor>,
    /// Record keys the server searches; informational only
    pub search_fields: Vec<String>,
}

impl ResourceConfig {
    pub fn museum_collections() -> Self {
        Self {
            title: "Museum Collections".to_string(),
            kind: ResourceKind::Fields,
            endpoint: "/api/specs".to_string(),
            route: "/admin/specs".to_string(),
            columns: strings(&["Name", "Description", "Location", "Year"]),
            fields: vec![
                FieldDescriptor::new("name", "Name", FieldKind::Text),
                FieldDescriptor::new("description", "Description", FieldKind::Textarea),
                FieldDescriptor::new("location", "Location", FieldKind::Text),
                FieldDescriptor::new("year", "Year", FieldKind::Number),
            ],
            search_fields: strings(&["name", "description", "location"]),
        }
    }

    pub fn image_collections() -> Self {
        Self {
            title: "Image Collections".to_string(),
            kind: ResourceKind::Images,
            endpoint: "/images".to_string(),
            route: "/admin/images".to_string(),
            columns: strings(&["ID", "Preview", "Title", "Description", "Upload Date"]),
            fields: vec![
                FieldDescriptor::new("title", "Title", FieldKind::Text),
                FieldDescriptor::new("description", "Description", FieldKind::Textarea),
            ],
            search_fields: strings(&["title", "description"]),
        }
    }

    pub fn link_collections() -> Self {
        Self {
            title: "Link Collections".to_string(),
            kind: ResourceKind::Links,
            endpoint: "/links".to_string(),
            route: "/admin/links".to_string(),
            columns: strings(&["ID", "Title", "URL", "Description"]),
            fields: vec![
                FieldDescriptor::new("title", "Title", FieldKind::Text),
                FieldDescriptor::new("description", "Description", FieldKind::Textarea),
                FieldDescriptor::new("url", "Link", FieldKind::Text),
            ],
            search_fields: strings(&["title", "description"]),
        }
    }

    /// Look up a built-in resource by its CLI name
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "specs" | "museum" => Some(Self::museum_collections()),
            "images" => Some(Self::image_collections()),
            "links" => Some(Self::link_collections()),
            _ => None,
        }
    }

    pub fn project_row(&self, record: &Value) -> Row {
        self.kind.project_row(&self.columns, record)
    }

    pub fn delete_target(&self, row: &Row) -> Option<DeleteTarget> {
        self.kind.delete_target(&self.endpoint, row)
    }

    /// Page that edits one record, separate from its API endpoint
    pub fn detail_route(&self, id: &RecordId) -> String {
        format!("{}/{}", self.route.trim_end_matches('/'), id)
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
