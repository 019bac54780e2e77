use crate::api::{ApiError, CollectionApi};
use crate::import::assembler::{
    assemble, assemble_update, Assembly, RecordDraft, SkippedFile, SubmitPolicy, ValidationError,
};
use crate::import::batch::Batch;
use crate::import::encoder::Encoder;
use crate::import::file_key::{FileKey, FileRef};
use crate::import::tracker::{ConversionState, ConversionTracker, ConversionUpdate};
use crate::lock::{DeletionLock, DeletionTicket, LockError};
use crate::models::{ImageCollection, ImageCreatePayload, ImageUpdatePayload, RecordId};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Network(#[from] ApiError),
    #[error("A submission is already in progress")]
    AlreadyPending,
    #[error("No form is open")]
    NotOpen,
}

/// Display status of one staged file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileStatus {
    Waiting,
    Converting,
    /// Encoded payload, displayable as an image source
    Preview(String),
    Failed(String),
}

/// One entry of the staged file grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTile {
    /// Position in the batch, used to remove the file
    pub index: usize,
    pub name: String,
    pub byte_size: u64,
    pub key: FileKey,
    pub status: TileStatus,
}

/// A batch and the tracker converting it, kept in step
struct StagedFiles {
    batch: Batch,
    tracker: ConversionTracker,
}

impl StagedFiles {
    fn new(encoder: Arc<dyn Encoder>, concurrency: Option<usize>) -> Self {
        Self {
            batch: Batch::new(),
            tracker: ConversionTracker::new(encoder, concurrency),
        }
    }

    fn add(&mut self, files: Vec<FileRef>) -> usize {
        let added = self.batch.add_files(files);
        let submitted = self.tracker.sync(&self.batch);
        debug!("Staged {} file(s), {} new conversion(s)", added, submitted);
        added
    }

    fn remove(&mut self, index: usize) -> Option<FileRef> {
        let removed = self.batch.remove(index)?;
        self.tracker.sync(&self.batch);
        Some(removed)
    }

    fn clear(&mut self) {
        self.batch.clear();
        self.tracker.clear();
    }

    fn tiles(&self) -> Vec<FileTile> {
        self.batch
            .files()
            .iter()
            .enumerate()
            .map(|(index, file)| {
                let key = file.key();
                let status = match self.tracker.state(&key) {
                    Some(ConversionState::InFlight) => TileStatus::Converting,
                    Some(ConversionState::Ready(payload)) => TileStatus::Preview(payload.clone()),
                    Some(ConversionState::Failed(reason)) => TileStatus::Failed(reason.clone()),
                    Some(ConversionState::Queued) | None => TileStatus::Waiting,
                };
                FileTile {
                    index,
                    name: file.name().to_string(),
                    byte_size: file.byte_size(),
                    key,
                    status,
                }
            })
            .collect()
    }
}

/// Result of a successful create submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    /// Server response body
    pub created: Value,
    pub image_count: usize,
    pub skipped: Vec<SkippedFile>,
}

/// State behind the "Upload Images" modal: a draft, staged files and their
/// conversions. Discarded when the modal closes or the upload succeeds.
pub struct UploadSession {
    api: Arc<dyn CollectionApi>,
    endpoint: String,
    draft: RecordDraft,
    staged: StagedFiles,
    policy: SubmitPolicy,
    pending: Option<Vec<SkippedFile>>,
    error: Option<String>,
}

impl UploadSession {
    pub fn new(
        api: Arc<dyn CollectionApi>,
        endpoint: impl Into<String>,
        encoder: Arc<dyn Encoder>,
        concurrency: Option<usize>,
    ) -> Self {
        Self {
            api,
            endpoint: endpoint.into(),
            draft: RecordDraft::default(),
            staged: StagedFiles::new(encoder, concurrency),
            policy: SubmitPolicy::default(),
            pending: None,
            error: None,
        }
    }

    pub fn with_policy(mut self, policy: SubmitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn draft(&self) -> &RecordDraft {
        &self.draft
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.draft.title = title.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.draft.description = description.into();
    }

    /// Append selected or dropped files and start converting any new keys
    pub fn add_files(&mut self, files: Vec<FileRef>) -> usize {
        self.staged.add(files)
    }

    pub fn remove_file(&mut self, index: usize) -> Option<FileRef> {
        self.staged.remove(index)
    }

    pub fn retry(&mut self, key: &FileKey) -> bool {
        self.staged.tracker.retry(key)
    }

    pub fn files(&self) -> &[FileRef] {
        self.staged.batch.files()
    }

    pub fn tracker(&self) -> &ConversionTracker {
        &self.staged.tracker
    }

    /// Apply conversion results that have already arrived
    pub fn poll(&mut self) -> Vec<ConversionUpdate> {
        self.staged.tracker.poll()
    }

    pub async fn next_update(&mut self) -> Option<ConversionUpdate> {
        self.staged.tracker.next_update().await
    }

    /// Wait for every staged file to finish converting
    pub async fn settle(&mut self) -> Vec<ConversionUpdate> {
        self.staged.tracker.settle().await
    }

    pub fn view(&self) -> Vec<FileTile> {
        self.staged.tiles()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Submit control is disabled while a request is outstanding
    pub fn can_submit(&self) -> bool {
        !self.is_pending()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Validate and assemble the payload, marking the session pending.
    ///
    /// Validation failures set the error banner and never mark the session pending.
    pub fn begin_submit(&mut self) -> Result<ImageCreatePayload, SubmitError> {
        if self.is_pending() {
            return Err(SubmitError::AlreadyPending);
        }

        let Assembly { payload, skipped } = assemble(
            &self.draft,
            &self.staged.batch,
            &self.staged.tracker,
            self.policy,
        )
        .map_err(|e| {
            self.error = Some(e.to_string());
            e
        })?;

        info!(
            "Submitting '{}' with {} image(s) to {}",
            payload.title,
            payload.images.len(),
            self.endpoint
        );
        self.error = None;
        self.pending = Some(skipped);
        Ok(payload)
    }

    /// Record the mutation's result. Success resets the session; failure keeps
    /// the draft and files for another attempt.
    pub fn finish_submit(
        &mut self,
        image_count: usize,
        result: Result<Value, ApiError>,
    ) -> Result<SubmitOutcome, SubmitError> {
        let skipped = self.pending.take().unwrap_or_default();

        match result {
            Ok(created) => {
                info!("Uploaded {} image(s) to {}", image_count, self.endpoint);
                self.draft = RecordDraft::default();
                self.staged.clear();
                Ok(SubmitOutcome {
                    created,
                    image_count,
                    skipped,
                })
            }
            Err(e) => {
                error!("Upload to {} failed: {}", self.endpoint, e);
                self.error = Some(format!("Failed to upload images: {}", e.user_message()));
                Err(SubmitError::Network(e))
            }
        }
    }

    /// Validate, assemble and create the collection
    pub async fn submit(&mut self) -> Result<SubmitOutcome, SubmitError> {
        let payload = self.begin_submit()?;
        let image_count = payload.images.len();

        let result = match serde_json::to_value(&payload) {
            Ok(body) => self.api.create(&self.endpoint, &body).await,
            Err(e) => Err(ApiError::from(e)),
        };
        self.finish_submit(image_count, result)
    }
}

/// Outcome of loading a detail view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailLoad {
    Loaded,
    /// The record doesn't exist; go back to this listing endpoint
    Redirect(String),
}

/// State behind the image collection detail page: view, edit with new files,
/// and per-image deletion.
pub struct ImageDetailSession {
    api: Arc<dyn CollectionApi>,
    endpoint: String,
    id: RecordId,
    record: Option<ImageCollection>,
    editing: bool,
    draft: RecordDraft,
    staged: StagedFiles,
    policy: SubmitPolicy,
    saving: bool,
    lock: DeletionLock,
    error: Option<String>,
}

impl ImageDetailSession {
    pub fn new(
        api: Arc<dyn CollectionApi>,
        endpoint: impl Into<String>,
        id: RecordId,
        encoder: Arc<dyn Encoder>,
        concurrency: Option<usize>,
    ) -> Self {
        Self {
            api,
            endpoint: endpoint.into(),
            id,
            record: None,
            editing: false,
            draft: RecordDraft::default(),
            staged: StagedFiles::new(encoder, concurrency),
            policy: SubmitPolicy::default(),
            saving: false,
            lock: DeletionLock::new(),
            error: None,
        }
    }

    pub fn with_policy(mut self, policy: SubmitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn record(&self) -> Option<&ImageCollection> {
        self.record.as_ref()
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn draft(&self) -> &RecordDraft {
        &self.draft
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    async fn fetch(&self) -> Result<ImageCollection, ApiError> {
        let body = self.api.get(&self.endpoint, &self.id).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Fetch the record. A missing record asks the caller to go back to the listing.
    pub async fn load(&mut self) -> Result<DetailLoad, ApiError> {
        match self.fetch().await {
            Ok(record) => {
                debug!(
                    "Loaded image collection {} with {} image(s)",
                    record.id,
                    record.images.len()
                );
                self.draft = RecordDraft::new(record.title.clone(), record.description.clone());
                self.record = Some(record);
                self.error = None;
                Ok(DetailLoad::Loaded)
            }
            Err(ApiError::NotFound) => {
                info!("Image collection {} not found, redirecting", self.id);
                Ok(DetailLoad::Redirect(self.endpoint.clone()))
            }
            Err(e) => {
                error!("Failed to load image collection {}: {}", self.id, e);
                self.error = Some("Failed to fetch data".to_string());
                Err(e)
            }
        }
    }

    pub fn begin_edit(&mut self) {
        self.editing = true;
    }

    /// Leave edit mode, restoring the draft and dropping staged files
    pub fn cancel_edit(&mut self) {
        if self.saving {
            return;
        }
        self.editing = false;
        if let Some(record) = &self.record {
            self.draft = RecordDraft::new(record.title.clone(), record.description.clone());
        }
        self.staged.clear();
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.draft.title = title.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.draft.description = description.into();
    }

    pub fn add_files(&mut self, files: Vec<FileRef>) -> usize {
        self.staged.add(files)
    }

    pub fn remove_file(&mut self, index: usize) -> Option<FileRef> {
        self.staged.remove(index)
    }

    pub fn retry(&mut self, key: &FileKey) -> bool {
        self.staged.tracker.retry(key)
    }

    pub fn poll(&mut self) -> Vec<ConversionUpdate> {
        self.staged.tracker.poll()
    }

    pub async fn settle(&mut self) -> Vec<ConversionUpdate> {
        self.staged.tracker.settle().await
    }

    pub fn view(&self) -> Vec<FileTile> {
        self.staged.tiles()
    }

    fn update_payload(&mut self) -> Result<ImageUpdatePayload, SubmitError> {
        if self.saving {
            return Err(SubmitError::AlreadyPending);
        }
        self.error = None;

        let assembly = assemble_update(
            &self.draft,
            &self.staged.batch,
            &self.staged.tracker,
            self.policy,
        )
        .map_err(|e| {
            self.error = Some(e.to_string());
            e
        })?;
        Ok(assembly.payload)
    }

    /// Save title, description and any new images, then reload the record
    pub async fn save(&mut self) -> Result<(), SubmitError> {
        let payload = self.update_payload()?;
        self.saving = true;

        let added = payload.images.as_ref().map_or(0, Vec::len);
        info!("Saving image collection {} ({} new image(s))", self.id, added);

        let result = match serde_json::to_value(&payload) {
            Ok(body) => self.api.update(&self.endpoint, &self.id, &body).await,
            Err(e) => Err(ApiError::from(e)),
        };
        let result = match result {
            Ok(_) => self.fetch().await,
            Err(e) => Err(e),
        };
        self.saving = false;

        match result {
            Ok(record) => {
                self.draft = RecordDraft::new(record.title.clone(), record.description.clone());
                self.record = Some(record);
                self.editing = false;
                self.staged.clear();
                Ok(())
            }
            Err(e) => {
                error!("Failed to save image collection {}: {}", self.id, e);
                self.error = Some("Failed to save changes".to_string());
                Err(SubmitError::Network(e))
            }
        }
    }

    /// Delete control for `image_id` is disabled while any deletion is running
    pub fn can_delete_image(&self) -> bool {
        !self.lock.is_busy()
    }

    /// True while `image_id` shows its "Deleting..." overlay
    pub fn is_deleting(&self, image_id: &RecordId) -> bool {
        self.lock.is_locked(image_id)
    }

    /// Claim the deletion slot for one image, after the caller has confirmed
    pub fn begin_delete_image(&mut self, image_id: &RecordId) -> Result<DeletionTicket, LockError> {
        self.lock.try_lock(image_id)
    }

    /// Apply a deletion result and release the slot.
    /// Success removes the image locally without refetching.
    pub fn finish_delete_image(
        &mut self,
        ticket: DeletionTicket,
        result: Result<(), ApiError>,
    ) -> Result<(), ApiError> {
        let outcome = match result {
            Ok(()) => {
                if let Some(record) = &mut self.record {
                    record.images.retain(|img| &img.id != ticket.id());
                }
                info!("Deleted image {}", ticket.id());
                Ok(())
            }
            Err(e) => {
                error!("Failed to delete image {}: {}", ticket.id(), e);
                self.error = Some("Failed to delete image".to_string());
                Err(e)
            }
        };
        self.lock.unlock(ticket);
        outcome
    }

    /// Delete one image of this collection under the deletion lock
    pub async fn delete_image(&mut self, image_id: &RecordId) -> Result<(), SubmitError> {
        let ticket = self
            .begin_delete_image(image_id)
            .map_err(|_| SubmitError::AlreadyPending)?;
        let result = self.api.delete(&self.endpoint, image_id, None).await;
        Ok(self.finish_delete_image(ticket, result)?)
    }
}
