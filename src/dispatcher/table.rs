use crate::api::{ApiError, CollectionApi};
use crate::dispatcher::listing::{ListingController, ListingState};
use crate::dispatcher::modal::{CreateSurface, LinkFormModal};
use crate::dispatcher::resource::{DeleteTarget, ResourceConfig, ResourceKind, Row};
use crate::import::{Encoder, SubmitError, ValidationError};
use crate::lock::{DeletionLock, DeletionTicket, LockError};
use crate::models::RecordId;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("No row is awaiting deletion")]
    NothingToDelete,
    #[error("This action isn't available for this listing")]
    Unsupported,
    #[error("No row at position {0}")]
    NoSuchRow(usize),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Network(#[from] ApiError),
}

/// Row actions the caller supports. An action is only rendered when present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCapabilities {
    pub edit: bool,
    pub delete: bool,
}

impl RowCapabilities {
    pub fn all() -> Self {
        Self {
            edit: true,
            delete: true,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

/// Where an edit action leads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditAction {
    /// Open a detail page at this path
    Navigate(String),
    /// The edit form is now the open modal
    Modal,
    /// Hand the record id to the caller's own edit handler
    Delegate(RecordId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub cells: Vec<String>,
    pub can_edit: bool,
    pub can_delete: bool,
    /// Busy indicator while this row's deletion is in flight
    pub deleting: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationView {
    pub page: u32,
    pub total_pages: u32,
    pub can_prev: bool,
    pub can_next: bool,
}

/// Everything a renderer needs to draw the listing
#[derive(Debug, Clone, PartialEq)]
pub struct TableView {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<RowView>,
    /// Shown in place of rows ("Loading...", "No items found", or a load error)
    pub placeholder: Option<String>,
    /// None when there is at most one page
    pub pagination: Option<PaginationView>,
    pub summary: Option<String>,
    pub error: Option<String>,
}

/// Configuration-driven listing with search, pagination, a create/edit modal
/// and confirmed row deletion.
pub struct RecordDispatcher {
    api: Arc<dyn CollectionApi>,
    config: ResourceConfig,
    capabilities: RowCapabilities,
    listing: ListingController,
    rows: Vec<Row>,
    modal: Option<CreateSurface>,
    confirm: Option<DeleteTarget>,
    lock: DeletionLock,
    error: Option<String>,
    encoder: Arc<dyn Encoder>,
    encode_concurrency: Option<usize>,
}

impl RecordDispatcher {
    pub fn new(
        api: Arc<dyn CollectionApi>,
        config: ResourceConfig,
        capabilities: RowCapabilities,
        page_size: u32,
        encoder: Arc<dyn Encoder>,
        encode_concurrency: Option<usize>,
    ) -> Self {
        Self {
            api,
            config,
            capabilities,
            listing: ListingController::new(page_size),
            rows: Vec::new(),
            modal: None,
            confirm: None,
            lock: DeletionLock::new(),
            error: None,
            encoder,
            encode_concurrency,
        }
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    pub fn listing(&self) -> &ListingController {
        &self.listing
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Fetch the current page if anything invalidated it
    pub async fn refresh(&mut self) -> Result<(), ApiError> {
        // A clamped page goes stale again, so this runs at most twice
        while self.listing.needs_fetch() {
            let query = self.listing.begin_load();
            debug!(
                "Loading {} page {} (search {:?})",
                self.config.title, query.page, query.search
            );

            match self.api.list(&self.config.endpoint, &query).await {
                Ok(listing) => {
                    self.rows = listing
                        .items
                        .iter()
                        .map(|record| self.config.project_row(record))
                        .collect();
                    self.listing.finish_load(listing);
                }
                Err(e) => {
                    error!("Failed to load {}: {}", self.config.title, e);
                    self.rows.clear();
                    self.listing.fail_load(&e);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    pub fn set_search(&mut self, search: &str) {
        self.listing.set_search(search);
    }

    pub fn next_page(&mut self) -> bool {
        self.listing.next()
    }

    pub fn prev_page(&mut self) -> bool {
        self.listing.prev()
    }

    pub fn go_to_page(&mut self, page: u32) -> u32 {
        self.listing.go_to(page)
    }

    pub fn view(&self) -> TableView {
        let mut columns = self.config.columns.clone();
        if self.capabilities.edit || self.capabilities.delete {
            columns.push("Actions".to_string());
        }

        let placeholder = match self.listing.state() {
            ListingState::Idle | ListingState::Loading => Some("Loading...".to_string()),
            ListingState::LoadError(message) => Some(message.clone()),
            ListingState::Loaded(_) if self.rows.is_empty() => {
                Some("No items found".to_string())
            }
            ListingState::Loaded(_) => None,
        };

        let rows = self
            .rows
            .iter()
            .map(|row| {
                let target = self.config.delete_target(row);
                RowView {
                    cells: row.cells.clone(),
                    can_edit: self.capabilities.edit,
                    can_delete: self.capabilities.delete && !self.lock.is_busy() && target.is_some(),
                    deleting: target.is_some_and(|t| self.lock.is_locked(&t.id)),
                }
            })
            .collect();

        let pagination = self.listing.show_pagination().then(|| PaginationView {
            page: self.listing.page(),
            total_pages: self.listing.total_pages(),
            can_prev: self.listing.can_prev(),
            can_next: self.listing.can_next(),
        });

        TableView {
            title: self.config.title.clone(),
            columns,
            rows,
            placeholder,
            pagination,
            summary: self.listing.summary(),
            error: self.error.clone(),
        }
    }

    /// Open the create surface for this resource kind
    pub fn open_create(&mut self) -> &mut CreateSurface {
        self.error = None;
        self.modal.insert(CreateSurface::open(
            &self.config,
            self.api.clone(),
            self.encoder.clone(),
            self.encode_concurrency,
        ))
    }

    pub fn modal(&self) -> Option<&CreateSurface> {
        self.modal.as_ref()
    }

    pub fn modal_mut(&mut self) -> Option<&mut CreateSurface> {
        self.modal.as_mut()
    }

    /// Close the modal. Refused while its submission is pending.
    pub fn close_modal(&mut self) -> bool {
        match &self.modal {
            Some(surface) if surface.modal().is_pending() => false,
            _ => {
                self.modal = None;
                true
            }
        }
    }

    /// Submit the open modal. On success the modal closes and the listing refetches.
    pub async fn submit_modal(&mut self) -> Result<Value, SubmitError> {
        let Some(surface) = self.modal.as_mut() else {
            return Err(SubmitError::NotOpen);
        };

        let created = surface.modal_mut().submit().await?;
        info!("{}: saved, refreshing listing", self.config.title);
        self.modal = None;
        self.listing.invalidate();
        if let Err(e) = self.refresh().await {
            self.error = Some(e.user_message());
        }
        Ok(created)
    }

    /// Start editing a row
    pub fn open_edit(&mut self, index: usize) -> Result<EditAction, DispatchError> {
        if !self.capabilities.edit {
            return Err(DispatchError::Unsupported);
        }
        let row = self.rows.get(index).ok_or(DispatchError::NoSuchRow(index))?;

        match self.config.kind {
            ResourceKind::Images => {
                let id = row.id.clone().ok_or(DispatchError::NoSuchRow(index))?;
                Ok(EditAction::Navigate(self.config.detail_route(&id)))
            }
            ResourceKind::Links => {
                let modal = LinkFormModal::edit(self.api.clone(), &self.config.endpoint, row)
                    .map_err(|e| {
                        self.error = Some(e.to_string());
                        e
                    })?;
                self.modal = Some(CreateSurface::Links(modal));
                Ok(EditAction::Modal)
            }
            ResourceKind::Fields => {
                let id = row.id.clone().ok_or(DispatchError::NoSuchRow(index))?;
                Ok(EditAction::Delegate(id))
            }
        }
    }

    /// Ask for confirmation before deleting a row
    pub fn request_delete(&mut self, index: usize) -> Result<&DeleteTarget, DispatchError> {
        if !self.capabilities.delete {
            return Err(DispatchError::Unsupported);
        }
        if let Some(held) = self.lock.held() {
            return Err(LockError::Busy { held: held.clone() }.into());
        }
        let row = self.rows.get(index).ok_or(DispatchError::NoSuchRow(index))?;
        let target = self
            .config
            .delete_target(row)
            .ok_or(DispatchError::NothingToDelete)?;
        Ok(self.confirm.insert(target))
    }

    pub fn pending_delete(&self) -> Option<&DeleteTarget> {
        self.confirm.as_ref()
    }

    /// Dismiss the confirmation. Refused while the deletion is in flight.
    pub fn cancel_delete(&mut self) -> bool {
        if self.lock.is_busy() {
            return false;
        }
        self.confirm = None;
        true
    }

    /// Take the deletion lock for the confirmed row
    pub fn begin_delete(&mut self) -> Result<(DeleteTarget, DeletionTicket), DispatchError> {
        let target = self.confirm.clone().ok_or(DispatchError::NothingToDelete)?;
        let ticket = self.lock.try_lock(&target.id)?;
        Ok((target, ticket))
    }

    /// Apply a deletion result and release the lock
    pub fn finish_delete(
        &mut self,
        ticket: DeletionTicket,
        result: Result<(), ApiError>,
    ) -> Result<(), DispatchError> {
        let outcome = match result {
            Ok(()) => {
                info!("{}: deleted {}", self.config.title, ticket.id());
                self.confirm = None;
                self.error = None;
                self.listing.invalidate();
                Ok(())
            }
            Err(e) => {
                error!("{}: failed to delete {}: {}", self.config.title, ticket.id(), e);
                self.error = Some(self.config.kind.delete_failure_message().to_string());
                Err(DispatchError::Network(e))
            }
        };
        self.lock.unlock(ticket);
        outcome
    }

    /// Delete the confirmed row and refetch the listing
    pub async fn confirm_delete(&mut self) -> Result<(), DispatchError> {
        let (target, ticket) = self.begin_delete()?;
        let result = self
            .api
            .delete(&target.endpoint, &target.id, target.body.as_ref())
            .await;
        self.finish_delete(ticket, result)?;

        if let Err(e) = self.refresh().await {
            self.error = Some(e.user_message());
        }
        Ok(())
    }
}
