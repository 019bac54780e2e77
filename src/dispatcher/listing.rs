use crate::api::{ApiError, ListQuery};
use crate::models::PaginatedListing;
use serde_json::Value;
use tracing::debug;

/// Fetch state of one listing surface
#[derive(Debug, Clone, PartialEq)]
pub enum ListingState {
    Idle,
    Loading,
    Loaded(PaginatedListing<Value>),
    LoadError(String),
}

/// Page, search text and the last fetched page for one listing.
///
/// The page never leaves `[1, total_pages]`, so a request outside that range
/// is never issued.
#[derive(Debug, Clone)]
pub struct ListingController {
    page: u32,
    page_size: u32,
    search: String,
    total_pages: u32,
    state: ListingState,
    stale: bool,
}

impl ListingController {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            search: String::new(),
            total_pages: 1,
            state: ListingState::Idle,
            stale: true,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn state(&self) -> &ListingState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == ListingState::Loading
    }

    /// True when the cached page no longer matches page/search or a mutation happened
    pub fn needs_fetch(&self) -> bool {
        self.stale
    }

    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    /// Change the search text. Always goes back to page 1.
    pub fn set_search(&mut self, search: &str) {
        self.search = search.to_string();
        self.page = 1;
        self.invalidate();
    }

    pub fn can_prev(&self) -> bool {
        self.page > 1
    }

    pub fn can_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// Pagination controls are only rendered for more than one page
    pub fn show_pagination(&self) -> bool {
        self.total_pages > 1
    }

    pub fn next(&mut self) -> bool {
        if !self.can_next() {
            return false;
        }
        self.page += 1;
        self.invalidate();
        true
    }

    pub fn prev(&mut self) -> bool {
        if !self.can_prev() {
            return false;
        }
        self.page -= 1;
        self.invalidate();
        true
    }

    /// Jump to a page, clamped to the known range. Returns the page chosen.
    pub fn go_to(&mut self, page: u32) -> u32 {
        let page = page.clamp(1, self.total_pages);
        if page != self.page {
            self.page = page;
            self.invalidate();
        }
        page
    }

    pub fn query(&self) -> ListQuery {
        ListQuery::new(self.page, self.page_size, &self.search)
    }

    /// Enter Loading and return the query to send
    pub fn begin_load(&mut self) -> ListQuery {
        self.state = ListingState::Loading;
        self.stale = false;
        self.query()
    }

    /// Store a fetched page. If the server now reports fewer pages than the
    /// current page, the page is clamped and the listing goes stale again.
    pub fn finish_load(&mut self, listing: PaginatedListing<Value>) {
        self.total_pages = listing.total_pages.max(1);
        if self.page > self.total_pages {
            debug!(
                "Page {} is past the last page {}, clamping",
                self.page, self.total_pages
            );
            self.page = self.total_pages;
            self.stale = true;
        }
        self.state = ListingState::Loaded(listing);
    }

    /// Record a failed fetch. Page and search are kept for the next attempt.
    pub fn fail_load(&mut self, error: &ApiError) {
        self.state = ListingState::LoadError(error.user_message());
    }

    pub fn listing(&self) -> Option<&PaginatedListing<Value>> {
        match &self.state {
            ListingState::Loaded(listing) => Some(listing),
            _ => None,
        }
    }

    /// "Showing X to Y of Z" for a loaded, non-empty listing
    pub fn summary(&self) -> Option<String> {
        let listing = self.listing()?;
        if listing.total == 0 {
            return None;
        }

        let page_size = if listing.page_size > 0 {
            listing.page_size
        } else {
            self.page_size
        } as u64;
        let page = self.page as u64;
        let from = (page - 1) * page_size + 1;
        let to = (page * page_size).min(listing.total);

        Some(format!("Showing {} to {} of {}", from, to, listing.total))
    }
}
