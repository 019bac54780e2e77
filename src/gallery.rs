// # Public Gallery
//
// Page model for the public gallery: URL slugs for items and the category
// filter shared between the gallery grid and its navigation bar. The filter is
// owned by the page and borrowed by whatever renders the navigation.

use chrono::NaiveDate;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

/// Category that disables filtering
pub const ALL_CATEGORIES: &str = "All";

/// Where invalid or unknown slugs send the visitor
pub const GALLERY_PATH: &str = "/gallery";

/// Loading delay of the gallery grid
pub const DEFAULT_LOAD_DELAY: Duration = Duration::from_millis(800);

fn special_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^A-Za-z0-9_\s-]").unwrap())
}

fn separators() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[\s_-]+").unwrap())
}

fn slug_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+-[a-z0-9-]+$").unwrap())
}

/// Build a URL slug like `1-amoghapasa` from an item id and title
pub fn generate_slug(id: &str, title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped = special_chars().replace_all(lowered.trim(), "");
    let hyphenated = separators().replace_all(&stripped, "-");
    format!("{}-{}", id, hyphenated.trim_matches('-'))
}

/// The id part of a slug (everything before the first hyphen)
pub fn id_from_slug(slug: &str) -> &str {
    slug.split('-').next().unwrap_or(slug)
}

pub fn is_valid_slug(slug: &str) -> bool {
    slug_pattern().is_match(slug)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryItem {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub image_url: String,
    pub category: String,
    /// Free-form details shown on the item page (maker, material, ...)
    pub metadata: BTreeMap<String, String>,
    pub created_at: NaiveDate,
}

impl GalleryItem {
    /// Create an item, deriving its slug from id and title
    pub fn new(
        id: &str,
        title: &str,
        description: &str,
        image_url: &str,
        category: &str,
        created_at: NaiveDate,
    ) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            slug: generate_slug(id, title),
            description: description.to_string(),
            image_url: image_url.to_string(),
            category: category.to_string(),
            metadata: BTreeMap::new(),
            created_at,
        }
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// Category choices and the current selection, scoped to one gallery page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFilter {
    categories: Vec<String>,
    selected: String,
}

impl Default for CategoryFilter {
    fn default() -> Self {
        Self {
            categories: vec![ALL_CATEGORIES.to_string()],
            selected: ALL_CATEGORIES.to_string(),
        }
    }
}

impl CategoryFilter {
    /// "All" followed by each distinct category in first-seen order
    pub fn from_items(items: &[GalleryItem]) -> Self {
        let mut filter = Self::default();
        for item in items {
            if !filter.categories.contains(&item.category) {
                filter.categories.push(item.category.clone());
            }
        }
        filter
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn selected(&self) -> &str {
        &self.selected
    }

    /// Select a category. Unknown categories are ignored.
    pub fn select(&mut self, category: &str) -> bool {
        if !self.categories.iter().any(|c| c == category) {
            return false;
        }
        self.selected = category.to_string();
        true
    }

    pub fn matches(&self, item: &GalleryItem) -> bool {
        self.selected == ALL_CATEGORIES || item.category == self.selected
    }

    pub fn apply<'a>(&self, items: &'a [GalleryItem]) -> Vec<&'a GalleryItem> {
        items.iter().filter(|item| self.matches(item)).collect()
    }
}

/// Result of opening an item page by slug
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlugLookup<'a> {
    Found(&'a GalleryItem),
    Redirect(&'static str),
}

/// The gallery grid: loads items after a short delay and filters by category
#[derive(Debug, Clone)]
pub struct GalleryPage {
    items: Vec<GalleryItem>,
    filter: CategoryFilter,
    loading: bool,
    delay: Duration,
}

impl Default for GalleryPage {
    fn default() -> Self {
        Self::new(DEFAULT_LOAD_DELAY)
    }
}

impl GalleryPage {
    pub fn new(delay: Duration) -> Self {
        Self {
            items: Vec::new(),
            filter: CategoryFilter::default(),
            loading: true,
            delay,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Show `items` once the loading delay has passed
    pub async fn load(&mut self, items: Vec<GalleryItem>) {
        self.loading = true;
        tokio::time::sleep(self.delay).await;

        debug!("Gallery loaded {} item(s)", items.len());
        self.filter = CategoryFilter::from_items(&items);
        self.items = items;
        self.loading = false;
    }

    pub fn filter(&self) -> &CategoryFilter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut CategoryFilter {
        &mut self.filter
    }

    pub fn items(&self) -> &[GalleryItem] {
        &self.items
    }

    /// Items in the selected category
    pub fn visible_items(&self) -> Vec<&GalleryItem> {
        self.filter.apply(&self.items)
    }

    /// Find the item for a detail page, or send the visitor back to the gallery
    pub fn find_by_slug(&self, slug: &str) -> SlugLookup<'_> {
        if !is_valid_slug(slug) {
            return SlugLookup::Redirect(GALLERY_PATH);
        }
        match self.items.iter().find(|item| item.slug == slug) {
            Some(item) => SlugLookup::Found(item),
            None => SlugLookup::Redirect(GALLERY_PATH),
        }
    }
}
