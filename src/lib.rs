// Library exports for the CLI and integration tests

pub mod api;
pub mod config;
pub mod dispatcher;
pub mod gallery;
pub mod gallery_client;
pub mod import;
pub mod lock;
pub mod models;

pub use api::{ApiError, CollectionApi, ListQuery};
pub use config::{Config, ConfigError};
pub use gallery_client::GalleryClient;
