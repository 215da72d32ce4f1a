//! Movie catalog browser core: a pagination-aware query cache over a remote
//! catalog, plus persisted favorites and view preferences.

pub mod app;
pub mod cache;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod error;
pub mod event;
pub mod favorites;
pub mod format;
pub mod logging;
pub mod preferences;
pub mod query;
pub mod render;
pub mod storage;

pub use error::{HttpError, StorageError};
