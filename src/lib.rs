// ABOUTME: Public library API for readwise-atoms highlight sync
// ABOUTME: Re-exports core modules for external use

pub mod api;
pub mod auth;
pub mod cli;
pub mod commands;
pub mod error;
pub mod model;
pub mod notify;
pub mod settings;
pub mod storage;
pub mod sync;
pub mod templates;
pub mod util;
pub mod vault;

pub use error::{Error, Result};
pub use model::{Book, ExportPage, Highlight, RecordId};
