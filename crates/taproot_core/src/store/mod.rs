//! SQLite document files: bootstrap, migration and snapshot codec.
//!
//! # Responsibility
//! - Open and migrate document database files.
//! - Persist and rebuild full document snapshots through the generic
//!   attribute field-list contract.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - One row shape serves every attribute type; no per-type SQL exists.
//! - Undo/redo history is never persisted.

use crate::document::ErrorClass;
use crate::model::attribute::FactoryError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod document_store;
pub mod migrations;
mod open;

pub use document_store::{load_document, save_document};
pub use open::{open_document_db, open_document_db_in_memory};

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from document persistence.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite failure.
    Sqlite(rusqlite::Error),
    /// Document file was written by a newer schema than this binary knows.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Persisted rows cannot be converted back into a valid document.
    InvalidData(String),
    /// Attribute rebuild failed in the factory registry.
    Factory(FactoryError),
}

impl StoreError {
    /// Maps this error onto the front-end error taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Sqlite(_) | Self::UnsupportedSchemaVersion { .. } => ErrorClass::Domain,
            Self::InvalidData(_) | Self::Factory(_) => ErrorClass::Corruption,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "document schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted document: {message}"),
            Self::Factory(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Factory(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<FactoryError> for StoreError {
    fn from(value: FactoryError) -> Self {
        Self::Factory(value)
    }
}
