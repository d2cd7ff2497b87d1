//! Document session facade.
//!
//! # Responsibility
//! - Expose the document lifecycle surface: transactions, undo/redo,
//!   recomputation, save and load.
//! - Emit lifecycle logging events with stable keys.
//!
//! # Invariants
//! - One session owns one document; sessions never share labels.
//! - Load replaces the whole document; undo history does not survive it.

use crate::document::{Document, DocumentError, ErrorClass};
use crate::function::recompute::{recompute, RecomputeError, RecomputeOutcome};
use crate::function::DriverRegistry;
use crate::model::attribute::AttributeFactory;
use crate::store::{
    load_document, open_document_db, save_document, StoreError,
};
use crate::transaction::TransactionToken;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Errors surfaced by the session facade.
#[derive(Debug)]
pub enum SessionError {
    Document(DocumentError),
    Recompute(RecomputeError),
    Store(StoreError),
}

impl SessionError {
    /// Maps this error onto the front-end error taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Document(err) => err.class(),
            Self::Recompute(err) => err.class(),
            Self::Store(err) => err.class(),
        }
    }
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document(err) => write!(f, "{err}"),
            Self::Recompute(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Document(err) => Some(err),
            Self::Recompute(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<DocumentError> for SessionError {
    fn from(value: DocumentError) -> Self {
        Self::Document(value)
    }
}

impl From<RecomputeError> for SessionError {
    fn from(value: RecomputeError) -> Self {
        Self::Recompute(value)
    }
}

impl From<StoreError> for SessionError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// One document plus the registries a front end needs to drive it.
pub struct DocumentSession {
    document: Document,
    drivers: DriverRegistry,
    factory: AttributeFactory,
}

impl Default for DocumentSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentSession {
    /// Creates a session around a fresh document.
    pub fn new() -> Self {
        info!("event=document_new module=service status=ok");
        Self {
            document: Document::new(),
            drivers: DriverRegistry::new(),
            factory: AttributeFactory::with_standard_types(),
        }
    }

    /// The owned document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Mutable access for editing code and drivers.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Driver registry consulted by `recompute`.
    pub fn drivers_mut(&mut self) -> &mut DriverRegistry {
        &mut self.drivers
    }

    /// Attribute factory consulted by `load`.
    pub fn factory_mut(&mut self) -> &mut AttributeFactory {
        &mut self.factory
    }

    /// Opens a transaction scope.
    pub fn open_transaction(&mut self) -> Result<TransactionToken, SessionError> {
        let token = self.document.open_transaction()?;
        info!(
            "event=transaction_open module=service status=ok serial={} depth={}",
            token.serial(),
            self.document.undo_depth()
        );
        Ok(token)
    }

    /// Commits the innermost scope.
    pub fn commit_transaction(&mut self) -> Result<bool, SessionError> {
        let pushed = self.document.commit_transaction()?;
        info!(
            "event=transaction_commit module=service status=ok undoable={pushed} undo_depth={}",
            self.document.undo_depth()
        );
        Ok(pushed)
    }

    /// Aborts the innermost scope, rolling it back.
    pub fn abort_transaction(&mut self) -> Result<(), SessionError> {
        self.document.abort_transaction()?;
        info!("event=transaction_abort module=service status=ok");
        Ok(())
    }

    /// Reverts the most recent committed transaction.
    pub fn undo(&mut self) -> Result<(), SessionError> {
        match self.document.undo() {
            Ok(()) => {
                info!(
                    "event=undo module=service status=ok undo_depth={} redo_depth={}",
                    self.document.undo_depth(),
                    self.document.redo_depth()
                );
                Ok(())
            }
            Err(err) => {
                if err.class() == ErrorClass::Corruption {
                    warn!("event=undo module=service status=corrupted error={err}");
                }
                Err(err.into())
            }
        }
    }

    /// Re-applies the most recently undone transaction.
    pub fn redo(&mut self) -> Result<(), SessionError> {
        match self.document.redo() {
            Ok(()) => {
                info!(
                    "event=redo module=service status=ok undo_depth={} redo_depth={}",
                    self.document.undo_depth(),
                    self.document.redo_depth()
                );
                Ok(())
            }
            Err(err) => {
                if err.class() == ErrorClass::Corruption {
                    warn!("event=redo module=service status=corrupted error={err}");
                }
                Err(err.into())
            }
        }
    }

    /// Runs one recomputation pass over the touched labels.
    pub fn recompute(&mut self) -> Result<RecomputeOutcome, SessionError> {
        let outcome = recompute(&mut self.document, &self.drivers)?;
        info!(
            "event=recompute module=service status=ok executed={}",
            outcome.executed.len()
        );
        Ok(outcome)
    }

    /// Writes the document snapshot to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let mut conn = open_document_db(path)?;
        save_document(&self.document, &mut conn)?;
        Ok(())
    }

    /// Replaces the session's document with the snapshot at `path`.
    ///
    /// Discards the current document including its undo history.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let conn = open_document_db(path)?;
        self.document = load_document(&conn, &self.factory)?;
        Ok(())
    }
}
