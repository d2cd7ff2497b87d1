//! Core kernel for transactional hierarchical attribute documents.
//! This crate is the single source of truth for document invariants.

pub mod document;
pub mod function;
pub mod logging;
pub mod model;
pub mod naming;
pub mod service;
pub mod store;
pub mod transaction;

pub use document::{Children, Document, DocumentError, ErrorClass, LabelFlags, LabelId};
pub use function::logbook::Logbook;
pub use function::recompute::{recompute, RecomputeError, RecomputeOutcome};
pub use function::{
    DriverFailure, DriverRegistry, DriverRegistryError, FunctionAttribute, FunctionDriver,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::attribute::{
    Attribute, AttributeFactory, AttributeTypeId, FactoryError, Field, FieldDecodeError,
    FieldValue, IntegerAttribute, RealAttribute, ReferenceAttribute, TextAttribute,
    TypedAttribute,
};
pub use model::entry::{Entry, EntryParseError, Tag};
pub use model::shape::ShapeRef;
pub use naming::{
    evolution_descendants, Evolution, EvolutionIterator, EvolutionRecord, NamedShapeAttribute,
    NamingError, ShapeBuilder,
};
pub use service::session::{DocumentSession, SessionError};
pub use store::{
    load_document, open_document_db, open_document_db_in_memory, save_document, StoreError,
};
pub use transaction::TransactionToken;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
