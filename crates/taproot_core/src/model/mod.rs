//! Canonical domain model for the taproot document kernel.
//!
//! # Responsibility
//! - Define the data shapes shared by tree, transaction, naming and store layers.
//! - Keep identity rules (entries, type ids, shape refs) in one place.
//!
//! # Invariants
//! - Every label is addressable by a stable dotted entry (`0:1:3`).
//! - Attribute type ids are 128-bit values, globally unique and stable.
//! - Deletion is represented by tombstone flags, not by slot reuse.

pub mod attribute;
pub mod entry;
pub mod shape;
