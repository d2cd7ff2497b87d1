//! Opaque shape references for naming evolution.
//!
//! # Responsibility
//! - Give the naming layer a comparable, hashable, copyable shape value.
//!
//! # Invariants
//! - A `ShapeRef` never changes once minted; geometry lives outside the kernel.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Opaque handle standing in for one shape produced by an external modeler.
///
/// The kernel only needs identity: equality, ordering and hashing. Structural
/// content stays with the modeling layer that minted the reference.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ShapeRef(Uuid);

impl ShapeRef {
    /// Mints a fresh, globally unique shape reference.
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an identity owned by an external modeler.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying identity value.
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Display for ShapeRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
