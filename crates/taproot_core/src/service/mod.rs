//! Document lifecycle services.
//!
//! # Responsibility
//! - Provide the front-end facing session facade above the document,
//!   transaction, recomputation and store layers.
//!
//! # Invariants
//! - Front ends never reach around the session for lifecycle operations.

pub mod session;
