//! Domain model for person records.
//!
//! # Responsibility
//! - Define the single record shape passed into and returned from repositories.
//!
//! # Invariants
//! - Every person is identified by a non-negative integer `PersonId`.

pub mod person;
