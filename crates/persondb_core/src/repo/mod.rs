//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the person CRUD contract and its transaction/lifecycle extension.
//! - Isolate SQLite statements, decoding and time budgets from callers.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `DuplicateId`,
//!   `Decode`) in addition to store transport errors.
//! - No operation retries; every failure reaches the immediate caller.

pub mod limits;
pub mod memory;
pub mod person_repo;
