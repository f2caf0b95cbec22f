//! Person domain record.
//!
//! # Responsibility
//! - Carry identity and contact fields between callers and repositories.
//! - Describe which fields survive a round trip through storage.
//!
//! # Invariants
//! - `id` is non-negative; it is the primary key in storage.
//! - Only `id`, `name` and `email` are persisted. The remaining fields are
//!   accepted on writes and come back unset on reads.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Primary key of a person row.
pub type PersonId = i64;

/// Person record used for every repository read and write.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    /// Never serialized.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<i64>,
}

/// Rejection reasons from [`Person::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonValidationError {
    NegativeId(PersonId),
}

impl Display for PersonValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegativeId(id) => write!(f, "person id must be non-negative, got {id}"),
        }
    }
}

impl Error for PersonValidationError {}

impl Person {
    /// Creates a person with only the persisted fields populated.
    pub fn new(id: PersonId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            ..Self::default()
        }
    }

    /// Returns the projection a repository read yields after this value is written.
    pub fn persisted(&self) -> Person {
        Person::new(self.id, self.name.clone(), self.email.clone())
    }

    /// Checks the in-process invariants; uniqueness and nullability are left to storage.
    pub fn validate(&self) -> Result<(), PersonValidationError> {
        if self.id < 0 {
            return Err(PersonValidationError::NegativeId(self.id));
        }
        Ok(())
    }
}
