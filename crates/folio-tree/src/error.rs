//! Tree error types.
//!
//! Every fallible tree operation returns [`TreeError`]. Callers that only
//! care about the category (e.g. to pick an HTTP status) use
//! [`TreeError::kind`].

use std::fmt;

/// Entity kinds stored in the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    Documentation,
    PageGroup,
    Page,
}

impl Entity {
    /// Snake-case name used in error codes.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Documentation => "documentation",
            Self::PageGroup => "page_group",
            Self::Page => "page",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic error categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum TreeErrorKind {
    /// Referenced entity does not exist.
    NotFound,
    /// Cycle, cross-tree parent, negative order, duplicate slug.
    InvalidStructure,
    /// Uniqueness clash or failed transaction. Safe to retry.
    Conflict,
}

/// Error returned by tree operations.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Entity with the given id does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of the missing entity.
        entity: Entity,
        /// Requested id.
        id: i64,
    },

    /// Operation would break a structural invariant of the tree.
    #[error("invalid structure: {0}")]
    InvalidStructure(String),

    /// Uniqueness clash with another live entity.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Underlying database failure; the transaction was rolled back.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl TreeError {
    pub(crate) fn not_found(entity: Entity, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidStructure(message.into())
    }

    /// Semantic category of this error.
    #[must_use]
    pub fn kind(&self) -> TreeErrorKind {
        match self {
            Self::NotFound { .. } => TreeErrorKind::NotFound,
            Self::InvalidStructure(_) => TreeErrorKind::InvalidStructure,
            Self::Conflict(_) | Self::Database(_) => TreeErrorKind::Conflict,
        }
    }

    /// Stable snake-case code for API responses (e.g. `page_not_found`).
    #[must_use]
    pub fn code(&self) -> String {
        match self {
            Self::NotFound { entity, .. } => format!("{entity}_not_found"),
            Self::InvalidStructure(_) => "invalid_structure".to_owned(),
            Self::Conflict(_) => "conflict".to_owned(),
            Self::Database(_) => "transaction_failed".to_owned(),
        }
    }
}
