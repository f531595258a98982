use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// A filter names a field outside the vocabulary of the active route.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// The metric/route/criteria combination has no classification rule.
    #[error("Unsupported criteria: {0}")]
    UnsupportedCriteria(String),

    /// An event source failed to execute a query.
    #[error("Source error: {0}")]
    Source(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
