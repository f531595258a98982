//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Event repositories read through
//! compiled predicates rendered by [`crate::sql`].

pub mod aggregate_repo;
pub mod commit_repo;
pub mod issue_repo;
pub mod job_run_repo;
pub mod pull_request_repo;
pub mod velocity_profile_repo;

pub use aggregate_repo::AggregateRepo;
pub use commit_repo::CommitRepo;
pub use issue_repo::IssueRepo;
pub use job_run_repo::JobRunRepo;
pub use pull_request_repo::PullRequestRepo;
pub use velocity_profile_repo::VelocityProfileRepo;

use velocity_core::error::CoreError;

/// Failure while reading events through a compiled predicate.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The predicate could not be rendered for this table.
    #[error(transparent)]
    Render(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
