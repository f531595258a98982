//! Row structs for the event and profile tables.
//!
//! Each event row converts into its `velocity_core::event` record; the
//! profile row converts into a `VelocityProfile`.

pub mod bucket;
pub mod commit;
pub mod issue;
pub mod job_run;
pub mod pull_request;
pub mod velocity_profile;
