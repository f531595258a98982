//! Request handlers.
//!
//! Handlers resolve the workflow profile, delegate to the engine or the
//! corresponding repository, and map errors via [`crate::error::AppError`].

pub mod dora;
pub mod velocity_profile;
