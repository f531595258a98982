//! Deployment-event classification and DORA time-series aggregation.
//!
//! This crate has no database or HTTP dependencies: it compiles profiles
//! into predicates, resolves deployment criteria, buckets counts, derives
//! bands, and talks to the outside world only through the traits in
//! [`source`].

pub mod band;
pub mod bucketing;
pub mod criteria;
pub mod drilldown;
pub mod engine;
pub mod error;
pub mod event;
pub mod filter;
pub mod memory;
pub mod profile;
pub mod request;
pub mod scoring;
pub mod source;
pub mod types;
