//! Domain models for the tracker.
//!
//! Vertices (users, organizations, domains, audit records) and the
//! graph edges that connect them.

pub mod affiliation;
pub mod audit;
pub mod domain;
pub mod organization;
pub mod permission;
pub mod user;
