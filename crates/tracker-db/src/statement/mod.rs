//! Write statements registered as transaction steps.
//!
//! Each builder returns one parameterized [`Statement`]; the mutation
//! that owns the transaction decides their order. Optional values are
//! never bound as `NULL`: absent options are written as `NONE` in the
//! statement text instead.
//!
//! [`Statement`]: tracker_core::transaction::Statement

pub mod audit;
pub mod domain;
pub mod edge;
pub mod organization;
pub mod user;
