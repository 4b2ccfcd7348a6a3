//! Tracker Core: domain models, the affiliation role hierarchy, error
//! types and the repository/transaction traits shared by every crate.

pub mod error;
pub mod global_id;
pub mod models;
pub mod mutation;
pub mod repository;
pub mod transaction;
