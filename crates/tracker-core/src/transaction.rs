//! Unit-of-work traits for multi-document writes.
//!
//! A [`Transaction`] is an explicit handle passed by value to the code
//! that owns it. [`Transaction::step`] registers one parameterized
//! statement, [`Transaction::commit`] is the only path that makes the
//! registered writes durable, and [`Transaction::abort`] releases the
//! handle after any failure.

use serde_json::Value;

use crate::error::TrackerResult;

/// One parameterized graph query.
///
/// Parameters are referenced in `sql` as `$name` and bound by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    bindings: Vec<(String, Value)>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bindings: Vec::new(),
        }
    }

    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.bindings.push((name.to_string(), value.into()));
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn bindings(&self) -> &[(String, Value)] {
        &self.bindings
    }

    pub fn into_parts(self) -> (String, Vec<(String, Value)>) {
        (self.sql, self.bindings)
    }
}

pub trait Transaction: Send {
    /// Register one statement to run as part of this transaction.
    fn step(&mut self, statement: Statement) -> impl Future<Output = TrackerResult<()>> + Send;

    /// Atomically apply every registered statement.
    fn commit(&mut self) -> impl Future<Output = TrackerResult<()>> + Send;

    /// Discard the transaction. Never fails.
    fn abort(&mut self) -> impl Future<Output = ()> + Send;
}

pub trait TransactionEngine: Send + Sync {
    type Tx: Transaction;

    fn begin(&self) -> impl Future<Output = TrackerResult<Self::Tx>> + Send;
}
