//! SurrealDB implementation of the transaction engine.
//!
//! Steps are buffered on the handle and sent as one
//! `BEGIN TRANSACTION; ...; COMMIT TRANSACTION;` query at commit time,
//! so a failure in any step cancels every other step. Each step's
//! parameters are renamed to `$s<index>_<name>` before sending so two
//! steps may bind the same name without clashing.

use std::collections::HashSet;

use surrealdb::{Connection, Surreal};
use tracing::{debug, error};
use tracker_core::error::{TrackerError, TrackerResult};
use tracker_core::transaction::{Statement, Transaction, TransactionEngine};

use crate::error::DbError;

/// Opens [`SurrealTransaction`]s against one client.
#[derive(Clone)]
pub struct SurrealTransactionEngine<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTransactionEngine<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> TransactionEngine for SurrealTransactionEngine<C> {
    type Tx = SurrealTransaction<C>;

    async fn begin(&self) -> TrackerResult<SurrealTransaction<C>> {
        Ok(SurrealTransaction {
            db: self.db.clone(),
            steps: Vec::new(),
            closed: false,
        })
    }
}

pub struct SurrealTransaction<C: Connection> {
    db: Surreal<C>,
    steps: Vec<Statement>,
    closed: bool,
}

impl<C: Connection> SurrealTransaction<C> {
    /// Number of registered steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl<C: Connection> Transaction for SurrealTransaction<C> {
    async fn step(&mut self, statement: Statement) -> TrackerResult<()> {
        if self.closed {
            return Err(TrackerError::Transaction(
                "transaction is no longer open".into(),
            ));
        }
        self.steps.push(statement);
        Ok(())
    }

    async fn commit(&mut self) -> TrackerResult<()> {
        if self.closed {
            return Err(TrackerError::Transaction(
                "transaction is no longer open".into(),
            ));
        }
        self.closed = true;
        let steps = std::mem::take(&mut self.steps);
        if steps.is_empty() {
            return Ok(());
        }

        let (sql, bindings) = assemble(steps);
        debug!(statements = bindings.len(), "Committing transaction");

        let mut query = self.db.query(sql);
        for (name, value) in bindings {
            query = query.bind((name, value));
        }

        let response = query.await.map_err(DbError::from)?;
        response.check().map_err(|e| {
            error!(error = %e, "Transaction commit failed");
            DbError::Query(e.to_string())
        })?;
        Ok(())
    }

    async fn abort(&mut self) {
        if !self.closed {
            debug!(steps = self.steps.len(), "Aborting transaction");
        }
        self.closed = true;
        self.steps.clear();
    }
}

/// Join buffered steps into one transactional query, renaming each
/// step's parameters with a per-step prefix.
fn assemble(steps: Vec<Statement>) -> (String, Vec<(String, serde_json::Value)>) {
    let mut sql = String::from("BEGIN TRANSACTION;\n");
    let mut bindings = Vec::new();

    for (index, step) in steps.into_iter().enumerate() {
        let prefix = format!("s{index}_");
        let (text, params) = step.into_parts();
        let names: HashSet<&str> = params.iter().map(|(n, _)| n.as_str()).collect();
        let renamed = prefix_params(&text, &prefix, &names);
        sql.push_str(renamed.trim().trim_end_matches(';'));
        sql.push_str(";\n");
        for (name, value) in &params {
            bindings.push((format!("{prefix}{name}"), value.clone()));
        }
    }

    sql.push_str("COMMIT TRANSACTION;");
    (sql, bindings)
}

/// Rewrite `$name` to `$<prefix>name` for every name in `names`,
/// leaving string literals, quoted identifiers and other parameters
/// (`$value`, `$this`, ...) untouched.
fn prefix_params(sql: &str, prefix: &str, names: &HashSet<&str>) -> String {
    let mut out = String::with_capacity(sql.len() + names.len() * prefix.len());
    let mut chars = sql.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                out.push(c);
                let mut escaped = false;
                for (_, next) in chars.by_ref() {
                    out.push(next);
                    if escaped {
                        escaped = false;
                    } else if next == '\\' {
                        escaped = true;
                    } else if next == c {
                        break;
                    }
                }
            }
            '$' => {
                let start = i + 1;
                let mut end = start;
                while let Some(&(j, next)) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        end = j + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let ident = &sql[start..end];
                out.push('$');
                if names.contains(ident) {
                    out.push_str(prefix);
                }
                out.push_str(ident);
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names<'a>(list: &[&'a str]) -> HashSet<&'a str> {
        list.iter().copied().collect()
    }

    #[test]
    fn prefixes_only_bound_params() {
        let sql = "UPDATE type::record('user', $id) SET name = $name WHERE $value != NONE";
        let out = prefix_params(sql, "s0_", &names(&["id", "name"]));
        assert_eq!(
            out,
            "UPDATE type::record('user', $s0_id) SET name = $s0_name WHERE $value != NONE"
        );
    }

    #[test]
    fn leaves_quoted_text_alone() {
        let sql = "CREATE x SET note = 'cost: $id', tag = `$id`, id2 = $id";
        let out = prefix_params(sql, "s3_", &names(&["id"]));
        assert_eq!(out, "CREATE x SET note = 'cost: $id', tag = `$id`, id2 = $s3_id");
    }

    #[test]
    fn does_not_prefix_longer_identifiers() {
        let out = prefix_params("$org AND $org_key", "s1_", &names(&["org"]));
        assert_eq!(out, "$s1_org AND $org_key");
    }

    #[test]
    fn assemble_wraps_steps_in_one_transaction() {
        let steps = vec![
            Statement::new("DELETE affiliation WHERE in = $org;").bind("org", "a"),
            Statement::new("DELETE claim WHERE in = $org").bind("org", "b"),
        ];
        let (sql, bindings) = assemble(steps);
        assert!(sql.starts_with("BEGIN TRANSACTION;"));
        assert!(sql.ends_with("COMMIT TRANSACTION;"));
        assert!(sql.contains("DELETE affiliation WHERE in = $s0_org;"));
        assert!(sql.contains("DELETE claim WHERE in = $s1_org;"));
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[1].0, "s1_org");
        assert_eq!(bindings[1].1, serde_json::Value::from("b"));
    }
}
