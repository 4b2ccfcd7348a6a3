//! SurrealDB implementation of [`UserRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracker_core::error::TrackerResult;
use tracker_core::models::user::{RefreshInfo, User};
use tracker_core::repository::UserRepository;
use uuid::Uuid;

use super::parse_key;
use crate::error::DbError;

const SELECT_USER: &str = "SELECT meta::id(id) AS record_id, * FROM user";

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct UserRowWithId {
    record_id: String,
    user_name: String,
    display_name: String,
    password_hash: String,
    preferred_lang: String,
    email_validated: bool,
    phone_validated: bool,
    tfa_send_method: String,
    failed_login_attempts: u32,
    refresh_id: Option<String>,
    refresh_expires_at: Option<DateTime<Utc>>,
    remember_me: bool,
    tfa_code: Option<String>,
    phone_details: Option<String>,
    insider_user: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRowWithId {
    fn try_into_user(self) -> Result<User, DbError> {
        let refresh_info = match (self.refresh_id, self.refresh_expires_at) {
            (Some(refresh_id), Some(expires_at)) => Some(RefreshInfo {
                refresh_id,
                expires_at,
                remember_me: self.remember_me,
            }),
            _ => None,
        };
        Ok(User {
            key: parse_key(&self.record_id)?,
            user_name: self.user_name,
            display_name: self.display_name,
            password_hash: self.password_hash,
            preferred_lang: self
                .preferred_lang
                .parse()
                .map_err(|e| DbError::Decode(format!("{e}")))?,
            email_validated: self.email_validated,
            phone_validated: self.phone_validated,
            tfa_send_method: self
                .tfa_send_method
                .parse()
                .map_err(|e| DbError::Decode(format!("{e}")))?,
            failed_login_attempts: self.failed_login_attempts,
            refresh_info,
            tfa_code: self.tfa_code,
            phone_details: self.phone_details,
            insider_user: self.insider_user,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the User repository.
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> Clone for SurrealUserRepository<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

fn into_users(rows: Vec<UserRowWithId>) -> TrackerResult<Vec<User>> {
    let users = rows
        .into_iter()
        .map(UserRowWithId::try_into_user)
        .collect::<Result<Vec<_>, DbError>>()?;
    Ok(users)
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn get_by_key(&self, key: Uuid) -> TrackerResult<Option<User>> {
        let mut result = self
            .db
            .query(format!("{SELECT_USER} WHERE id = type::record('user', $id)"))
            .bind(("id", key.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(into_users(rows)?.into_iter().next())
    }

    async fn get_by_user_name(&self, user_name: &str) -> TrackerResult<Option<User>> {
        let mut result = self
            .db
            .query(format!("{SELECT_USER} WHERE user_name = $user_name"))
            .bind(("user_name", user_name.trim().to_lowercase()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(into_users(rows)?.into_iter().next())
    }

    async fn get_many(&self, keys: &[Uuid]) -> TrackerResult<Vec<User>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = keys.iter().map(Uuid::to_string).collect();
        let mut result = self
            .db
            .query(format!("{SELECT_USER} WHERE meta::id(id) INSIDE $ids"))
            .bind(("ids", ids))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        into_users(rows)
    }

    async fn get_many_by_user_name(&self, user_names: &[String]) -> TrackerResult<Vec<User>> {
        if user_names.is_empty() {
            return Ok(Vec::new());
        }
        let names: Vec<String> = user_names.iter().map(|n| n.trim().to_lowercase()).collect();
        let mut result = self
            .db
            .query(format!("{SELECT_USER} WHERE user_name INSIDE $names"))
            .bind(("names", names))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        into_users(rows)
    }
}
