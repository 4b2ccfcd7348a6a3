//! Per-request state handed to every mutation.

use surrealdb::{Connection, Surreal};
use tracker_auth::{AuthConfig, token};
use tracker_core::error::TrackerResult;
use tracker_core::models::user::Language;
use tracker_db::loader::Loaders;
use uuid::Uuid;

pub struct RequestContext<C: Connection> {
    /// Key of the authenticated caller, if any.
    pub user_key: Option<Uuid>,
    pub ip_address: Option<String>,
    pub language: Language,
    pub loaders: Loaders<C>,
}

impl<C: Connection> RequestContext<C> {
    pub fn new(db: &Surreal<C>, user_key: Option<Uuid>) -> Self {
        Self {
            user_key,
            ip_address: None,
            language: Language::default(),
            loaders: Loaders::new(db),
        }
    }

    /// Build a context from an `Authorization` header. A bad token fails
    /// the whole request; a missing one yields an anonymous context.
    pub fn from_bearer(
        db: &Surreal<C>,
        header: Option<&str>,
        config: &AuthConfig,
    ) -> TrackerResult<Self> {
        let user_key = token::authenticate_bearer(header, config)?;
        Ok(Self::new(db, user_key))
    }

    pub fn with_ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }
}
