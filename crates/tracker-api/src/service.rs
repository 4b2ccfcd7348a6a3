//! The mutation service and the pipeline steps shared by every mutation.

use std::sync::Arc;

use serde_json::Value;
use surrealdb::{Connection, Surreal};
use tracing::{debug, error};
use tracker_auth::{AuthConfig, PermissionResolver, gates};
use tracker_core::error::{TrackerError, TrackerResult};
use tracker_core::models::audit::InitiatedBy;
use tracker_core::models::permission::Permission;
use tracker_core::models::user::User;
use tracker_core::transaction::{Statement, Transaction, TransactionEngine};
use tracker_db::repository::{
    SurrealAffiliationRepository, SurrealClaimRepository, SurrealDomainRepository,
    SurrealOrganizationRepository,
};

use crate::audit::AuditLogger;
use crate::context::RequestContext;
use crate::error::OrUnableTo;
use crate::notify::{Notification, Notifier, TracingNotifier};
use crate::publish::{Publisher, TracingPublisher};

/// Entry point for every mutation.
///
/// Generic over the client connection so tests can run against an
/// in-memory database, and over the transaction engine so tests can
/// inject step and commit failures.
pub struct Mutations<C: Connection, E: TransactionEngine> {
    pub(crate) db: Surreal<C>,
    pub(crate) engine: Arc<E>,
    pub(crate) orgs: SurrealOrganizationRepository<C>,
    pub(crate) domains: SurrealDomainRepository<C>,
    pub(crate) claims: SurrealClaimRepository<C>,
    pub(crate) resolver: PermissionResolver<SurrealAffiliationRepository<C>>,
    pub(crate) audit: AuditLogger<E>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) publisher: Arc<dyn Publisher>,
    pub(crate) config: AuthConfig,
}

impl<C: Connection, E: TransactionEngine> Mutations<C, E> {
    pub fn new(db: Surreal<C>, engine: E, config: AuthConfig) -> Self {
        let engine = Arc::new(engine);
        Self {
            orgs: SurrealOrganizationRepository::new(db.clone()),
            domains: SurrealDomainRepository::new(db.clone()),
            claims: SurrealClaimRepository::new(db.clone()),
            resolver: PermissionResolver::new(SurrealAffiliationRepository::new(db.clone())),
            audit: AuditLogger::new(Arc::clone(&engine)),
            notifier: Arc::new(TracingNotifier),
            publisher: Arc::new(TracingPublisher),
            engine,
            db,
            config,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// A fresh request context with empty loader caches.
    pub fn context(&self, user_key: Option<uuid::Uuid>) -> RequestContext<C> {
        RequestContext::new(&self.db, user_key)
    }

    pub fn context_from_bearer(&self, header: Option<&str>) -> TrackerResult<RequestContext<C>> {
        RequestContext::from_bearer(&self.db, header, &self.config)
    }

    // -----------------------------------------------------------------------
    // Gates
    // -----------------------------------------------------------------------

    pub(crate) async fn current_user(&self, ctx: &RequestContext<C>) -> TrackerResult<User> {
        let user = match ctx.user_key {
            Some(key) => ctx.loaders.user_by_key.load(key).await?,
            None => None,
        };
        Ok(gates::user_required(user)?)
    }

    /// Signed in with a validated email address.
    pub(crate) async fn verified_user(&self, ctx: &RequestContext<C>) -> TrackerResult<User> {
        let user = self.current_user(ctx).await?;
        gates::verified_required(&user)?;
        Ok(user)
    }

    pub(crate) async fn permission(
        &self,
        user: &User,
        org_key: uuid::Uuid,
        action: &str,
    ) -> TrackerResult<Option<Permission>> {
        self.resolver
            .check_permission(user.key, org_key)
            .await
            .or_unable_to(action)
    }

    // -----------------------------------------------------------------------
    // Transactional write
    // -----------------------------------------------------------------------

    /// Run `steps` in one transaction. Any step or commit failure aborts
    /// the transaction and surfaces as the generic "Unable to `action`"
    /// fault.
    pub(crate) async fn write(&self, steps: Vec<Statement>, action: &str) -> TrackerResult<()> {
        let mut tx = self.engine.begin().await.map_err(|e| {
            error!(error = %e, action, "Unable to open transaction");
            TrackerError::unable_to(action)
        })?;

        for step in steps {
            if let Err(e) = tx.step(step).await {
                error!(error = %e, action, "Transaction step error");
                tx.abort().await;
                return Err(TrackerError::unable_to(action));
            }
        }

        if let Err(e) = tx.commit().await {
            error!(error = %e, action, "Transaction commit error");
            tx.abort().await;
            return Err(TrackerError::unable_to(action));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Post-commit effects
    // -----------------------------------------------------------------------

    pub(crate) async fn notify(&self, notification: Notification) {
        let kind = notification.kind();
        if let Err(e) = self.notifier.send(notification).await {
            error!(error = %e, kind, "Unable to send notification");
        }
    }

    pub(crate) async fn publish(&self, channel: &str, payload: Value) {
        match self.publisher.publish(channel, payload).await {
            Ok(()) => debug!(channel, "Published"),
            Err(e) => error!(error = %e, channel, "Unable to publish message"),
        }
    }

    pub(crate) fn initiated_by(
        &self,
        ctx: &RequestContext<C>,
        user: &User,
        role: Option<Permission>,
    ) -> InitiatedBy {
        InitiatedBy {
            id: user.key,
            user_name: user.user_name.clone(),
            role,
            ip_address: ctx.ip_address.clone(),
        }
    }
}
