//! Request-scoped batching loaders.
//!
//! A [`Loader`] memoizes point lookups for the lifetime of one request.
//! Concurrent [`Loader::load`] calls that arrive while a batch is being
//! assembled are coalesced into a single [`BatchLoad::load_batch`]
//! query. Missing entities are cached as `None`; only infrastructure
//! faults are errors. Callers [`Loader::clear`] a key after writing the
//! entity so later reads in the same request see fresh state.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;

use surrealdb::{Connection, Surreal};
use tokio::sync::{Mutex, Notify};
use tracing::debug;
use tracker_core::error::TrackerResult;
use tracker_core::models::domain::{Domain, clean_domain_name};
use tracker_core::models::organization::Organization;
use tracker_core::models::user::User;
use tracker_core::repository::{DomainRepository, OrganizationRepository, UserRepository};
use uuid::Uuid;

use crate::repository::{
    SurrealDomainRepository, SurrealOrganizationRepository, SurrealUserRepository,
};

/// One batched lookup. Keys absent from the returned map are cached as
/// missing.
pub trait BatchLoad: Send + Sync {
    type Key: Clone + Eq + Hash + Send + Sync;
    type Value: Clone + Send + Sync;

    fn load_batch(
        &self,
        keys: &[Self::Key],
    ) -> impl Future<Output = TrackerResult<HashMap<Self::Key, Self::Value>>> + Send;
}

struct LoaderState<K, V> {
    cache: HashMap<K, Option<V>>,
    /// Keys waiting for the next batch.
    queued: Vec<K>,
    queued_notify: Arc<Notify>,
    /// A leader has been elected for the queued keys.
    scheduled: bool,
    /// Keys whose batch is running, with the notifier for that batch.
    in_flight: HashMap<K, Arc<Notify>>,
}

pub struct Loader<B: BatchLoad> {
    batch: B,
    state: Mutex<LoaderState<B::Key, B::Value>>,
}

impl<B: BatchLoad> Loader<B> {
    pub fn new(batch: B) -> Self {
        Self {
            batch,
            state: Mutex::new(LoaderState {
                cache: HashMap::new(),
                queued: Vec::new(),
                queued_notify: Arc::new(Notify::new()),
                scheduled: false,
                in_flight: HashMap::new(),
            }),
        }
    }

    /// Load one entity, joining any batch that is currently forming.
    pub async fn load(&self, key: B::Key) -> TrackerResult<Option<B::Value>> {
        loop {
            let mut state = self.state.lock().await;
            if let Some(hit) = state.cache.get(&key) {
                return Ok(hit.clone());
            }

            let wait_on = if let Some(notify) = state.in_flight.get(&key) {
                Some(notify.clone())
            } else if state.scheduled {
                if !state.queued.contains(&key) {
                    state.queued.push(key.clone());
                }
                Some(state.queued_notify.clone())
            } else {
                None
            };

            let Some(notify) = wait_on else {
                state.queued.push(key.clone());
                state.scheduled = true;
                drop(state);
                return self.dispatch(&key).await;
            };

            // Register before releasing the lock so the wake-up cannot be
            // missed. A failed batch leaves the key uncached and the next
            // iteration retries it as leader.
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            drop(state);
            notified.await;
        }
    }

    /// Load several entities with one query for every uncached key.
    pub async fn load_many(&self, keys: &[B::Key]) -> TrackerResult<Vec<Option<B::Value>>> {
        let missing: Vec<B::Key> = {
            let state = self.state.lock().await;
            let mut seen = HashSet::new();
            keys.iter()
                .filter(|k| !state.cache.contains_key(*k) && seen.insert((*k).clone()))
                .cloned()
                .collect()
        };

        if !missing.is_empty() {
            debug!(keys = missing.len(), "Loading batch");
            let mut found = self.batch.load_batch(&missing).await?;
            let mut state = self.state.lock().await;
            for key in missing {
                let value = found.remove(&key);
                state.cache.insert(key, value);
            }
        }

        let state = self.state.lock().await;
        Ok(keys
            .iter()
            .map(|k| state.cache.get(k).cloned().flatten())
            .collect())
    }

    /// Forget one cached entry.
    pub async fn clear(&self, key: &B::Key) {
        self.state.lock().await.cache.remove(key);
    }

    pub async fn clear_all(&self) {
        self.state.lock().await.cache.clear();
    }

    /// Seed the cache with a value the caller already holds.
    pub async fn prime(&self, key: B::Key, value: B::Value) {
        self.state.lock().await.cache.insert(key, Some(value));
    }

    async fn dispatch(&self, key: &B::Key) -> TrackerResult<Option<B::Value>> {
        // Let sibling futures on this task enqueue their keys first.
        tokio::task::yield_now().await;

        let (keys, notify) = {
            let mut state = self.state.lock().await;
            let keys = std::mem::take(&mut state.queued);
            let notify = std::mem::replace(&mut state.queued_notify, Arc::new(Notify::new()));
            state.scheduled = false;
            for k in &keys {
                state.in_flight.insert(k.clone(), notify.clone());
            }
            (keys, notify)
        };

        debug!(keys = keys.len(), "Loading batch");
        let outcome = self.batch.load_batch(&keys).await;

        let mut state = self.state.lock().await;
        for k in &keys {
            state.in_flight.remove(k);
        }
        let result = match outcome {
            Ok(mut found) => {
                for k in keys {
                    let value = found.remove(&k);
                    state.cache.insert(k, value);
                }
                Ok(state.cache.get(key).cloned().flatten())
            }
            Err(e) => Err(e),
        };
        notify.notify_waiters();
        result
    }
}

// ---------------------------------------------------------------------------
// Entity loaders
// ---------------------------------------------------------------------------

pub struct UsersByKey<R>(pub R);

impl<R: UserRepository> BatchLoad for UsersByKey<R> {
    type Key = Uuid;
    type Value = User;

    async fn load_batch(&self, keys: &[Uuid]) -> TrackerResult<HashMap<Uuid, User>> {
        let users = self.0.get_many(keys).await?;
        Ok(users.into_iter().map(|u| (u.key, u)).collect())
    }
}

/// Keyed by lower-case user name.
pub struct UsersByUserName<R>(pub R);

impl<R: UserRepository> BatchLoad for UsersByUserName<R> {
    type Key = String;
    type Value = User;

    async fn load_batch(&self, keys: &[String]) -> TrackerResult<HashMap<String, User>> {
        let users = self.0.get_many_by_user_name(keys).await?;
        Ok(users
            .into_iter()
            .map(|u| (u.user_name.to_lowercase(), u))
            .collect())
    }
}

pub struct OrganizationsByKey<R>(pub R);

impl<R: OrganizationRepository> BatchLoad for OrganizationsByKey<R> {
    type Key = Uuid;
    type Value = Organization;

    async fn load_batch(&self, keys: &[Uuid]) -> TrackerResult<HashMap<Uuid, Organization>> {
        let orgs = self.0.get_many(keys).await?;
        Ok(orgs.into_iter().map(|o| (o.key, o)).collect())
    }
}

/// Keyed by slug in either language.
pub struct OrganizationsBySlug<R>(pub R);

impl<R: OrganizationRepository> BatchLoad for OrganizationsBySlug<R> {
    type Key = String;
    type Value = Organization;

    async fn load_batch(&self, keys: &[String]) -> TrackerResult<HashMap<String, Organization>> {
        let orgs = self.0.get_many_by_slug(keys).await?;
        let mut by_slug = HashMap::with_capacity(orgs.len() * 2);
        for org in orgs {
            by_slug.insert(org.fr.slug.clone(), org.clone());
            by_slug.insert(org.en.slug.clone(), org);
        }
        Ok(by_slug)
    }
}

pub struct DomainsByKey<R>(pub R);

impl<R: DomainRepository> BatchLoad for DomainsByKey<R> {
    type Key = Uuid;
    type Value = Domain;

    async fn load_batch(&self, keys: &[Uuid]) -> TrackerResult<HashMap<Uuid, Domain>> {
        let domains = self.0.get_many(keys).await?;
        Ok(domains.into_iter().map(|d| (d.key, d)).collect())
    }
}

/// Keyed by cleaned domain name.
pub struct DomainsByName<R>(pub R);

impl<R: DomainRepository> BatchLoad for DomainsByName<R> {
    type Key = String;
    type Value = Domain;

    async fn load_batch(&self, keys: &[String]) -> TrackerResult<HashMap<String, Domain>> {
        let domains = self.0.get_many_by_name(keys).await?;
        Ok(domains
            .into_iter()
            .map(|d| (clean_domain_name(&d.domain), d))
            .collect())
    }
}

/// The loaders available to one request.
pub struct Loaders<C: Connection> {
    pub user_by_key: Loader<UsersByKey<SurrealUserRepository<C>>>,
    pub user_by_user_name: Loader<UsersByUserName<SurrealUserRepository<C>>>,
    pub org_by_key: Loader<OrganizationsByKey<SurrealOrganizationRepository<C>>>,
    pub org_by_slug: Loader<OrganizationsBySlug<SurrealOrganizationRepository<C>>>,
    pub domain_by_key: Loader<DomainsByKey<SurrealDomainRepository<C>>>,
    pub domain_by_name: Loader<DomainsByName<SurrealDomainRepository<C>>>,
}

impl<C: Connection> Loaders<C> {
    pub fn new(db: &Surreal<C>) -> Self {
        let users = SurrealUserRepository::new(db.clone());
        let orgs = SurrealOrganizationRepository::new(db.clone());
        let domains = SurrealDomainRepository::new(db.clone());
        Self {
            user_by_key: Loader::new(UsersByKey(users.clone())),
            user_by_user_name: Loader::new(UsersByUserName(users)),
            org_by_key: Loader::new(OrganizationsByKey(orgs.clone())),
            org_by_slug: Loader::new(OrganizationsBySlug(orgs)),
            domain_by_key: Loader::new(DomainsByKey(domains.clone())),
            domain_by_name: Loader::new(DomainsByName(domains)),
        }
    }

    pub async fn clear_user(&self, user: &User) {
        self.user_by_key.clear(&user.key).await;
        self.user_by_user_name
            .clear(&user.user_name.to_lowercase())
            .await;
    }

    pub async fn clear_org(&self, org: &Organization) {
        self.org_by_key.clear(&org.key).await;
        self.org_by_slug.clear(&org.en.slug).await;
        self.org_by_slug.clear(&org.fr.slug).await;
    }

    pub async fn clear_domain(&self, domain: &Domain) {
        self.domain_by_key.clear(&domain.key).await;
        self.domain_by_name
            .clear(&clean_domain_name(&domain.domain))
            .await;
    }
}
