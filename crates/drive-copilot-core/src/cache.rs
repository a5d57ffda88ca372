//! Query cache shared by everything that reads remote resources
//!
//! The cache keeps the latest value of each resource, runs at most one fetch per
//! key at a time, and lets consumers watch a key for changes. Only the cache
//! writes to its entries; a write always replaces the whole value.
//!
//! Every entry carries a generation counter. `invalidate` and `release` bump
//! it, and a response is applied only if it was started in the current
//! generation (and, within a generation, only if nothing newer has landed).
//! A recreated entry never accepts a fetch issued before it was created.
//! `clear` bumps a cache-wide epoch so responses that outlive a teardown are
//! dropped as well.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{ApiError, ApiResult};
use crate::state::{AuthStatus, DriveFile, DriveFolder, IngestionStatus};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    AuthUrl,
    AuthStatus,
    Files,
    Folders,
    Folder(String),
    IngestionStatus,
}

impl ResourceKey {
    pub fn staleness(&self, policy: &CachePolicy) -> Staleness {
        match self {
            ResourceKey::AuthUrl => Staleness::Never,
            // Ingestion status freshness is driven by the monitor's poll schedule
            ResourceKey::AuthStatus | ResourceKey::IngestionStatus => Staleness::Always,
            ResourceKey::Files | ResourceKey::Folders | ResourceKey::Folder(_) => {
                Staleness::After(policy.listing_stale)
            }
        }
    }

    /// Drive listings are only fetched for an authenticated user
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            ResourceKey::Files | ResourceKey::Folders | ResourceKey::Folder(_)
        )
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::AuthUrl => write!(f, "auth-url"),
            ResourceKey::AuthStatus => write!(f, "auth-status"),
            ResourceKey::Files => write!(f, "files"),
            ResourceKey::Folders => write!(f, "folders"),
            ResourceKey::Folder(id) => write!(f, "folder:{}", id),
            ResourceKey::IngestionStatus => write!(f, "ingestion-status"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Always,
    Never,
    After(Duration),
}

impl Staleness {
    pub fn is_fresh(&self, fetched_at: Instant, now: Instant) -> bool {
        match self {
            Staleness::Always => false,
            Staleness::Never => true,
            Staleness::After(window) => now.saturating_duration_since(fetched_at) < *window,
        }
    }
}

/// Timing policy for the cache and the pollers built on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub auth_poll: Duration,
    pub listing_stale: Duration,
    pub ingestion_poll: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            auth_poll: Duration::from_secs(5),
            listing_stale: Duration::from_secs(5 * 60),
            ingestion_poll: Duration::from_secs(2),
        }
    }
}

/// A cached remote value
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    AuthUrl(String),
    AuthStatus(AuthStatus),
    Files(Arc<Vec<DriveFile>>),
    Folders(Arc<Vec<DriveFolder>>),
    Folder(Arc<DriveFolder>),
    IngestionStatus(IngestionStatus),
}

/// What a subscriber sees for one key
#[derive(Debug, Clone, PartialEq, Default)]
pub enum QueryState {
    #[default]
    Idle,
    Loading,
    Ready(Resource),
    Failed(ApiError),
}

type FetchFuture = BoxFuture<'static, ApiResult<Resource>>;
type SharedFetch = Shared<FetchFuture>;
type Fetcher = Arc<dyn Fn() -> FetchFuture + Send + Sync>;

#[derive(Debug, Clone, Copy)]
struct FetchTicket {
    id: u64,
    generation: u64,
    epoch: u64,
}

struct InFlight {
    ticket: FetchTicket,
    future: SharedFetch,
}

struct Entry {
    value: Option<Resource>,
    error: Option<ApiError>,
    fetched_at: Option<Instant>,
    generation: u64,
    /// Newest fetch id written or refused here. Seeded from the fetch counter
    /// so fetches started before the entry existed can never land in it.
    applied: u64,
    in_flight: Option<InFlight>,
    fetcher: Option<Fetcher>,
    tx: watch::Sender<QueryState>,
}

impl Entry {
    fn new(created_after: u64) -> Self {
        let (tx, _) = watch::channel(QueryState::Idle);
        Self {
            value: None,
            error: None,
            fetched_at: None,
            generation: 0,
            applied: created_after,
            in_flight: None,
            fetcher: None,
            tx,
        }
    }
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<ResourceKey, Entry>,
    epoch: u64,
    next_fetch_id: u64,
}

/// Explicitly constructed store, created at session start and cleared on logout
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Mutex<CacheInner>>,
    policy: CachePolicy,
}

impl QueryCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner::default())),
            policy,
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Return the cached value if it is fresh, join the fetch already running
    /// for this key, or start a new one with `fetcher`.
    ///
    /// The fetcher is remembered so `invalidate` can refetch in the background.
    pub async fn fetch<F, Fut>(&self, key: ResourceKey, fetcher: F) -> ApiResult<Resource>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<Resource>> + Send + 'static,
    {
        let fetcher: Fetcher = Arc::new(move || fetcher().boxed());
        let staleness = key.staleness(&self.policy);

        let future = {
            let mut inner = self.lock();
            let created_after = inner.next_fetch_id;
            let entry = inner
                .entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(created_after));
            entry.fetcher = Some(fetcher);

            if let (Some(value), Some(fetched_at)) = (&entry.value, entry.fetched_at) {
                if staleness.is_fresh(fetched_at, Instant::now()) {
                    return Ok(value.clone());
                }
            }

            let joinable = entry
                .in_flight
                .as_ref()
                .filter(|f| f.ticket.generation == entry.generation)
                .map(|f| f.future.clone());

            match joinable {
                Some(future) => {
                    tracing::trace!(key = %key, "joining in-flight fetch");
                    future
                }
                None => match self.start_fetch(&mut inner, &key) {
                    Some(future) => future,
                    None => {
                        return Err(ApiError::InvalidRequest(format!(
                            "no fetcher registered for {}",
                            key
                        )))
                    }
                },
            }
        };

        future.await
    }

    /// Mark `key` stale and abandon any fetch in flight for it. If someone is
    /// subscribed, a fresh fetch starts in the background.
    pub fn invalidate(&self, key: &ResourceKey) {
        let refetch = {
            let mut inner = self.lock();
            let Some(entry) = inner.entries.get_mut(key) else {
                return;
            };
            entry.generation += 1;
            entry.fetched_at = None;
            entry.in_flight = None;
            tracing::debug!(key = %key, generation = entry.generation, "invalidated");

            if entry.tx.receiver_count() > 0 {
                self.start_fetch(&mut inner, key)
            } else {
                None
            }
        };

        if let Some(future) = refetch {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = future.await;
                });
            }
        }
    }

    /// Watch the state of `key`
    pub fn subscribe(&self, key: &ResourceKey) -> watch::Receiver<QueryState> {
        let mut inner = self.lock();
        let created_after = inner.next_fetch_id;
        inner
            .entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(created_after))
            .tx
            .subscribe()
    }

    /// The consumer of `key` went away. Whatever is in flight for it will not
    /// be applied, and the entry is dropped once nobody is subscribed.
    pub fn release(&self, key: &ResourceKey) {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.get_mut(key) else {
            return;
        };
        entry.generation += 1;
        entry.in_flight = None;
        if entry.tx.receiver_count() == 0 {
            inner.entries.remove(key);
            tracing::debug!(key = %key, "released");
        }
    }

    /// Drop every entry. Fetches still in flight resolve into nothing.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.epoch += 1;
        tracing::debug!(epoch = inner.epoch, "cache cleared");
    }

    /// Last successfully fetched value, fresh or not
    pub fn peek(&self, key: &ResourceKey) -> Option<Resource> {
        self.lock().entries.get(key).and_then(|e| e.value.clone())
    }

    pub fn state(&self, key: &ResourceKey) -> QueryState {
        self.lock()
            .entries
            .get(key)
            .map(|e| e.tx.borrow().clone())
            .unwrap_or_default()
    }

    pub fn last_error(&self, key: &ResourceKey) -> Option<ApiError> {
        self.lock().entries.get(key).and_then(|e| e.error.clone())
    }

    pub fn is_fetching(&self, key: &ResourceKey) -> bool {
        self.lock()
            .entries
            .get(key)
            .is_some_and(|e| e.in_flight.is_some())
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_fetch(&self, inner: &mut CacheInner, key: &ResourceKey) -> Option<SharedFetch> {
        inner.next_fetch_id += 1;
        let id = inner.next_fetch_id;
        let epoch = inner.epoch;
        let entry = inner.entries.get_mut(key)?;
        let fetcher = entry.fetcher.clone()?;

        let ticket = FetchTicket {
            id,
            generation: entry.generation,
            epoch,
        };
        let store = Arc::downgrade(&self.inner);
        let owned_key = key.clone();
        let run = fetcher();

        tracing::debug!(key = %key, fetch = id, "fetch started");
        let future = async move {
            let result = run.await;
            apply(&store, &owned_key, ticket, &result);
            result
        }
        .boxed()
        .shared();

        entry.in_flight = Some(InFlight {
            ticket,
            future: future.clone(),
        });
        if entry.value.is_none() {
            entry.tx.send_replace(QueryState::Loading);
        }
        Some(future)
    }
}

fn apply(store: &Weak<Mutex<CacheInner>>, key: &ResourceKey, ticket: FetchTicket, result: &ApiResult<Resource>) {
    let Some(store) = store.upgrade() else {
        return;
    };
    let mut inner = store.lock().unwrap_or_else(PoisonError::into_inner);
    if inner.epoch != ticket.epoch {
        tracing::debug!(key = %key, fetch = ticket.id, "cache torn down, dropping response");
        return;
    }
    let Some(entry) = inner.entries.get_mut(key) else {
        tracing::debug!(key = %key, fetch = ticket.id, "entry released, dropping response");
        return;
    };

    if entry
        .in_flight
        .as_ref()
        .is_some_and(|f| f.ticket.id == ticket.id)
    {
        entry.in_flight = None;
    }
    if entry.generation != ticket.generation || ticket.id <= entry.applied {
        tracing::debug!(key = %key, fetch = ticket.id, "dropping stale response");
        return;
    }
    entry.applied = ticket.id;

    match result {
        Ok(value) => {
            entry.value = Some(value.clone());
            entry.error = None;
            entry.fetched_at = Some(Instant::now());
            entry.tx.send_replace(QueryState::Ready(value.clone()));
        }
        Err(err) => {
            tracing::warn!(key = %key, error = %err, "fetch failed");
            entry.error = Some(err.clone());
            entry.tx.send_replace(QueryState::Failed(err.clone()));
        }
    }
}
