//! Process-wide query cache for server collections.
//!
//! Entries are keyed by `(collection, grouping, status filter)`. A read only reaches the
//! network on a miss or after invalidation, and concurrent reads of one key share a single
//! in-flight fetch. Failed fetches are remembered; nothing here retries on its own.

use crate::gateway::GatewayError;
use crate::model::{GroupingKey, Record};
use crate::status::StatusFilter;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub collection: String,
    pub grouping: Option<GroupingKey>,
    pub status: StatusFilter,
}

impl CacheKey {
    pub fn new(
        collection: impl Into<String>,
        grouping: Option<GroupingKey>,
        status: StatusFilter,
    ) -> Self {
        Self {
            collection: collection.into(),
            grouping,
            status,
        }
    }
}

/// Selects every key of a collection, optionally narrowed to one grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePrefix {
    pub collection: String,
    pub grouping: Option<GroupingKey>,
}

impl CachePrefix {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            grouping: None,
        }
    }

    pub fn matches(&self, key: &CacheKey) -> bool {
        key.collection == self.collection
            && match &self.grouping {
                None => true,
                Some(g) => key.grouping.as_ref() == Some(g),
            }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Snapshot of one cached query. `data` keeps the last good result while reloading.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub status: FetchStatus,
    pub data: Arc<Vec<Record>>,
    pub error: Option<Arc<GatewayError>>,
}

impl Default for CacheEntry {
    fn default() -> Self {
        Self {
            status: FetchStatus::Idle,
            data: Arc::new(Vec::new()),
            error: None,
        }
    }
}

type FetchResult = Result<Arc<Vec<Record>>, Arc<GatewayError>>;
type InFlight = Shared<BoxFuture<'static, FetchResult>>;

#[derive(Default)]
struct Slot {
    entry: CacheEntry,
    stale: bool,
    in_flight: Option<(u64, InFlight)>,
}

#[derive(Default)]
pub struct QueryCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
    next_fetch_id: Mutex<u64>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fetch_id(&self) -> u64 {
        let mut id = self
            .next_fetch_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *id += 1;
        *id
    }

    /// Current entry without touching the network.
    pub fn peek(&self, key: &CacheKey) -> CacheEntry {
        self.slots()
            .get(key)
            .map(|slot| slot.entry.clone())
            .unwrap_or_default()
    }

    /// Return the entry for `key`, running `fetch` only if it is absent or stale.
    pub async fn read<F, Fut>(&self, key: &CacheKey, fetch: F) -> CacheEntry
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Record>, GatewayError>> + Send + 'static,
    {
        let (fetch_id, flight) = {
            let mut slots = self.slots();
            let slot = slots.entry(key.clone()).or_default();
            let joinable = if slot.stale {
                None
            } else {
                slot.in_flight
                    .as_ref()
                    .map(|(id, flight)| (*id, flight.clone()))
            };
            if let Some(joined) = joinable {
                tracing::debug!(?key, "joining in-flight fetch");
                joined
            } else if !slot.stale
                && matches!(slot.entry.status, FetchStatus::Success | FetchStatus::Error)
            {
                return slot.entry.clone();
            } else {
                tracing::debug!(?key, "fetching");
                let fut = fetch();
                let flight: InFlight = async move { fut.await.map(Arc::new).map_err(Arc::new) }
                    .boxed()
                    .shared();
                let id = self.fetch_id();
                slot.in_flight = Some((id, flight.clone()));
                slot.stale = false;
                slot.entry.status = FetchStatus::Loading;
                (id, flight)
            }
        };

        let result = flight.await;
        self.settle(key, fetch_id, result)
    }

    fn settle(&self, key: &CacheKey, fetch_id: u64, result: FetchResult) -> CacheEntry {
        let mut slots = self.slots();
        let slot = slots.entry(key.clone()).or_default();
        let current = matches!(&slot.in_flight, Some((id, _)) if *id == fetch_id);
        let mut entry = slot.entry.clone();
        match result {
            Ok(data) => {
                entry.status = FetchStatus::Success;
                entry.data = data;
                entry.error = None;
            }
            Err(e) => {
                tracing::warn!(?key, error = %e, "fetch failed");
                entry.status = FetchStatus::Error;
                entry.error = Some(e);
            }
        }
        if current {
            slot.in_flight = None;
            slot.entry = entry.clone();
        }
        // A superseded fetch still hands its own result to whoever awaited it.
        entry
    }

    /// Mark every matching entry stale so the next read re-fetches. Returns how many matched.
    pub fn invalidate(&self, prefix: &CachePrefix) -> usize {
        let mut slots = self.slots();
        let mut n = 0;
        for (key, slot) in slots.iter_mut() {
            if prefix.matches(key) {
                slot.stale = true;
                n += 1;
            }
        }
        tracing::debug!(?prefix, invalidated = n, "cache invalidated");
        n
    }

    /// Explicit "try again": drop the cached result for `key` and read it afresh.
    pub async fn refetch<F, Fut>(&self, key: &CacheKey, fetch: F) -> CacheEntry
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Record>, GatewayError>> + Send + 'static,
    {
        if let Some(slot) = self.slots().get_mut(key) {
            slot.stale = true;
        }
        self.read(key, fetch).await
    }
}

#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod tests;
