//! Catalog cache coordinator
//!
//! Loads the dataset local-first and publishes it as an immutable snapshot.
//!
//! ```text
//! Empty → ReadingRawCache → {RawFound, RawEmpty} → ReadingNormalizedCache
//!       → {Seeded, NeedsDerivation, NeedsFetch} → [FetchingRemote]
//!       → Persisting → Ready            (or Failed from any step)
//! ```
//!
//! Tiers are consulted strictly raw → normalized → remote. Cache reads that
//! fail count as empty, cache writes that fail are logged and skipped, and
//! only a failed remote fetch fails the load. There is no retry: a failed
//! coordinator stays failed; build a new one to try again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::hierarchy::HierarchyAggregator;
use crate::normalize::{normalize_all_with, synthesize_raw};
use crate::remote::RemoteCatalogSource;
use crate::store::{LocalCacheStore, NormalizedCache, NORMALIZED_SCHEMA_VERSION};
use crate::types::{NormalizedStamp, RawRecord};

pub const LOAD_ERROR_MESSAGE: &str = "Failed to load catalog data";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Empty,
    ReadingRawCache,
    RawFound,
    RawEmpty,
    ReadingNormalizedCache,
    Seeded,
    NeedsDerivation,
    NeedsFetch,
    FetchingRemote,
    Persisting,
    Ready,
    Failed,
}

/// Read-only view handed to consumers. Replaced wholesale, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    pub stamps: Vec<RawRecord>,
    pub normalized_stamps: Vec<NormalizedStamp>,
    pub loading: bool,
    pub error: Option<String>,
    pub db_ready: bool,
}

impl CatalogSnapshot {
    fn initial() -> Self {
        Self {
            stamps: Vec::new(),
            normalized_stamps: Vec::new(),
            loading: true,
            error: None,
            db_ready: false,
        }
    }

    fn failed() -> Self {
        Self {
            loading: false,
            error: Some(LOAD_ERROR_MESSAGE.to_string()),
            ..Self::initial()
        }
    }

    pub fn hierarchy(&self) -> HierarchyAggregator<'_> {
        HierarchyAggregator::new(&self.normalized_stamps)
    }
}

/// Shared mount flag. Once unmounted, results are no longer published;
/// work already underway still runs to completion.
#[derive(Debug, Clone)]
pub struct MountHandle(Arc<AtomicBool>);

impl MountHandle {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn unmount(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_mounted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for MountHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Which remote catalog to pull when the cache is empty, and how to
/// normalize what comes back
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRequest {
    pub catalog_id: String,
    pub page_size: u32,
    pub auth_token: Option<String>,
    pub placeholder_image_url: String,
}

pub struct CacheCoordinator<S, R> {
    store: S,
    remote: R,
    request: CatalogRequest,
    snapshot: RwLock<Arc<CatalogSnapshot>>,
    state: Mutex<CoordinatorState>,
    started: AtomicBool,
    mount: MountHandle,
}

impl<S, R> CacheCoordinator<S, R>
where
    S: LocalCacheStore,
    R: RemoteCatalogSource,
{
    pub fn new(store: S, remote: R, request: CatalogRequest) -> Self {
        Self {
            store,
            remote,
            request,
            snapshot: RwLock::new(Arc::new(CatalogSnapshot::initial())),
            state: Mutex::new(CoordinatorState::Empty),
            started: AtomicBool::new(false),
            mount: MountHandle::new(),
        }
    }

    /// Share a mount flag created elsewhere, e.g. by the owning view
    pub fn with_mount_handle(mut self, mount: MountHandle) -> Self {
        self.mount = mount;
        self
    }

    pub fn mount_handle(&self) -> MountHandle {
        self.mount.clone()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        match self.snapshot.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn state(&self) -> CoordinatorState {
        match self.state.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Stop publishing. In-flight cache and remote calls are not cancelled.
    pub fn close(&self) {
        debug!("Catalog coordinator closed");
        self.mount.unmount();
    }

    /// Load the catalog. Runs once; later calls return the current snapshot.
    pub fn initialize(&self) -> Arc<CatalogSnapshot> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Catalog initialization already started, skipping");
            return self.snapshot();
        }

        match self.load() {
            Ok((stamps, normalized_stamps)) => {
                self.transition(CoordinatorState::Ready);
                info!(
                    raw = stamps.len(),
                    normalized = normalized_stamps.len(),
                    "Catalog ready"
                );
                self.publish(CatalogSnapshot {
                    stamps,
                    normalized_stamps,
                    loading: false,
                    error: None,
                    db_ready: true,
                });
            }
            Err(e) => {
                error!(error = %e, "Catalog initialization failed");
                self.transition(CoordinatorState::Failed);
                self.publish(CatalogSnapshot::failed());
            }
        }
        self.snapshot()
    }

    fn transition(&self, next: CoordinatorState) {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        debug!(from = ?*state, to = ?next, "Catalog state transition");
        *state = next;
    }

    fn publish(&self, snapshot: CatalogSnapshot) {
        if !self.mount.is_mounted() {
            debug!("Coordinator unmounted, dropping snapshot");
            return;
        }
        let snapshot = Arc::new(snapshot);
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    fn read_raw_tier(&self) -> Vec<RawRecord> {
        self.transition(CoordinatorState::ReadingRawCache);
        self.store.read_raw().unwrap_or_else(|e| {
            warn!(error = %e, "Raw cache unreadable, treating as empty");
            Vec::new()
        })
    }

    fn read_normalized_tier(&self) -> NormalizedCache {
        self.transition(CoordinatorState::ReadingNormalizedCache);
        self.store.read_normalized().unwrap_or_else(|e| {
            warn!(error = %e, "Normalized cache unreadable, treating as empty");
            NormalizedCache::default()
        })
    }

    fn persist_raw(&self, records: &[RawRecord]) {
        if let Err(e) = self.store.write_raw(records) {
            warn!(error = %e, count = records.len(), "Failed to cache raw records");
        }
    }

    fn persist_normalized(&self, stamps: &[NormalizedStamp]) {
        if let Err(e) = self.store.write_normalized(stamps, NORMALIZED_SCHEMA_VERSION) {
            warn!(error = %e, count = stamps.len(), "Failed to cache normalized stamps");
        }
    }

    fn load(&self) -> Result<(Vec<RawRecord>, Vec<NormalizedStamp>)> {
        let raw = self.read_raw_tier();

        if !raw.is_empty() {
            self.transition(CoordinatorState::RawFound);
            let cache = self.read_normalized_tier();

            if !cache.stamps.is_empty() {
                self.transition(CoordinatorState::Seeded);
                if cache.is_current() {
                    return Ok((raw, cache.stamps));
                }
                info!(
                    stored = cache.schema_version,
                    current = NORMALIZED_SCHEMA_VERSION,
                    "Normalized cache outdated, re-deriving from raw"
                );
            } else {
                self.transition(CoordinatorState::NeedsDerivation);
                info!(count = raw.len(), "Deriving normalized cache from raw");
            }

            let normalized = normalize_all_with(&raw, &self.request.placeholder_image_url);
            self.transition(CoordinatorState::Persisting);
            self.persist_normalized(&normalized);
            return Ok((raw, normalized));
        }

        self.transition(CoordinatorState::RawEmpty);
        let cache = self.read_normalized_tier();

        if !cache.stamps.is_empty() {
            self.transition(CoordinatorState::Seeded);
            info!(count = cache.stamps.len(), "Rebuilding raw records from normalized cache");
            let raw: Vec<RawRecord> = cache.stamps.iter().map(synthesize_raw).collect();
            self.transition(CoordinatorState::Persisting);
            self.persist_raw(&raw);
            return Ok((raw, cache.stamps));
        }

        self.transition(CoordinatorState::NeedsFetch);
        self.transition(CoordinatorState::FetchingRemote);
        let raw = self.remote.fetch_all(
            &self.request.catalog_id,
            self.request.page_size,
            self.request.auth_token.as_deref(),
        )?;
        let normalized = normalize_all_with(&raw, &self.request.placeholder_image_url);

        self.transition(CoordinatorState::Persisting);
        self.persist_raw(&raw);
        self.persist_normalized(&normalized);
        Ok((raw, normalized))
    }
}
