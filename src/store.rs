use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::Shipment;
use crate::registry::ShipmentRegistryClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No data yet, or data believed outdated.
    Stale,
    /// Holds the snapshot taken at the last refresh.
    Fresh,
}

/// Point-in-time copy of every known shipment. Never authoritative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub shipments: Vec<Shipment>,
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Number of successful refreshes that produced this snapshot.
    pub revision: u64,
}

#[derive(Debug)]
struct Inner {
    snapshot: Arc<Snapshot>,
    state: SyncState,
    /// Bumped by every refresh start and every `mark_stale`. A refresh only
    /// installs its result if nothing newer happened while it was in flight.
    generation: u64,
}

/// Local cache of shipments, refreshed only on explicit request.
///
/// A refresh replaces the whole snapshot in one swap, so readers see either
/// the old snapshot or the new one. Writes to the ledger never touch the
/// cache; they only mark it stale.
pub struct SyncStore {
    registry: Arc<ShipmentRegistryClient>,
    inner: RwLock<Inner>,
}

impl SyncStore {
    pub fn new(registry: Arc<ShipmentRegistryClient>) -> Self {
        Self {
            registry,
            inner: RwLock::new(Inner {
                snapshot: Arc::new(Snapshot::default()),
                state: SyncState::Stale,
                generation: 0,
            }),
        }
    }

    /// Pull every shipment from the ledger and replace the snapshot.
    ///
    /// On failure the previous snapshot and state are left as they were. If a
    /// newer refresh or a `mark_stale` happened while this one was in flight,
    /// its result is dropped and the currently installed snapshot is returned.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>> {
        let started = {
            let mut inner = self.inner.write();
            inner.generation += 1;
            inner.generation
        };

        let shipments = match self.registry.list_all_shipments().await {
            Ok(shipments) => shipments,
            Err(e) => {
                warn!(error = %e, "refresh failed, keeping previous snapshot");
                return Err(e);
            }
        };

        let mut inner = self.inner.write();
        if inner.generation != started {
            debug!(
                started,
                current = inner.generation,
                "refresh superseded, discarding its result"
            );
            return Ok(inner.snapshot.clone());
        }

        let snapshot = Arc::new(Snapshot {
            shipments,
            refreshed_at: Some(Utc::now()),
            revision: inner.snapshot.revision + 1,
        });
        inner.snapshot = snapshot.clone();
        inner.state = SyncState::Fresh;

        info!(
            revision = snapshot.revision,
            count = snapshot.shipments.len(),
            "snapshot refreshed"
        );
        Ok(snapshot)
    }

    /// Flag the snapshot as outdated without refetching. Any refresh still in
    /// flight will not flip the store back to fresh.
    pub fn mark_stale(&self) {
        let mut inner = self.inner.write();
        inner.generation += 1;
        inner.state = SyncState::Stale;
    }

    /// Last known snapshot, possibly stale.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.read().snapshot.clone()
    }

    pub fn state(&self) -> SyncState {
        self.inner.read().state
    }

    pub fn registry(&self) -> &Arc<ShipmentRegistryClient> {
        &self.registry
    }
}
