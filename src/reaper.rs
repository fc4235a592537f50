//! Idle room reaper (SPEC_FULL.md §4.1 `idleReaper`): sweeps rooms whose
//! `updated_at` has gone stale and removes them from the registry. Grounded
//! on `src/retention.rs::spawn_retention_task`'s initial-delay-then-loop
//! shape, swapped from a message-retention sweep to a room-expiry sweep.

use std::sync::Arc;
use std::time::Duration;

use crate::room::RoomRegistry;

/// Spawn the background sweep loop. Sleeps `interval` between sweeps, and
/// reaps any room whose last update is older than `ttl`.
pub fn spawn(registry: Arc<RoomRegistry>, ttl: Duration, interval: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let expired = registry.reap_idle(ttl).await;
            for room_id in expired {
                tracing::info!(room_id, "reaped idle room");
            }
        }
    });
}
