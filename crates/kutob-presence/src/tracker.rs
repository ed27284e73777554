//! The presence tracker seam and its in-memory implementation.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use kutob_protocol::{RoomCode, Username};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::{PresenceError, PresenceStatus};

/// Maps `(room, player)` to a connection status.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → one tracker is shared by every room task.
/// - Every method returns a `Send` future, so room actors spawned on the
///   multi-threaded runtime can await it.
pub trait PresenceTracker: Send + Sync + 'static {
    /// Current status of `username` in `room`. Never-seen pairs are
    /// [`PresenceStatus::Unknown`].
    fn get_status(
        &self,
        room: &RoomCode,
        username: &Username,
    ) -> impl Future<Output = Result<PresenceStatus, PresenceError>> + Send;

    /// Records a new status. Setting [`PresenceStatus::Unknown`] forgets
    /// the pair entirely.
    fn set_status(
        &self,
        room: &RoomCode,
        username: &Username,
        status: PresenceStatus,
    ) -> impl Future<Output = Result<(), PresenceError>> + Send;

    /// Every pair that has been `Disconnected` for longer than `grace`.
    ///
    /// Does not modify anything: the caller decides what cleanup means and
    /// must re-check the status before applying it.
    fn stale(
        &self,
        grace: Duration,
    ) -> impl Future<Output = Result<Vec<(RoomCode, Username)>, PresenceError>> + Send;
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    status: PresenceStatus,
    /// When `status` last changed. Uses tokio's clock so paused-time tests
    /// can fast-forward through the grace period.
    since: Instant,
}

/// In-memory [`PresenceTracker`].
///
/// A single `tokio::sync::Mutex<HashMap>` is plenty: each call holds the
/// lock for one map operation and nothing awaits while holding it.
#[derive(Debug, Default)]
pub struct PresenceMap {
    entries: Mutex<HashMap<(RoomCode, Username), Entry>>,
}

impl PresenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked pairs (any status).
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl PresenceTracker for PresenceMap {
    async fn get_status(
        &self,
        room: &RoomCode,
        username: &Username,
    ) -> Result<PresenceStatus, PresenceError> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(&(room.clone(), username.clone()))
            .map(|e| e.status)
            .unwrap_or(PresenceStatus::Unknown))
    }

    async fn set_status(
        &self,
        room: &RoomCode,
        username: &Username,
        status: PresenceStatus,
    ) -> Result<(), PresenceError> {
        let key = (room.clone(), username.clone());
        let mut entries = self.entries.lock().await;

        if status == PresenceStatus::Unknown {
            entries.remove(&key);
            tracing::debug!(%room, player = %username, "presence forgotten");
            return Ok(());
        }

        // Re-sending the same status must not restart the grace period.
        if let Some(existing) = entries.get(&key) {
            if existing.status == status {
                return Ok(());
            }
        }

        entries.insert(
            key,
            Entry {
                status,
                since: Instant::now(),
            },
        );
        tracing::debug!(%room, player = %username, %status, "presence updated");
        Ok(())
    }

    async fn stale(&self, grace: Duration) -> Result<Vec<(RoomCode, Username)>, PresenceError> {
        let entries = self.entries.lock().await;
        let mut expired: Vec<(RoomCode, Username)> = entries
            .iter()
            .filter(|(_, e)| {
                e.status == PresenceStatus::Disconnected && e.since.elapsed() > grace
            })
            .map(|(key, _)| key.clone())
            .collect();
        expired.sort();
        Ok(expired)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `PresenceMap`.
    //!
    //! Grace-period behaviour runs on a paused tokio clock, so
    //! `tokio::time::advance` stands in for real waiting.

    use super::*;

    fn room() -> RoomCode {
        RoomCode::new("ROOM0001")
    }

    fn user(name: &str) -> Username {
        Username::new(name)
    }

    #[tokio::test]
    async fn test_get_status_unseen_player_is_unknown() {
        let map = PresenceMap::new();
        let status = map.get_status(&room(), &user("ana")).await.unwrap();
        assert_eq!(status, PresenceStatus::Unknown);
    }

    #[tokio::test]
    async fn test_set_status_then_get_returns_latest() {
        let map = PresenceMap::new();
        map.set_status(&room(), &user("ana"), PresenceStatus::Connected)
            .await
            .unwrap();
        map.set_status(&room(), &user("ana"), PresenceStatus::Disconnected)
            .await
            .unwrap();
        let status = map.get_status(&room(), &user("ana")).await.unwrap();
        assert_eq!(status, PresenceStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_set_status_is_scoped_per_room() {
        let map = PresenceMap::new();
        let other = RoomCode::new("ROOM0002");
        map.set_status(&room(), &user("ana"), PresenceStatus::Connected)
            .await
            .unwrap();
        let status = map.get_status(&other, &user("ana")).await.unwrap();
        assert_eq!(status, PresenceStatus::Unknown);
    }

    #[tokio::test]
    async fn test_set_status_unknown_forgets_pair() {
        let map = PresenceMap::new();
        map.set_status(&room(), &user("ana"), PresenceStatus::Connected)
            .await
            .unwrap();
        map.set_status(&room(), &user("ana"), PresenceStatus::Unknown)
            .await
            .unwrap();
        assert!(map.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_reports_only_disconnected_past_grace() {
        let map = PresenceMap::new();
        map.set_status(&room(), &user("gone"), PresenceStatus::Disconnected)
            .await
            .unwrap();
        map.set_status(&room(), &user("here"), PresenceStatus::Connected)
            .await
            .unwrap();

        let grace = Duration::from_secs(30);
        assert!(map.stale(grace).await.unwrap().is_empty());

        tokio::time::advance(Duration::from_secs(31)).await;
        let stale = map.stale(grace).await.unwrap();
        assert_eq!(stale, vec![(room(), user("gone"))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_before_sweep_clears_staleness() {
        let map = PresenceMap::new();
        map.set_status(&room(), &user("ana"), PresenceStatus::Disconnected)
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;
        map.set_status(&room(), &user("ana"), PresenceStatus::Connected)
            .await
            .unwrap();

        assert!(map.stale(Duration::from_secs(30)).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_disconnect_keeps_original_timestamp() {
        let map = PresenceMap::new();
        map.set_status(&room(), &user("ana"), PresenceStatus::Disconnected)
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;
        map.set_status(&room(), &user("ana"), PresenceStatus::Disconnected)
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(15)).await;

        let stale = map.stale(Duration::from_secs(30)).await.unwrap();
        assert_eq!(stale.len(), 1, "grace measured from the first disconnect");
    }
}
