use roost_sync::{OptimisticWriteTracker, SyncConfig};
use roost_types::RecordId;
use std::time::Duration;
use tokio::time::{advance, timeout, Instant};

fn tracker() -> OptimisticWriteTracker {
    OptimisticWriteTracker::new(Duration::from_secs(5))
}

// ── Tracking ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn tracked_id_is_pending() {
    let mut t = tracker();
    t.track(RecordId::new("R"));
    assert!(t.is_pending(&RecordId::new("R")));
    assert!(!t.is_pending(&RecordId::new("other")));
    assert_eq!(t.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn pending_ends_at_ttl() {
    let mut t = tracker();
    t.track(RecordId::new("R"));

    advance(Duration::from_millis(4_999)).await;
    assert!(t.is_pending(&RecordId::new("R")));

    advance(Duration::from_millis(1)).await;
    assert!(!t.is_pending(&RecordId::new("R")));
}

#[tokio::test(start_paused = true)]
async fn retrack_resets_deadline() {
    let mut t = tracker();
    let first = t.track(RecordId::new("R"));
    advance(Duration::from_secs(3)).await;
    let second = t.track(RecordId::new("R"));

    assert_eq!(second - first, Duration::from_secs(3));
    assert_eq!(t.len(), 1);

    advance(Duration::from_secs(4)).await;
    assert!(t.is_pending(&RecordId::new("R")));
}

#[tokio::test(start_paused = true)]
async fn clear_removes_entry() {
    let mut t = tracker();
    t.track(RecordId::new("R"));
    assert!(t.clear(&RecordId::new("R")));
    assert!(!t.clear(&RecordId::new("R")));
    assert!(!t.is_pending(&RecordId::new("R")));
    assert!(t.is_empty());
}

#[tokio::test(start_paused = true)]
async fn clear_all_removes_everything() {
    let mut t = tracker();
    t.track(RecordId::new("A"));
    t.track(RecordId::new("B"));
    t.clear_all();
    assert!(t.is_empty());
    assert!(t.pending_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn expires_at_matches_track() {
    let mut t = tracker();
    let start = Instant::now();
    t.track(RecordId::new("R"));
    assert_eq!(t.expires_at(&RecordId::new("R")), Some(start + Duration::from_secs(5)));
    assert_eq!(t.expires_at(&RecordId::new("X")), None);
}

// ── Expiry ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn next_expired_yields_earliest_first() {
    let mut t = tracker();
    t.track(RecordId::new("A"));
    advance(Duration::from_secs(1)).await;
    t.track(RecordId::new("B"));

    assert_eq!(t.next_expired().await, RecordId::new("A"));
    assert_eq!(t.next_expired().await, RecordId::new("B"));
    assert!(t.is_empty());
}

#[tokio::test(start_paused = true)]
async fn next_expired_pends_when_empty() {
    let mut t = tracker();
    let result = timeout(Duration::from_secs(60), t.next_expired()).await;
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn cleared_entry_never_expires() {
    let mut t = tracker();
    t.track(RecordId::new("R"));
    t.clear(&RecordId::new("R"));

    let result = timeout(Duration::from_secs(10), t.next_expired()).await;
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn cancelled_wait_keeps_entry() {
    let mut t = tracker();
    t.track(RecordId::new("R"));

    let result = timeout(Duration::from_secs(1), t.next_expired()).await;
    assert!(result.is_err());
    assert!(t.is_pending(&RecordId::new("R")));

    assert_eq!(t.next_expired().await, RecordId::new("R"));
}

#[test]
fn default_ttl_from_config() {
    let t = OptimisticWriteTracker::default();
    assert_eq!(t.ttl(), SyncConfig::default().optimistic_ttl());
    assert_eq!(t.ttl(), Duration::from_secs(5));
}
