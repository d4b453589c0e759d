use roost_sync::channel::mock::{insert_payload, update_payload, MockRealtime};
use roost_sync::{ChannelId, ChannelMessage, ChannelStatus, ChannelTopic, RealtimeClient};
use roost_types::UserId;
use serde_json::json;

// ── ChannelTopic ────────────────────────────────────────────────

#[test]
fn topic_for_user() {
    let topic = ChannelTopic::for_user("public", "chicks", &UserId::new("u-42"), 3);
    assert_eq!(topic.name, "chicks_user_u-42_3");
    assert_eq!(topic.schema, "public");
    assert_eq!(topic.table, "chicks");
    assert_eq!(topic.filter, "user_id=eq.u-42");
}

#[test]
fn channel_id_display() {
    assert_eq!(ChannelId(7).to_string(), "channel#7");
}

// ── MockRealtime ────────────────────────────────────────────────

#[tokio::test]
async fn mock_delivers_in_order() {
    let client = MockRealtime::new();
    let topic = ChannelTopic::for_user("public", "birds", &UserId::new("u1"), 1);
    let mut handle = client.subscribe(&topic).unwrap();
    let controller = client.latest().unwrap();
    assert_eq!(controller.id(), handle.id);

    assert!(controller.subscribed());
    assert!(controller.change(json!({ "n": 1 })));

    assert_eq!(
        handle.messages.recv().await,
        Some(ChannelMessage::Status(ChannelStatus::Subscribed))
    );
    assert_eq!(
        handle.messages.recv().await,
        Some(ChannelMessage::Change(json!({ "n": 1 })))
    );
}

#[tokio::test]
async fn mock_tracks_removal() {
    let client = MockRealtime::new();
    let topic = ChannelTopic::for_user("public", "birds", &UserId::new("u1"), 1);
    let first = client.subscribe(&topic).unwrap();
    let _second = client.subscribe(&topic).unwrap();
    assert_eq!(client.opened(), 2);
    assert_eq!(client.active(), 2);

    client.remove_channel(first.id);
    client.remove_channel(first.id);
    assert_eq!(client.active(), 1);
    assert_eq!(client.opened(), 2);
}

#[tokio::test]
async fn removed_channel_rejects_traffic() {
    let client = MockRealtime::new();
    let topic = ChannelTopic::for_user("public", "birds", &UserId::new("u1"), 1);
    let handle = client.subscribe(&topic).unwrap();
    client.remove_channel(handle.id);

    let controller = client.latest().unwrap();
    assert!(!controller.subscribed());
}

#[test]
fn mock_subscribe_failures() {
    let client = MockRealtime::new();
    client.fail_next_subscribes(2);
    let topic = ChannelTopic::for_user("public", "birds", &UserId::new("u1"), 1);

    assert!(client.subscribe(&topic).is_err());
    assert!(client.subscribe(&topic).is_err());
    assert!(client.subscribe(&topic).is_ok());
    assert_eq!(client.opened(), 1);
}

#[test]
fn payload_helpers() {
    let insert = insert_payload(json!({ "id": "A" }), "2024-05-01T10:00:00Z");
    assert_eq!(insert["event_type"], "INSERT");
    assert_eq!(insert["new_record"]["id"], "A");

    let update = update_payload(json!({ "id": "A" }), "2024-05-01T10:00:00Z");
    assert_eq!(update["old_record"]["id"], "A");
}
