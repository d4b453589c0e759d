use roost_types::{Bird, ChangeEvent, ChangeKind, Fingerprint, Gender, RecordId, ServerTimestamp};

fn skye() -> Bird {
    Bird::new("A", "Skye", Gender::Male)
}

// ── ChangeKind ───────────────────────────────────────────────────

#[test]
fn kind_wire_names() {
    assert_eq!(ChangeKind::Insert.to_string(), "INSERT");
    assert_eq!(ChangeKind::Update.as_str(), "UPDATE");
    assert_eq!("delete".parse::<ChangeKind>().unwrap(), ChangeKind::Delete);
}

#[test]
fn kind_rejects_unknown() {
    assert!("TRUNCATE".parse::<ChangeKind>().is_err());
}

#[test]
fn kind_serde_uppercase() {
    let json = serde_json::to_string(&ChangeKind::Insert).unwrap();
    assert_eq!(json, "\"INSERT\"");
}

// ── Constructors ─────────────────────────────────────────────────

#[test]
fn insert_carries_payload() {
    let ts = ServerTimestamp::from_millis(1_000);
    let event = ChangeEvent::insert(RecordId::new("A"), skye(), ts, 1);
    assert_eq!(event.kind, ChangeKind::Insert);
    assert_eq!(event.payload, Some(skye()));
    assert_eq!(event.delivery_sequence, 1);
}

#[test]
fn delete_has_no_payload() {
    let event: ChangeEvent<Bird> =
        ChangeEvent::delete(RecordId::new("A"), ServerTimestamp::from_millis(1), 3);
    assert_eq!(event.kind, ChangeKind::Delete);
    assert!(event.payload.is_none());
}

// ── Fingerprint ──────────────────────────────────────────────────

#[test]
fn fingerprint_is_kind_id_timestamp() {
    let ts = ServerTimestamp::from_millis(5_000);
    let event = ChangeEvent::update(RecordId::new("A"), skye(), ts, 9);
    assert_eq!(
        event.fingerprint(),
        Fingerprint::new(ChangeKind::Update, RecordId::new("A"), ts)
    );
}

#[test]
fn redelivery_keeps_fingerprint() {
    let ts = ServerTimestamp::from_millis(5_000);
    let event = ChangeEvent::insert(RecordId::new("A"), skye(), ts, 1);
    let again = event.redelivered(17);
    assert_eq!(again.delivery_sequence, 17);
    assert_eq!(again.fingerprint(), event.fingerprint());
}

#[test]
fn fingerprint_display() {
    let fp = Fingerprint::new(
        ChangeKind::Delete,
        RecordId::new("A"),
        ServerTimestamp::from_millis(0),
    );
    assert_eq!(fp.to_string(), "DELETE_A_1970-01-01T00:00:00.000000Z");
}
