use roost_types::ServerTimestamp;
use std::time::Duration;

// 2024-05-01T10:00:00Z
const BASE_SECS: i64 = 1_714_557_600;

// ── Parsing ──────────────────────────────────────────────────────

#[test]
fn parse_rfc3339_with_z() {
    let ts = ServerTimestamp::parse("2024-05-01T10:00:00.123Z").unwrap();
    assert_eq!(ts.as_millis(), BASE_SECS * 1000 + 123);
}

#[test]
fn parse_rfc3339_with_offset() {
    let ts = ServerTimestamp::parse("2024-05-01T12:00:00+02:00").unwrap();
    assert_eq!(ts.as_millis(), BASE_SECS * 1000);
}

#[test]
fn parse_keeps_microseconds() {
    let ts = ServerTimestamp::parse("2024-05-01T10:00:00.123456Z").unwrap();
    assert_eq!(ts.as_micros(), BASE_SECS * 1_000_000 + 123_456);
}

#[test]
fn parse_postgres_text_form() {
    let ts = ServerTimestamp::parse("2024-05-01 10:00:00.5+00").unwrap();
    assert_eq!(ts.as_millis(), BASE_SECS * 1000 + 500);
}

#[test]
fn parse_rejects_garbage() {
    assert!(ServerTimestamp::parse("yesterday").is_err());
    assert!("".parse::<ServerTimestamp>().is_err());
}

// ── Conversions ──────────────────────────────────────────────────

#[test]
fn millis_and_micros_agree() {
    let ts = ServerTimestamp::from_millis(1_500);
    assert_eq!(ts.as_micros(), 1_500_000);
    assert_eq!(ts.as_millis(), 1_500);
}

#[test]
fn display_is_rfc3339_utc() {
    let ts = ServerTimestamp::from_micros(BASE_SECS * 1_000_000 + 123_456);
    assert_eq!(ts.to_string(), "2024-05-01T10:00:00.123456Z");
}

#[test]
fn display_parses_back() {
    let ts = ServerTimestamp::from_micros(BASE_SECS * 1_000_000 + 42);
    let back = ServerTimestamp::parse(&ts.to_string()).unwrap();
    assert_eq!(back, ts);
}

// ── Distance ─────────────────────────────────────────────────────

#[test]
fn abs_diff_is_symmetric() {
    let a = ServerTimestamp::from_millis(1_000);
    let b = ServerTimestamp::from_millis(4_500);
    assert_eq!(a.abs_diff(&b), Duration::from_millis(3_500));
    assert_eq!(b.abs_diff(&a), Duration::from_millis(3_500));
}

#[test]
fn is_within_window_is_strict() {
    let a = ServerTimestamp::from_millis(0);
    let b = ServerTimestamp::from_millis(10_000);
    assert!(a.is_within(&ServerTimestamp::from_millis(9_999), Duration::from_secs(10)));
    assert!(!a.is_within(&b, Duration::from_secs(10)));
}

#[test]
fn saturating_sub_shifts_back() {
    let ts = ServerTimestamp::from_millis(60_000);
    assert_eq!(
        ts.saturating_sub(Duration::from_secs(10)),
        ServerTimestamp::from_millis(50_000)
    );
}

#[test]
fn ordering_follows_time() {
    assert!(ServerTimestamp::from_millis(1) < ServerTimestamp::from_millis(2));
}

// ── Properties ──────────────────────────────────────────────────

mod props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn display_parses_back(micros in 0i64..4_102_444_800_000_000) {
            let ts = ServerTimestamp::from_micros(micros);
            prop_assert_eq!(ServerTimestamp::parse(&ts.to_string()).unwrap(), ts);
        }

        #[test]
        fn abs_diff_is_symmetric(a in 0i64..1_000_000_000, b in 0i64..1_000_000_000) {
            let (a, b) = (ServerTimestamp::from_millis(a), ServerTimestamp::from_millis(b));
            prop_assert_eq!(a.abs_diff(&b), b.abs_diff(&a));
        }
    }
}
