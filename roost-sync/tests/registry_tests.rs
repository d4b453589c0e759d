use roost_sync::SubscriptionRegistry;
use roost_types::UserId;

#[test]
fn acquire_and_release() {
    let registry = SubscriptionRegistry::new();
    let user = UserId::new("u1");

    let guard = registry.try_acquire(&user, "birds").unwrap();
    assert!(registry.is_active(&user, "birds"));
    assert_eq!(guard.user_id(), &user);
    assert_eq!(guard.table(), "birds");

    drop(guard);
    assert!(!registry.is_active(&user, "birds"));
    assert!(registry.is_empty());
}

#[test]
fn second_acquire_for_same_slot_fails() {
    let registry = SubscriptionRegistry::new();
    let user = UserId::new("u1");

    let _guard = registry.try_acquire(&user, "birds").unwrap();
    assert!(registry.try_acquire(&user, "birds").is_none());
    assert!(registry.clone().try_acquire(&user, "birds").is_none());
}

#[test]
fn slots_are_per_user_and_table() {
    let registry = SubscriptionRegistry::new();
    let _a = registry.try_acquire(&UserId::new("u1"), "birds").unwrap();
    let _b = registry.try_acquire(&UserId::new("u2"), "birds").unwrap();
    let _c = registry.try_acquire(&UserId::new("u1"), "chicks").unwrap();
    assert_eq!(registry.len(), 3);
}

#[test]
fn slot_reusable_after_release() {
    let registry = SubscriptionRegistry::new();
    let user = UserId::new("u1");
    drop(registry.try_acquire(&user, "birds"));
    assert!(registry.try_acquire(&user, "birds").is_some());
}

#[test]
fn separate_registries_are_independent() {
    let first = SubscriptionRegistry::new();
    let second = SubscriptionRegistry::new();
    let user = UserId::new("u1");
    let _guard = first.try_acquire(&user, "birds").unwrap();
    assert!(second.try_acquire(&user, "birds").is_some());
}
