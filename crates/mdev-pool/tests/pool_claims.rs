//! Integration tests for the mediated-device claim lifecycle

use std::collections::HashMap;
use std::sync::Arc;

use api_types::AllocationClass;
use api_types::ConsumerId;
use api_types::ConsumerRecord;
use api_types::MdevDescriptor;
use api_types::MdevId;
use api_types::MdevKind;
use api_types::StoreContext;
use mdev_pool::mock::MockConsumerStore;
use mdev_pool::mock::MockHostDriver;
use mdev_pool::MdevPool;
use mdev_pool::MdevUnit;
use mdev_pool::PoolError;
use similar_asserts::assert_eq;

fn descriptor(id: &str, kind: &str) -> MdevDescriptor {
    MdevDescriptor::new(id, kind, "pci_0000_06_00_0")
}

fn ctx() -> StoreContext {
    StoreContext::new("pool-discovery")
}

fn consumer(id: &str) -> ConsumerId {
    ConsumerId::from(id)
}

fn class(id: &str) -> AllocationClass {
    AllocationClass::from(id)
}

/// Pool discovered over `count` free devices of kind `t1`.
async fn pool_with_free_units(count: usize) -> MdevPool<MockHostDriver, MockConsumerStore> {
    let driver = Arc::new(MockHostDriver::new());
    driver.set_kinds(vec![MdevKind::from("t1")]);
    driver.set_units((0..count).map(|i| descriptor(&format!("mdev-{i}"), "t1")).collect());

    let pool = MdevPool::new(driver, Arc::new(MockConsumerStore::new()));
    pool.initialize(&ctx(), true).await.unwrap();
    pool
}

fn free_ids(units: &[MdevUnit]) -> Vec<String> {
    let mut ids: Vec<String> = units
        .iter()
        .filter(|unit| !unit.is_assigned())
        .map(|unit| unit.id.to_string())
        .collect();
    ids.sort();
    ids
}

/// Registry snapshot as an id -> (kind, parent, claim) mapping, independent
/// of iteration order.
fn snapshot(units: Vec<MdevUnit>) -> HashMap<MdevId, MdevUnit> {
    units.into_iter().map(|unit| (unit.id.clone(), unit)).collect()
}

#[test_log::test(tokio::test)]
async fn test_claim_two_of_three_free_units() {
    let pool = pool_with_free_units(3).await;

    let units = pool
        .claim(&consumer("i-1"), &class("f-1"), Some(&MdevKind::from("t1")), 2)
        .await
        .unwrap();

    assert_eq!(units.len(), 2);
    assert!(units
        .iter()
        .all(|unit| unit.is_claimed_by(&consumer("i-1"), &class("f-1"))));

    let all = pool.list().await;
    assert_eq!(all.iter().filter(|unit| unit.is_assigned()).count(), 2);
    assert_eq!(all.iter().filter(|unit| !unit.is_assigned()).count(), 1);
    assert_eq!(pool.query(&consumer("i-1"), &class("f-1")).await.len(), 2);
}

#[test_log::test(tokio::test)]
async fn test_insufficient_capacity_fails_whole_claim() {
    let pool = pool_with_free_units(1).await;

    let result = pool
        .claim(&consumer("i-1"), &class("f-1"), Some(&MdevKind::from("t1")), 2)
        .await;

    assert!(matches!(result, Err(PoolError::ResourceUnavailable { .. })));
    let all = pool.list().await;
    assert_eq!(free_ids(&all), vec!["mdev-0"]);
}

#[test_log::test(tokio::test)]
async fn test_failed_claim_never_disturbs_other_owners() {
    let pool = pool_with_free_units(3).await;

    pool.claim(&consumer("i-1"), &class("f-1"), None, 2)
        .await
        .unwrap();

    // Only one device is left; a two-device claim must fail and leave the
    // first consumer's devices untouched.
    let result = pool.claim(&consumer("i-2"), &class("f-2"), None, 2).await;
    assert!(matches!(result, Err(PoolError::ResourceUnavailable { .. })));

    assert_eq!(pool.query(&consumer("i-1"), &class("f-1")).await.len(), 2);
    assert!(pool.query(&consumer("i-2"), &class("f-2")).await.is_empty());
    assert_eq!(pool.list().await.iter().filter(|u| !u.is_assigned()).count(), 1);
}

#[test_log::test(tokio::test)]
async fn test_every_unit_free_before_failed_claim_is_free_after() {
    let pool = pool_with_free_units(3).await;
    let before = free_ids(&pool.list().await);

    let result = pool.claim(&consumer("i-1"), &class("f-1"), None, 4).await;
    assert!(matches!(result, Err(PoolError::ResourceUnavailable { .. })));
    assert_eq!(free_ids(&pool.list().await), before);
}

#[test_log::test(tokio::test)]
async fn test_release_frees_claimed_units_and_is_idempotent() {
    let pool = pool_with_free_units(3).await;
    pool.claim(&consumer("i-1"), &class("f-1"), Some(&MdevKind::from("t1")), 2)
        .await
        .unwrap();

    assert_eq!(pool.release(&consumer("i-1"), &class("f-1")).await, 2);
    assert!(pool.list().await.iter().all(|unit| !unit.is_assigned()));
    assert!(pool.query(&consumer("i-1"), &class("f-1")).await.is_empty());

    // Second release is a no-op, never an error.
    assert_eq!(pool.release(&consumer("i-1"), &class("f-1")).await, 0);
}

#[test_log::test(tokio::test)]
async fn test_release_isolates_allocation_classes() {
    let pool = pool_with_free_units(3).await;

    // One consumer mid-transition legitimately holds devices under two
    // classes at once.
    pool.claim(&consumer("i-1"), &class("f-old"), None, 1)
        .await
        .unwrap();
    pool.claim(&consumer("i-1"), &class("f-new"), None, 2)
        .await
        .unwrap();

    assert_eq!(pool.release(&consumer("i-1"), &class("f-old")).await, 1);

    assert!(pool.query(&consumer("i-1"), &class("f-old")).await.is_empty());
    assert_eq!(pool.query(&consumer("i-1"), &class("f-new")).await.len(), 2);
}

#[test_log::test(tokio::test)]
async fn test_ownership_is_exclusive() {
    let pool = pool_with_free_units(4).await;

    let first = pool
        .claim(&consumer("i-1"), &class("f-1"), None, 2)
        .await
        .unwrap();
    let second = pool
        .claim(&consumer("i-2"), &class("f-1"), None, 2)
        .await
        .unwrap();

    let first_ids: Vec<&MdevId> = first.iter().map(|unit| &unit.id).collect();
    assert!(second.iter().all(|unit| !first_ids.contains(&&unit.id)));

    for unit in pool.list().await {
        assert_eq!(unit.is_assigned(), unit.claim.is_some());
    }
}

#[test_log::test(tokio::test)]
async fn test_discovery_is_equivalent_across_runs() {
    let driver = Arc::new(MockHostDriver::new());
    driver.set_kinds(vec![MdevKind::from("t1")]);
    driver.set_units(vec![descriptor("mdev-0", "t1"), descriptor("mdev-1", "t1")]);
    driver.set_assignment(MdevId::from("mdev-0"), consumer("i-1"));

    let store = Arc::new(MockConsumerStore::new());
    store.insert_record(ConsumerRecord {
        id: consumer("i-1"),
        allocation_class: Some(class("f-1")),
    });

    let pool = MdevPool::new(driver.clone(), store.clone());
    pool.initialize(&ctx(), true).await.unwrap();
    let first = snapshot(pool.list().await);

    pool.initialize(&ctx(), true).await.unwrap();
    let second = snapshot(pool.list().await);

    assert_eq!(first, second);
}

#[test_log::test(tokio::test)]
async fn test_driver_refusal_mid_claim_rolls_back_prefix() {
    let driver = Arc::new(MockHostDriver::new());
    driver.set_kinds(vec![MdevKind::from("t1")]);
    driver.set_units(vec![
        descriptor("mdev-0", "t1"),
        descriptor("mdev-1", "t1"),
        descriptor("mdev-2", "t1"),
    ]);
    // Two acquisitions succeed, the third is refused even though a free
    // device remains: the whole claim must still unwind.
    driver.set_acquire_budget(2);

    let pool = MdevPool::new(driver, Arc::new(MockConsumerStore::new()));
    pool.initialize(&ctx(), true).await.unwrap();

    let result = pool.claim(&consumer("i-1"), &class("f-1"), None, 3).await;
    assert!(matches!(result, Err(PoolError::ResourceUnavailable { .. })));
    assert_eq!(
        free_ids(&pool.list().await),
        vec!["mdev-0", "mdev-1", "mdev-2"]
    );
}

#[test_log::test(tokio::test)]
async fn test_rollback_keeps_refreshed_identity_fields() {
    let driver = Arc::new(MockHostDriver::new());
    driver.set_kinds(vec![MdevKind::from("t1")]);
    driver.set_units(vec![descriptor("mdev-0", "t1")]);
    // First acquisition returns a refreshed view of mdev-0, second refuses.
    driver.push_fresh_unit(MdevDescriptor::new("mdev-0", "t1", "pci_0000_09_00_0"));
    driver.set_acquire_budget(1);

    let pool = MdevPool::new(driver, Arc::new(MockConsumerStore::new()));
    pool.initialize(&ctx(), true).await.unwrap();

    let result = pool.claim(&consumer("i-1"), &class("f-1"), None, 2).await;
    assert!(matches!(result, Err(PoolError::ResourceUnavailable { .. })));

    let all = pool.list().await;
    assert_eq!(all.len(), 1);
    assert!(!all[0].is_assigned());
    // Rollback clears ownership only; the refreshed parent stays.
    assert_eq!(all[0].parent, "pci_0000_09_00_0");
}

#[test_log::test(tokio::test)]
async fn test_empty_pool_claim_fails_without_leaking_state() {
    let driver = Arc::new(MockHostDriver::new());
    let pool = MdevPool::new(driver, Arc::new(MockConsumerStore::new()));
    pool.initialize(&ctx(), false).await.unwrap();

    let result = pool.claim(&consumer("i-1"), &class("f-1"), None, 1).await;

    assert!(matches!(result, Err(PoolError::ResourceUnavailable { .. })));
    assert!(pool.list().await.is_empty());
}
