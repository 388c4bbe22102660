//! Pool manager tests: slot lifecycle, binding invariants, first-fit
//! determinism, exhaustion.

mod common;

use common::{FlakyFactory, StubFactory};
use dbpool::Pool;

#[tokio::test]
async fn test_create_fills_every_slot() {
    let pool = Pool::create(0, 3, &StubFactory::new()).await;
    assert_eq!(pool.len(), 3);
    assert_eq!(pool.free_count(), 3);
    assert_eq!(pool.slot_ids(), vec![101, 102, 103]);
}

#[tokio::test]
async fn test_failed_factory_shrinks_pool_without_aborting() {
    let pool = Pool::create(0, 3, &FlakyFactory::new(vec![2])).await;
    assert_eq!(pool.len(), 2);
    // The ordinal keeps counting over failures, so ids keep their place.
    assert_eq!(pool.slot_ids(), vec![101, 103]);
}

#[tokio::test]
async fn test_slot_ids_derive_from_worker_identity() {
    let pool = Pool::create(3, 2, &StubFactory::new()).await;
    assert_eq!(pool.slot_ids(), vec![401, 402]);
    assert_eq!(pool.worker_id(), 3);
}

#[tokio::test]
async fn test_acquire_is_first_fit_in_creation_order() {
    let mut pool = Pool::create(0, 3, &StubFactory::new()).await;
    assert_eq!(pool.acquire(11), Some(101));
    assert_eq!(pool.acquire(22), Some(102));
    assert_eq!(pool.acquire(33), Some(103));
}

#[tokio::test]
async fn test_acquire_rejects_when_exhausted() {
    let mut pool = Pool::create(0, 2, &StubFactory::new()).await;
    assert!(pool.acquire(1).is_some());
    assert!(pool.acquire(2).is_some());
    assert_eq!(pool.acquire(3), None);
    // The rejected connection never disturbed existing bindings.
    assert_eq!(pool.free_count(), 0);
    assert!(pool.resolve(3).is_none());
}

#[tokio::test]
async fn test_reacquire_is_idempotent() {
    let mut pool = Pool::create(0, 2, &StubFactory::new()).await;
    let first = pool.acquire(7);
    let second = pool.acquire(7);
    assert_eq!(first, second);
    assert_eq!(pool.free_count(), 1);
}

#[tokio::test]
async fn test_release_frees_slot_for_reuse() {
    let mut pool = Pool::create(0, 2, &StubFactory::new()).await;
    assert_eq!(pool.acquire(1), Some(101));
    assert_eq!(pool.acquire(2), Some(102));

    pool.release(1);
    assert_eq!(pool.free_count(), 1);

    // The earliest-created free slot is chosen first.
    assert_eq!(pool.acquire(3), Some(101));
}

#[tokio::test]
async fn test_release_unknown_connection_is_a_noop() {
    let mut pool = Pool::create(0, 2, &StubFactory::new()).await;
    pool.acquire(1);
    pool.release(99);
    pool.release(99);
    assert_eq!(pool.free_count(), 1);
    assert!(pool.resolve(1).is_some());
}

#[tokio::test]
async fn test_never_more_bindings_than_slots() {
    let mut pool = Pool::create(0, 3, &StubFactory::new()).await;
    let mut bound = 0;
    for conn in 1..=10 {
        if pool.acquire(conn).is_some() {
            bound += 1;
        }
    }
    assert_eq!(bound, 3);
    assert_eq!(pool.free_count(), 0);
}

#[tokio::test]
async fn test_resolve_reaches_the_bound_driver() {
    let mut pool = Pool::create(0, 2, &StubFactory::new()).await;
    let slot_id = pool.acquire(5).unwrap();

    let slot = pool.resolve(5).unwrap();
    assert_eq!(slot.id(), slot_id);
    assert_eq!(slot.bound_connection(), Some(5));
    assert_eq!(slot.driver_mut().driver_name(), "stub");

    pool.release(5);
    assert!(pool.resolve(5).is_none());
}
