//! Per-worker pool of pre-established backend connections.
//!
//! Every worker owns one [`Pool`] for its whole life. Slots are created
//! once at startup and never replaced; the only thing that changes over a
//! slot's life is which client connection holds it.

use crate::driver::{Driver, DriverFactory};

/// Identifier of an accepted client connection, unique within the server.
pub type ConnId = u64;

/// One pre-established backend connection plus its binding state.
pub struct Slot {
    id: u32,
    worker_id: usize,
    bound: Option<ConnId>,
    instance: u64,
    driver: Box<dyn Driver>,
}

impl Slot {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// The client connection currently holding this slot.
    pub fn bound_connection(&self) -> Option<ConnId> {
        self.bound
    }

    pub fn is_free(&self) -> bool {
        self.bound.is_none()
    }

    /// Identity of the backend's native handle, as reported by the driver
    /// at creation time.
    pub fn instance_id(&self) -> u64 {
        self.instance
    }

    pub fn driver_mut(&mut self) -> &mut dyn Driver {
        self.driver.as_mut()
    }
}

/// The ordered set of slots owned by one worker.
///
/// Never shared across workers: all operations take `&mut self` and run
/// on the owning worker's event loop, so no locking is involved.
pub struct Pool {
    worker_id: usize,
    slots: Vec<Slot>,
}

impl Pool {
    /// Build a worker's pool by invoking the driver factory up to `size`
    /// times. A failed invocation is logged and skipped — the pool simply
    /// ends up smaller; it is never retried.
    pub async fn create(worker_id: usize, size: usize, factory: &dyn DriverFactory) -> Pool {
        let mut slots = Vec::with_capacity(size);
        for ordinal in 1..=size {
            match factory.create().await {
                Ok(driver) => {
                    let id = (worker_id as u32 + 1) * 100 + ordinal as u32;
                    let instance = driver.instance_id();
                    tracing::info!(
                        "database connection ready [slot:{}][worker:{}][driver:{}]",
                        id,
                        worker_id,
                        driver.driver_name()
                    );
                    slots.push(Slot {
                        id,
                        worker_id,
                        bound: None,
                        instance,
                        driver,
                    });
                }
                Err(e) => {
                    tracing::error!(
                        "database connection failed [worker:{}]: {}",
                        worker_id,
                        e
                    );
                }
            }
        }
        Pool { worker_id, slots }
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Number of live slots; may be below the configured size if any
    /// factory invocation failed at startup.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn free_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_free()).count()
    }

    /// Slot ids in creation order.
    pub fn slot_ids(&self) -> Vec<u32> {
        self.slots.iter().map(Slot::id).collect()
    }

    /// Bind `conn` to a slot and return the slot's id.
    ///
    /// Re-acquiring with an already-bound id returns the same slot
    /// unchanged; otherwise the first free slot in creation order is
    /// taken. `None` means the pool is exhausted — answered immediately,
    /// never queued.
    pub fn acquire(&mut self, conn: ConnId) -> Option<u32> {
        if let Some(slot) = self.slots.iter().find(|slot| slot.bound == Some(conn)) {
            return Some(slot.id);
        }
        let slot = self.slots.iter_mut().find(|slot| slot.bound.is_none())?;
        slot.bound = Some(conn);
        Some(slot.id)
    }

    /// Free the slot bound to `conn`. A no-op for ids that were never
    /// bound; safe to call repeatedly.
    pub fn release(&mut self, conn: ConnId) {
        for slot in &mut self.slots {
            if slot.bound == Some(conn) {
                slot.bound = None;
            }
        }
    }

    /// The slot currently bound to `conn`.
    pub fn resolve(&mut self, conn: ConnId) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|slot| slot.bound == Some(conn))
    }
}
