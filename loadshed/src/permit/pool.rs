//! Permit pool implementation: a fixed-capacity counting primitive with direct
//! handoff to suspended waiters.
//!
//! A release that finds a live waiter transfers the slot to it while the pool
//! lock is held, so the outstanding count never dips and a caller arriving
//! concurrently cannot take the freed slot first.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Identity of a single grant. Every acquire mints a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermitId(u64);

impl fmt::Display for PermitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "permit-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AcquireError {
    #[error("Cancelled while waiting for a permit")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("Permit pool capacity must be at least 1")]
    ZeroCapacity,
}

struct Waiter {
    id: u64,
    tx: oneshot::Sender<PermitId>,
}

struct PoolState {
    outstanding: HashSet<PermitId>,
    waiters: VecDeque<Waiter>,
    next_permit: u64,
    next_waiter: u64,
}

impl PoolState {
    fn mint(&mut self) -> PermitId {
        let id = PermitId(self.next_permit);
        self.next_permit += 1;
        self.outstanding.insert(id);
        id
    }
}

struct PoolShared {
    capacity: usize,
    state: Mutex<PoolState>,
}

impl PoolShared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return `id` to the pool, handing the slot to the first live waiter.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not currently outstanding (double release, or an id
    /// this pool never issued).
    fn release(&self, id: PermitId) {
        let mut state = self.lock();
        if !state.outstanding.remove(&id) {
            drop(state);
            panic!("{id} released twice or never issued by this pool");
        }

        while let Some(waiter) = state.waiters.pop_front() {
            let next = state.mint();
            match waiter.tx.send(next) {
                Ok(()) => {
                    tracing::trace!(released = %id, granted = %next, waiter = waiter.id, "Permit handed off");
                    return;
                }
                Err(_) => {
                    // Waiter gave up between enqueueing and this release.
                    state.outstanding.remove(&next);
                }
            }
        }

        tracing::trace!(permit = %id, outstanding = state.outstanding.len(), "Permit released");
    }
}

/// A held slot. Returned to the pool exactly once, on [`Permit::release`] or drop.
#[must_use = "dropping a permit releases it immediately"]
pub struct Permit {
    id: PermitId,
    shared: Arc<PoolShared>,
}

impl Permit {
    fn new(id: PermitId, shared: Arc<PoolShared>) -> Self {
        Self { id, shared }
    }

    pub fn id(&self) -> PermitId {
        self.id
    }

    pub fn release(self) {
        drop(self);
    }
}

impl fmt::Debug for Permit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit").field("id", &self.id).finish()
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.shared.release(self.id);
    }
}

/// A queued waiter. Dropping it before the grant is consumed withdraws from the
/// queue, or passes on a grant that raced with cancellation.
struct PendingGrant {
    rx: oneshot::Receiver<PermitId>,
    waiter_id: u64,
    shared: Arc<PoolShared>,
    settled: bool,
}

impl PendingGrant {
    async fn wait(mut self, cancel: &CancellationToken) -> Result<Permit, AcquireError> {
        tokio::select! {
            biased;
            granted = &mut self.rx => match granted {
                Ok(id) => {
                    self.settled = true;
                    Ok(Permit::new(id, Arc::clone(&self.shared)))
                }
                // Senders only leave the queue through `release`, which always sends.
                Err(_) => Err(AcquireError::Cancelled),
            },
            _ = cancel.cancelled() => Err(AcquireError::Cancelled),
        }
    }
}

impl Drop for PendingGrant {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        self.rx.close();
        match self.rx.try_recv() {
            Ok(id) => {
                tracing::trace!(permit = %id, waiter = self.waiter_id, "Grant arrived after cancellation, passing on");
                self.shared.release(id);
            }
            Err(_) => {
                let waiter_id = self.waiter_id;
                self.shared.lock().waiters.retain(|w| w.id != waiter_id);
            }
        }
    }
}

/// Pool occupancy read under a single lock, so `outstanding + available == capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolCounts {
    pub capacity: usize,
    pub outstanding: usize,
    pub available: usize,
    pub waiters: usize,
}

/// Fixed-capacity pool of permits.
///
/// Cheap to share behind an `Arc`; permits keep the pool state alive on their own.
pub struct PermitPool {
    shared: Arc<PoolShared>,
}

impl PermitPool {
    pub fn new(capacity: usize) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }

        Ok(Self {
            shared: Arc::new(PoolShared {
                capacity,
                state: Mutex::new(PoolState {
                    outstanding: HashSet::with_capacity(capacity),
                    waiters: VecDeque::new(),
                    next_permit: 0,
                    next_waiter: 0,
                }),
            }),
        })
    }

    /// Take a permit if one is free. Never waits and never queues.
    pub fn try_acquire(&self) -> Option<Permit> {
        let mut state = self.shared.lock();
        if state.outstanding.len() >= self.shared.capacity {
            return None;
        }
        let id = state.mint();
        drop(state);
        Some(Permit::new(id, Arc::clone(&self.shared)))
    }

    /// Take a permit, suspending until one is handed over or `cancel` fires.
    ///
    /// A token that has already fired yields `Cancelled` without touching the pool.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Permit, AcquireError> {
        if cancel.is_cancelled() {
            return Err(AcquireError::Cancelled);
        }

        let pending = {
            let mut state = self.shared.lock();
            if state.outstanding.len() < self.shared.capacity {
                let id = state.mint();
                return Ok(Permit::new(id, Arc::clone(&self.shared)));
            }

            let (tx, rx) = oneshot::channel();
            let waiter_id = state.next_waiter;
            state.next_waiter += 1;
            state.waiters.push_back(Waiter { id: waiter_id, tx });
            tracing::trace!(waiter = waiter_id, queued = state.waiters.len(), "Waiting for permit");

            PendingGrant {
                rx,
                waiter_id,
                shared: Arc::clone(&self.shared),
                settled: false,
            }
        };

        pending.wait(cancel).await
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn outstanding(&self) -> usize {
        self.shared.lock().outstanding.len()
    }

    pub fn available(&self) -> usize {
        self.capacity() - self.outstanding()
    }

    /// Number of callers currently suspended in [`PermitPool::acquire`].
    pub fn waiters(&self) -> usize {
        self.counts().waiters
    }

    pub fn counts(&self) -> PoolCounts {
        let state = self.shared.lock();
        let outstanding = state.outstanding.len();
        PoolCounts {
            capacity: self.shared.capacity,
            outstanding,
            available: self.shared.capacity - outstanding,
            waiters: state.waiters.iter().filter(|w| !w.tx.is_closed()).count(),
        }
    }
}
