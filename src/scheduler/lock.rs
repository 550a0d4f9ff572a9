//! Process-wide run lock -- at most one job execution at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Mutual-exclusion guard around job execution.
///
/// `try_acquire` never blocks: a fire that loses the race is skipped, not
/// queued. An optional lease lets a new acquisition displace a holder that
/// has been active longer than the lease, so a stuck run cannot block every
/// future fire.
#[derive(Clone)]
pub struct RunLock {
    inner: Arc<Inner>,
}

struct Inner {
    holder: Mutex<Option<Holder>>,
    lease: Option<Duration>,
    next_token: AtomicU64,
}

struct Holder {
    token: u64,
    acquired_at: Instant,
}

/// Held while a run is active; dropping it releases the lock.
pub struct RunGuard {
    inner: Arc<Inner>,
    token: u64,
}

impl RunLock {
    pub fn new(lease: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(Inner {
                holder: Mutex::new(None),
                lease,
                next_token: AtomicU64::new(0),
            }),
        }
    }

    /// Acquire the lock if it is free, or if the current holder's lease has
    /// expired. Of N concurrent callers, exactly one wins.
    pub fn try_acquire(&self) -> Option<RunGuard> {
        let mut holder = self.inner.holder.lock().expect("run lock poisoned");
        if let Some(current) = holder.as_ref() {
            let expired = self
                .inner
                .lease
                .is_some_and(|ttl| current.acquired_at.elapsed() >= ttl);
            if !expired {
                return None;
            }
        }
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        *holder = Some(Holder {
            token,
            acquired_at: Instant::now(),
        });
        Some(RunGuard {
            inner: Arc::clone(&self.inner),
            token,
        })
    }

    /// Whether a run currently holds the lock (lease expiry not considered).
    pub fn is_held(&self) -> bool {
        self.inner.holder.lock().expect("run lock poisoned").is_some()
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut holder = self.inner.holder.lock().expect("run lock poisoned");
        // A displaced holder must not release the new owner's acquisition.
        if holder.as_ref().is_some_and(|h| h.token == self.token) {
            *holder = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_concurrent_acquire_has_single_winner() {
        let lock = RunLock::new(None);
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = lock.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    lock.try_acquire()
                })
            })
            .collect();

        let guards: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(guards.iter().filter(|g| g.is_some()).count(), 1);

        drop(guards);
        assert!(!lock.is_held());
    }

    #[test]
    fn test_release_makes_lock_acquirable_again() {
        let lock = RunLock::new(None);
        let guard = lock.try_acquire().unwrap();
        assert!(lock.try_acquire().is_none());
        drop(guard);
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn test_expired_lease_can_be_taken_over() {
        let lock = RunLock::new(Some(Duration::from_millis(20)));
        let stale = lock.try_acquire().unwrap();
        thread::sleep(Duration::from_millis(40));

        let fresh = lock.try_acquire();
        assert!(fresh.is_some());

        // The displaced holder must not release the new acquisition.
        drop(stale);
        assert!(lock.is_held());
        drop(fresh);
        assert!(!lock.is_held());
    }

    #[test]
    fn test_unexpired_lease_still_blocks() {
        let lock = RunLock::new(Some(Duration::from_secs(60)));
        let _guard = lock.try_acquire().unwrap();
        assert!(lock.try_acquire().is_none());
    }
}
