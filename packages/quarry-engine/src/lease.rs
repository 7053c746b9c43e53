use parking_lot::{Condvar, Mutex};
use std::thread::{self, ThreadId};
use tracing::trace;

#[derive(Debug, Default)]
struct LeaseState {
    owner: Option<ThreadId>,
    depth: usize,
}

/// Mutual exclusion over the current project's mutable state.
///
/// The lease is reentrant per holding thread, tracked with an explicit owner
/// id and depth count so the contract does not depend on the behavior of any
/// particular lock primitive. A thread that does not hold the lease blocks
/// until it becomes available. A calculation that recursively triggers
/// another calculation guarded by the same lease therefore cannot deadlock.
#[derive(Debug, Default)]
pub struct ProjectLeaseRegistry {
    state: Mutex<LeaseState>,
    available: Condvar,
}

impl ProjectLeaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `block` while holding (or reusing) the project lease. The lease is
    /// released on unwind as well as on normal return.
    pub fn with_lease<R>(&self, block: impl FnOnce() -> R) -> R {
        self.acquire();
        let _release = ReleaseOnDrop(self);
        block()
    }

    /// Whether the calling thread currently holds the lease.
    pub fn is_held_by_current_thread(&self) -> bool {
        self.state.lock().owner == Some(thread::current().id())
    }

    fn acquire(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owner == Some(me) {
            state.depth += 1;
            trace!(depth = state.depth, "project lease re-entered");
            return;
        }
        while state.owner.is_some() {
            self.available.wait(&mut state);
        }
        state.owner = Some(me);
        state.depth = 1;
        trace!("project lease acquired");
    }

    fn release(&self) {
        let mut state = self.state.lock();
        debug_assert_eq!(state.owner, Some(thread::current().id()));
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.available.notify_one();
            trace!("project lease released");
        }
    }
}

struct ReleaseOnDrop<'a>(&'a ProjectLeaseRegistry);

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_lease_is_released_after_block() {
        let leases = ProjectLeaseRegistry::new();

        leases.with_lease(|| {
            assert!(leases.is_held_by_current_thread());
        });
        assert!(!leases.is_held_by_current_thread());
    }

    #[test]
    fn test_lease_is_reentrant_on_holding_thread() {
        let leases = ProjectLeaseRegistry::new();

        let value = leases.with_lease(|| {
            leases.with_lease(|| {
                assert!(leases.is_held_by_current_thread());
                42
            })
        });
        assert_eq!(value, 42);
        assert!(!leases.is_held_by_current_thread());
    }

    #[test]
    fn test_lease_is_released_on_panic() {
        let leases = Arc::new(ProjectLeaseRegistry::new());

        let leases_clone = Arc::clone(&leases);
        let result = std::thread::spawn(move || {
            leases_clone.with_lease(|| panic!("calculator blew up"));
        })
        .join();
        assert!(result.is_err());

        // A panicking holder must not leave the lease stuck.
        leases.with_lease(|| {
            assert!(leases.is_held_by_current_thread());
        });
    }

    #[test]
    fn test_lease_excludes_other_threads() {
        let leases = Arc::new(ProjectLeaseRegistry::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let leases = Arc::clone(&leases);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            handles.push(std::thread::spawn(move || {
                for _ in 0..20 {
                    leases.with_lease(|| {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_micros(50));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    });
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}
