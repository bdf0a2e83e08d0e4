//! Debug-only liveness tracking: one registry of live storage addresses per
//! root schema, consulted by every generated accessor so that use-after-free
//! and double-free become deterministic assertion failures instead of
//! undefined behavior. Compiled only under `debug_assertions`; the whole
//! module is absent from release builds.

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Sets {
    /// Heap-allocated and not yet deallocated.
    live: FxHashSet<usize>,
    /// Ever heap-allocated by this runtime. Externally-owned storage never
    /// appears here, which is what lets accessors assert "not freed" without
    /// rejecting external (untracked) objects.
    tracked: FxHashSet<usize>,
}

/// Live-address registry for one root schema. Every operation takes the lock
/// for exactly its own duration; nothing holds it across an allocation or
/// deallocation's other side effects.
#[derive(Debug, Default)]
pub(crate) struct LivenessRegistry {
    sets: Mutex<Sets>,
}

impl LivenessRegistry {
    pub(crate) fn insert(&self, addr: usize) {
        let mut sets = self.sets.lock();
        sets.live.insert(addr);
        sets.tracked.insert(addr);
    }

    pub(crate) fn remove(&self, addr: usize) {
        self.sets.lock().live.remove(&addr);
    }

    pub(crate) fn contains(&self, addr: usize) -> bool {
        self.sets.lock().live.contains(&addr)
    }

    pub(crate) fn assert_live(&self, addr: usize) {
        assert!(
            self.contains(addr),
            "access on a deallocated object (address {:#x})",
            addr
        );
    }

    pub(crate) fn assert_dead(&self, addr: usize) {
        assert!(
            !self.contains(addr),
            "object still exists (address {:#x})",
            addr
        );
    }

    /// Accessor precondition: an address this runtime once allocated must
    /// still be live. Untracked addresses (external storage) pass.
    pub(crate) fn assert_not_freed(&self, addr: usize) {
        let sets = self.sets.lock();
        assert!(
            !sets.tracked.contains(&addr) || sets.live.contains(&addr),
            "access on a deallocated object (address {:#x})",
            addr
        );
    }
}

/// Owns one registry per root schema identifier. Belongs to the runtime;
/// there is no process-global state; hosts that want one tracker per process
/// create one runtime per process.
#[derive(Debug, Default)]
pub(crate) struct LivenessTracker {
    registries: Mutex<FxHashMap<u64, Arc<LivenessRegistry>>>,
}

impl LivenessTracker {
    pub(crate) fn registry(&self, root_id: u64) -> Arc<LivenessRegistry> {
        self.registries.lock().entry(root_id).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_membership() {
        let tracker = LivenessTracker::default();
        let registry = tracker.registry(7);
        registry.insert(0x1000);
        assert!(registry.contains(0x1000));
        registry.assert_live(0x1000);
        registry.assert_dead(0x2000);
        registry.remove(0x1000);
        assert!(!registry.contains(0x1000));
    }

    #[test]
    fn test_untracked_addresses_pass_accessor_check() {
        let registry = LivenessRegistry::default();
        registry.assert_not_freed(0x3000);
        registry.insert(0x3000);
        registry.assert_not_freed(0x3000);
        registry.remove(0x3000);
    }

    #[test]
    #[should_panic(expected = "deallocated object")]
    fn test_freed_address_fails_accessor_check() {
        let registry = LivenessRegistry::default();
        registry.insert(0x3000);
        registry.remove(0x3000);
        registry.assert_not_freed(0x3000);
    }

    #[test]
    fn test_one_registry_per_root() {
        let tracker = LivenessTracker::default();
        let a = tracker.registry(1);
        let b = tracker.registry(2);
        a.insert(0x1000);
        assert!(!b.contains(0x1000));
        // Same root id resolves to the same registry.
        assert!(tracker.registry(1).contains(0x1000));
    }
}
