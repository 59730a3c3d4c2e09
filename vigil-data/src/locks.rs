//! Per-model read/write locks

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// One `RwLock` per model id. Save, tag, name-mapping and migration calls
/// take the write side; reads of the row and internal buffers take the read
/// side so they never see one buffer before a write and the other after it.
/// Different ids never contend.
#[derive(Debug, Default)]
pub struct ModelLocks {
    locks: DashMap<String, Arc<RwLock<()>>>,
}

impl ModelLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for `model_id`, created on first use
    pub fn lock_for(&self, model_id: &str) -> Arc<RwLock<()>> {
        self.locks
            .entry(model_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_model_same_lock() {
        let locks = ModelLocks::new();
        let a = locks.lock_for("m");
        let b = locks.lock_for("m");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &locks.lock_for("other")));
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn test_distinct_models_do_not_block() {
        let locks = ModelLocks::new();
        let first = locks.lock_for("a");
        let _held = first.write();
        let second = locks.lock_for("b");
        assert!(second.try_write().is_some());
        assert!(first.try_read().is_none());
    }

    #[test]
    fn test_readers_share_writers_exclude() {
        let locks = ModelLocks::new();
        let lock = locks.lock_for("m");
        let reader = lock.read();
        assert!(lock.try_read().is_some());
        assert!(lock.try_write().is_none());
        drop(reader);
        assert!(lock.try_write().is_some());
    }
}
