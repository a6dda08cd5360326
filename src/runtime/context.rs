use crate::runtime::PoolHandle;
use std::cell::RefCell;

thread_local! {
    static CURRENT_POOL: RefCell<Option<PoolHandle>> = const { RefCell::new(None) };
}

/// Publish `handle` as this thread's pool for the lifetime of the returned
/// guard. Workers hold the guard across their whole loop so the pointer is
/// cleared even if a resumed task panics through.
pub(crate) fn enter(handle: PoolHandle) -> ContextGuard {
    CURRENT_POOL.with(|current| {
        let previous = current.borrow_mut().replace(handle);
        debug_assert!(previous.is_none(), "worker thread entered twice");
    });
    ContextGuard { _private: () }
}

pub(crate) fn current() -> Option<PoolHandle> {
    CURRENT_POOL.with(|current| current.borrow().clone())
}

pub(crate) struct ContextGuard {
    _private: (),
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT_POOL.with(|current| current.borrow_mut().take());
    }
}
