use parking_lot::Mutex;
use std::sync::Arc;
use std::task::Waker;

/// A parked awaiter. The node is shared between the primitive's waiter list
/// and the future that parked, so a re-poll refreshes the waker in place
/// instead of re-registering (which would change the node's position in the
/// list).
pub(crate) struct WaitNode {
    waker: Mutex<Waker>,
}

impl WaitNode {
    pub(crate) fn new(waker: Waker) -> Arc<Self> {
        Arc::new(Self {
            waker: Mutex::new(waker),
        })
    }

    pub(crate) fn update(&self, waker: &Waker) {
        let mut slot = self.waker.lock();
        if !slot.will_wake(waker) {
            *slot = waker.clone();
        }
    }

    /// Callers must not hold the owning primitive's lock. The node's own
    /// lock is released before waking: the woken continuation may re-poll
    /// and call [`update`](WaitNode::update) on this very node.
    pub(crate) fn wake(&self) {
        let waker = self.waker.lock().clone();
        waker.wake();
    }
}

/// Remove `node` from `list` if it is still parked there.
pub(crate) fn unpark(list: &mut smallvec::SmallVec<[Arc<WaitNode>; 4]>, node: &Arc<WaitNode>) {
    list.retain(|parked| !Arc::ptr_eq(parked, node));
}
