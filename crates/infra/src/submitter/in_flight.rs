use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracechain_core::DispatchId;

/// Dispatch ids with a `confirmDelivery` currently being submitted or awaited.
#[derive(Debug, Clone, Default)]
pub struct InFlightSet {
    ids: Arc<Mutex<HashSet<DispatchId>>>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `dispatch_id`; `None` if it is already claimed.
    ///
    /// The claim is released when the guard drops, on every exit path.
    pub fn try_acquire(&self, dispatch_id: DispatchId) -> Option<InFlightGuard> {
        let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
        if !ids.insert(dispatch_id) {
            return None;
        }
        Some(InFlightGuard {
            ids: Arc::clone(&self.ids),
            dispatch_id,
        })
    }

    pub fn contains(&self, dispatch_id: DispatchId) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&dispatch_id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    ids: Arc<Mutex<HashSet<DispatchId>>>,
    dispatch_id: DispatchId,
}

impl InFlightGuard {
    pub fn dispatch_id(&self) -> DispatchId {
        self.dispatch_id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.dispatch_id);
    }
}
