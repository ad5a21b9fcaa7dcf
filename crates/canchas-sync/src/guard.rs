//! Duplicate-submit guards for user-initiated requests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::error::{SyncError, SyncResult};

/// Holds a loading flag for the duration of one request.
pub(crate) struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    /// Fails with [`SyncError::Busy`] while another holder is alive.
    pub(crate) fn acquire(flag: &'a AtomicBool, operation: &'static str) -> SyncResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SyncError::Busy(operation))?;
        Ok(BusyGuard { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Marks one id as in flight, so the same entity is not submitted twice.
pub(crate) struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    id: String,
}

impl<'a> InFlightGuard<'a> {
    pub(crate) fn acquire(
        set: &'a Mutex<HashSet<String>>,
        id: &str,
        operation: &'static str,
    ) -> SyncResult<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string());
        if !inserted {
            return Err(SyncError::Busy(operation));
        }
        Ok(InFlightGuard {
            set,
            id: id.to_string(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}
