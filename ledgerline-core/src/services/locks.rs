//! Per-account exclusive locks
//!
//! A set of held account ids guarded by a mutex, with a condvar to wake
//! waiters. Ids are always taken in ascending order, so two transfers over
//! the same pair of accounts in opposite directions cannot deadlock.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Condvar, Mutex, MutexGuard};

use tracing::trace;

use crate::domain::result::{Error, Result};

/// Table of account ids currently held by some unit of work
#[derive(Default)]
pub struct AccountLocks {
    held: Mutex<HashSet<i64>>,
    released: Condvar,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until every id in `account_ids` is held by the caller.
    /// Duplicates are ignored.
    pub fn acquire(&self, account_ids: &[i64]) -> Result<AccountLockGuard<'_>> {
        let ordered: BTreeSet<i64> = account_ids.iter().copied().collect();
        let mut guard = AccountLockGuard {
            locks: self,
            ids: Vec::with_capacity(ordered.len()),
        };

        for id in ordered {
            let mut held = self.table()?;
            while held.contains(&id) {
                held = self
                    .released
                    .wait(held)
                    .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))?;
            }
            held.insert(id);
            trace!(account_id = id, "account lock acquired");
            guard.ids.push(id);
        }

        Ok(guard)
    }

    /// Whether `account_id` is currently held
    pub fn is_held(&self, account_id: i64) -> bool {
        self.table().map(|held| held.contains(&account_id)).unwrap_or(false)
    }

    fn table(&self) -> Result<MutexGuard<'_, HashSet<i64>>> {
        self.held
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }

    fn release(&self, ids: &[i64]) {
        // Poisoning is ignored, held ids are always released
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        for id in ids {
            held.remove(id);
            trace!(account_id = *id, "account lock released");
        }
        drop(held);
        self.released.notify_all();
    }
}

/// Holds a set of account locks until dropped
pub struct AccountLockGuard<'a> {
    locks: &'a AccountLocks,
    ids: Vec<i64>,
}

impl AccountLockGuard<'_> {
    /// Held ids in acquisition (ascending) order
    pub fn ids(&self) -> &[i64] {
        &self.ids
    }
}

impl Drop for AccountLockGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_acquires_in_ascending_order() {
        let locks = AccountLocks::new();
        let guard = locks.acquire(&[9, 3, 9, 5]).unwrap();
        assert_eq!(guard.ids(), &[3, 5, 9]);
        assert!(locks.is_held(5));
        drop(guard);
        assert!(!locks.is_held(5));
    }

    #[test]
    fn test_second_holder_waits_for_release() {
        let locks = Arc::new(AccountLocks::new());
        let entered = Arc::new(AtomicBool::new(false));

        let guard = locks.acquire(&[1]).unwrap();

        let handle = {
            let locks = locks.clone();
            let entered = entered.clone();
            thread::spawn(move || {
                let _guard = locks.acquire(&[2, 1]).unwrap();
                entered.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst));

        drop(guard);
        handle.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
        assert!(!locks.is_held(1));
        assert!(!locks.is_held(2));
    }

    #[test]
    fn test_opposite_order_requests_do_not_deadlock() {
        let locks = Arc::new(AccountLocks::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let locks = locks.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        let pair = if i % 2 == 0 { [1, 2] } else { [2, 1] };
                        let _guard = locks.acquire(&pair).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
