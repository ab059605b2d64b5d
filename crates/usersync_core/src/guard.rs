//! Reentrancy guard for inbound applies.
//!
//! Applying a remote change mutates local accounts, and the host reports
//! those mutations like any other. Without a guard the dispatcher would send
//! the change straight back to the peer it came from.
//!
//! Suppression is scoped: [`ReentrancyGuard::suppress_all`] returns a
//! [`SuppressionScope`] whose `Drop` restores the previous state, so the guard
//! is released on every exit path, including early returns and panics.
//! Scopes nest by counting.

use crate::lifecycle::MutationKind;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::thread::{self, ThreadId};

/// How far a suppression scope reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardMode {
    /// Only notifications raised on the applying thread are suppressed.
    ///
    /// Requires the host to deliver lifecycle notifications synchronously on
    /// the thread that performs the mutation.
    #[default]
    PerThread,
    /// One flag for the whole process. Concurrent applies and unrelated local
    /// mutations can observe each other's scopes.
    ProcessWide,
}

type Depths = [usize; 4];

/// Tracks which mutation kinds are currently suppressed.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    mode: GuardMode,
    depths: Mutex<HashMap<Option<ThreadId>, Depths>>,
}

impl ReentrancyGuard {
    /// Creates a guard with the given mode.
    pub fn new(mode: GuardMode) -> Self {
        Self {
            mode,
            depths: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the guard mode.
    pub fn mode(&self) -> GuardMode {
        self.mode
    }

    fn slot(&self) -> Option<ThreadId> {
        match self.mode {
            GuardMode::PerThread => Some(thread::current().id()),
            GuardMode::ProcessWide => None,
        }
    }

    /// Suppresses the given kinds until the returned scope is dropped.
    pub fn suppress(&self, kinds: &[MutationKind]) -> SuppressionScope<'_> {
        let slot = self.slot();
        let mut indices = Vec::with_capacity(kinds.len());
        {
            let mut depths = self.depths.lock();
            let entry = depths.entry(slot).or_insert([0; 4]);
            for kind in kinds {
                let i = kind.index();
                if !indices.contains(&i) {
                    entry[i] += 1;
                    indices.push(i);
                }
            }
        }
        tracing::trace!(?kinds, "lifecycle dispatch suppressed");
        SuppressionScope {
            guard: self,
            slot,
            indices,
        }
    }

    /// Suppresses every mutation kind until the returned scope is dropped.
    pub fn suppress_all(&self) -> SuppressionScope<'_> {
        self.suppress(&MutationKind::ALL)
    }

    /// Returns true if notifications of `kind` must not be dispatched.
    pub fn is_suppressed(&self, kind: MutationKind) -> bool {
        self.depths
            .lock()
            .get(&self.slot())
            .is_some_and(|d| d[kind.index()] > 0)
    }

    /// Returns true if any kind is suppressed.
    pub fn is_engaged(&self) -> bool {
        self.depths
            .lock()
            .get(&self.slot())
            .is_some_and(|d| d.iter().any(|&n| n > 0))
    }

    fn release(&self, slot: Option<ThreadId>, indices: &[usize]) {
        let mut depths = self.depths.lock();
        if let Some(entry) = depths.get_mut(&slot) {
            for &i in indices {
                entry[i] = entry[i].saturating_sub(1);
            }
            if entry.iter().all(|&n| n == 0) {
                depths.remove(&slot);
            }
        }
    }
}

/// Active suppression. Dropping it re-enables dispatch.
#[must_use = "suppression ends as soon as the scope is dropped"]
#[derive(Debug)]
pub struct SuppressionScope<'a> {
    guard: &'a ReentrancyGuard,
    slot: Option<ThreadId>,
    indices: Vec<usize>,
}

impl Drop for SuppressionScope<'_> {
    fn drop(&mut self) {
        self.guard.release(self.slot, &self.indices);
        tracing::trace!("lifecycle dispatch restored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn scope_restores_on_drop() {
        let guard = ReentrancyGuard::default();
        assert!(!guard.is_engaged());
        {
            let _scope = guard.suppress_all();
            for kind in MutationKind::ALL {
                assert!(guard.is_suppressed(kind));
            }
        }
        assert!(!guard.is_engaged());
    }

    #[test]
    fn partial_suppression() {
        let guard = ReentrancyGuard::default();
        let _scope = guard.suppress(&[MutationKind::Deleted]);
        assert!(guard.is_suppressed(MutationKind::Deleted));
        assert!(!guard.is_suppressed(MutationKind::Created));
    }

    #[test]
    fn nested_scopes_count() {
        let guard = ReentrancyGuard::new(GuardMode::ProcessWide);
        let outer = guard.suppress_all();
        {
            let _inner = guard.suppress_all();
        }
        assert!(guard.is_engaged());
        drop(outer);
        assert!(!guard.is_engaged());
    }

    #[test]
    fn restores_after_error_return() {
        fn apply(guard: &ReentrancyGuard) -> Result<(), &'static str> {
            let _scope = guard.suppress_all();
            Err("apply failed")
        }

        let guard = ReentrancyGuard::default();
        assert!(apply(&guard).is_err());
        assert!(!guard.is_engaged());
    }

    #[test]
    fn restores_after_panic() {
        let guard = Arc::new(ReentrancyGuard::new(GuardMode::ProcessWide));
        let g = Arc::clone(&guard);
        let result = std::thread::spawn(move || {
            let _scope = g.suppress_all();
            panic!("apply blew up");
        })
        .join();
        assert!(result.is_err());
        assert!(!guard.is_engaged());
    }

    #[test]
    fn per_thread_scope_is_invisible_elsewhere() {
        let guard = Arc::new(ReentrancyGuard::new(GuardMode::PerThread));
        let _scope = guard.suppress_all();

        let g = Arc::clone(&guard);
        let seen = std::thread::spawn(move || g.is_suppressed(MutationKind::Updated))
            .join()
            .unwrap();
        assert!(!seen);
        assert!(guard.is_suppressed(MutationKind::Updated));
    }

    #[test]
    fn process_wide_scope_is_visible_everywhere() {
        let guard = Arc::new(ReentrancyGuard::new(GuardMode::ProcessWide));
        let _scope = guard.suppress_all();

        let g = Arc::clone(&guard);
        let seen = std::thread::spawn(move || g.is_suppressed(MutationKind::Updated))
            .join()
            .unwrap();
        assert!(seen);
    }
}
