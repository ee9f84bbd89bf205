//! Historical-marking bookkeeping for structural mutations.
//!
//! Every distinct `(source, target)` link ever created anywhere in the
//! population gets one globally unique, monotonically increasing marking.
//! Two genomes that independently grow the same link therefore carry genes
//! that align during crossover and compatibility comparison.
//!
//! The registry is an explicit, lock-guarded service object shared through
//! an [`Arc`](std::sync::Arc) rather than process-global state, so
//! independent runs and tests never cross-contaminate markings.

use std::collections::HashMap;

use parking_lot::Mutex;

struct RegistryState {
    markings: HashMap<(u32, u32), u64>,
    next: u64,
}

/// Process-wide map from a structural mutation signature to its historical
/// marking.
///
/// Lookup-or-insert is serialized by one exclusive lock; the registry only
/// grows for the lifetime of a run.
pub struct InnovationRegistry {
    inner: Mutex<RegistryState>,
}

impl InnovationRegistry {
    /// Empty registry. Markings start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryState {
                markings: HashMap::new(),
                next: 1,
            }),
        }
    }

    /// Return the marking for `(source, target)`, allocating the next
    /// integer if the pair has never been seen.
    pub fn marking(&self, source: u32, target: u32) -> u64 {
        let mut state = self.inner.lock();
        if let Some(&m) = state.markings.get(&(source, target)) {
            return m;
        }
        let m = state.next;
        state.next += 1;
        state.markings.insert((source, target), m);
        m
    }

    /// Number of distinct structural signatures recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().markings.len()
    }

    /// Whether no marking has been allocated yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dump the registry contents for checkpointing, sorted by marking.
    #[must_use]
    pub(crate) fn entries(&self) -> Vec<(u32, u32, u64)> {
        let state = self.inner.lock();
        let mut out: Vec<(u32, u32, u64)> = state
            .markings
            .iter()
            .map(|(&(s, t), &m)| (s, t, m))
            .collect();
        out.sort_unstable_by_key(|&(_, _, m)| m);
        out
    }

    /// Rebuild a registry from checkpointed contents.
    #[must_use]
    pub(crate) fn from_entries(entries: &[(u32, u32, u64)]) -> Self {
        let mut markings = HashMap::with_capacity(entries.len());
        let mut next = 1;
        for &(s, t, m) in entries {
            markings.insert((s, t), m);
            next = next.max(m + 1);
        }
        Self {
            inner: Mutex::new(RegistryState { markings, next }),
        }
    }
}

impl Default for InnovationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InnovationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("InnovationRegistry")
            .field("markings", &state.markings.len())
            .field("next", &state.next)
            .finish()
    }
}
