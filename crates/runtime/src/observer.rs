//! One-shot observers keyed by identity.

use std::fmt;

type Callback<K, A> = Box<dyn FnOnce(K, A)>;

/// Callbacks waiting for one event on one key. Each fires at most once.
pub struct ObserverRegistry<K, A> {
    entries: Vec<(K, Callback<K, A>)>,
}

impl<K, A> ObserverRegistry<K, A>
where
    K: Copy + PartialEq,
    A: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Wait for the next event on `key`.
    pub fn register(&mut self, key: K, callback: impl FnOnce(K, A) + 'static) {
        self.entries.push((key, Box::new(callback)));
    }

    /// Fire and drop every callback registered for `key`, in registration order.
    ///
    /// Matching callbacks are detached before the first one runs, so whatever they
    /// register meanwhile waits for the next event.
    pub fn fire(&mut self, key: K, arg: A) -> usize {
        let (matched, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|(entry, _)| *entry == key);
        self.entries = kept;

        let fired = matched.len();
        for (_, callback) in matched {
            callback(key, arg.clone());
        }
        fired
    }

    /// Number of callbacks waiting on `key`.
    pub fn pending_for(&self, key: K) -> usize {
        self.entries.iter().filter(|(entry, _)| *entry == key).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, A> Default for ObserverRegistry<K, A>
where
    K: Copy + PartialEq,
    A: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, A> fmt::Debug for ObserverRegistry<K, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("pending", &self.entries.len())
            .finish()
    }
}
