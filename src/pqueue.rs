//! Bounded priority queue used by the scan's candidate-selection pass.
//!
//! A fixed-capacity array re-sorted after every insertion: correctness over
//! optimality, matching the historical implementation's re-sort-on-insert
//! approach rather than a binary heap. Capacities used in practice (the
//! caller's `limit`) are small enough that this is not a bottleneck.

/// One entry in the queue: an ascending sort key and its payload.
#[derive(Debug, Clone)]
struct Entry<T> {
    key: f64,
    payload: T,
}

/// A queue bounded to `cap` entries, kept sorted ascending by `key`.
/// `max()` is therefore always the last element, and a full queue evicts
/// its current maximum on the next successful insert.
#[derive(Debug, Clone)]
pub struct BoundedQueue<T> {
    cap: usize,
    entries: Vec<Entry<T>>,
}

impl<T> BoundedQueue<T> {
    /// Creates an empty queue of capacity `cap`.
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            entries: Vec::with_capacity(cap),
        }
    }

    /// Number of entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no entries are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The queue's capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// The current maximum key, or `None` if the queue is empty.
    #[must_use]
    pub fn max_key(&self) -> Option<f64> {
        self.entries.last().map(|e| e.key)
    }

    /// Returns true iff `key` is worth the cost of computing an upper bound
    /// and inserting: either the queue has room, or `key` does not exceed
    /// the current maximum (a candidate that already exceeds it can never
    /// improve the result set).
    #[must_use]
    pub fn insert_check(&self, key: f64) -> bool {
        self.entries.len() < self.cap || self.max_key().is_some_and(|m| key <= m)
    }

    /// Inserts `(key, payload)`, evicting the current maximum if the queue
    /// is already full, then re-sorts ascending by key.
    ///
    /// Ties keep the incumbent: if the queue is full and `key` equals the
    /// current maximum, the new entry is not inserted (the existing
    /// maximum stays), matching [`Self::insert_check`]'s `<=`/"dominated"
    /// semantics on the candidate side.
    pub fn insert(&mut self, key: f64, payload: T) {
        if self.entries.len() >= self.cap {
            match self.max_key() {
                Some(m) if key >= m => return,
                _ => {
                    self.entries.pop();
                }
            }
        }
        self.entries.push(Entry { key, payload });
        self.entries
            .sort_by(|a, b| a.key.partial_cmp(&b.key).expect("NaN keys are rejected before insert"));
    }

    /// Read-only access to entry `i` (0-indexed, ascending by key).
    #[must_use]
    pub fn get(&self, i: usize) -> Option<(f64, &T)> {
        self.entries.get(i).map(|e| (e.key, &e.payload))
    }

    /// Iterates all entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &T)> {
        self.entries.iter().map(|e| (e.key, &e.payload))
    }
}
