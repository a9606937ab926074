//! The scan state machine and the filter-and-refine candidate-selection
//! algorithm (VAF-NOA): a single pass over approximations using a bounded
//! max-heap keyed by upper bound, followed by a second pass that emits
//! every tuple whose lower bound cannot be excluded.

use roaring::RoaringTreemap;
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::config::ScanConfig;
use crate::distance::BoundTables;
use crate::error::{Error, Result};
use crate::feature::HeapTid;
use crate::marks::Marks;
use crate::page::PageStore;
use crate::pqueue::BoundedQueue;

/// Lifecycle states of one scan, mirroring the index access method's scan
/// protocol. Mark/restore is never supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Constructed, no keys bound yet.
    Init,
    /// Keys bound; `get_bitmap` may be called.
    Open,
    /// `get_bitmap` has run once; the scan is exhausted.
    Done,
    /// `end` has been called; no further calls are valid.
    Closed,
}

/// The search keys bound to a scan via `rescan`.
#[derive(Debug, Clone)]
pub struct ScanKeys {
    /// Query vector, compared against the index's common-prefix
    /// dimensionality.
    pub query: Vec<f64>,
    /// Resolved Minkowski norm.
    pub norm: crate::distance::MinkowskiNorm,
    /// Optional per-dimension weights.
    pub weights: Option<Vec<f64>>,
    /// Result cap. `None` degrades the scan to a full sequential
    /// emission (a cost-model concern, not a correctness failure).
    pub limit: Option<usize>,
    /// Rows already excluded by other predicates, when present.
    pub input_bitmap: Option<RoaringTreemap>,
}

fn encode_tid(tid: HeapTid) -> u64 {
    (u64::from(tid.block) << 16) | u64::from(tid.offset)
}

/// A bitmap-producing scan over a [`PageStore`].
pub struct Scan<'a> {
    store: &'a PageStore,
    marks: &'a Marks,
    cancel: CancellationToken,
    state: ScanState,
    keys: Option<ScanKeys>,
}

impl<'a> Scan<'a> {
    /// Begins a new scan in the `Init` state.
    #[must_use]
    pub fn begin(store: &'a PageStore, marks: &'a Marks, cancel: CancellationToken) -> Self {
        Self {
            store,
            marks,
            cancel,
            state: ScanState::Init,
            keys: None,
        }
    }

    /// Binds (or replaces) the scan's search keys, transitioning to
    /// `Open`. Valid from `Init` or `Open`; resources are retained across
    /// a rescan.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadQuery`] if called while `Done` or `Closed`.
    pub fn rescan(&mut self, keys: ScanKeys) -> Result<()> {
        match self.state {
            ScanState::Init | ScanState::Open => {
                self.keys = Some(keys);
                self.state = ScanState::Open;
                Ok(())
            }
            ScanState::Done | ScanState::Closed => {
                Err(Error::BadQuery("rescan is not valid after the scan has completed".into()))
            }
        }
    }

    /// Runs the filter-and-refine pass, producing a result bitmap (any
    /// caller-supplied input bitmap is logically OR'd in by the caller,
    /// not here, matching the index access method contract) and the
    /// candidate count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadQuery`] if the scan is not `Open`, or if
    /// `cfg.enable_vascan` is false; returns [`Error::Cancelled`] if the
    /// token fires mid-scan.
    pub fn get_bitmap(
        &mut self,
        reltuples: u64,
        cfg: &ScanConfig,
    ) -> Result<(RoaringTreemap, i64)> {
        if self.state != ScanState::Open {
            return Err(Error::BadQuery("get_bitmap requires an open scan".into()));
        }
        if !cfg.enable_vascan {
            return Err(Error::BadQuery("vascan is disabled".into()));
        }
        let keys = self
            .keys
            .as_ref()
            .expect("Open state implies keys were bound by rescan");

        self.store
            .warn_if_stale(reltuples, cfg.stale_changes_threshold, cfg.stale_fraction_threshold);

        let limit = keys.limit.or(cfg.default_limit);

        let result = match limit {
            None => self.full_scan(keys),
            Some(0) => {
                warn!("scan limit is zero; degrading to full sequential emission");
                self.full_scan(keys)
            }
            Some(k) => self.bounded_scan(keys, k),
        }?;

        self.state = ScanState::Done;
        Ok(result)
    }

    fn full_scan(&self, keys: &ScanKeys) -> Result<(RoaringTreemap, i64)> {
        let mut bitmap = RoaringTreemap::new();
        let mut count: i64 = 0;
        self.store.for_each_live_tuple(&self.cancel, |tuple| {
            if keys
                .input_bitmap
                .as_ref()
                .is_some_and(|b| !b.contains(encode_tid(tuple.heap_tid)))
            {
                return;
            }
            bitmap.insert(encode_tid(tuple.heap_tid));
            count += 1;
        })?;
        Ok((bitmap, count))
    }

    fn bounded_scan(&self, keys: &ScanKeys, k: usize) -> Result<(RoaringTreemap, i64)> {
        let bounds = BoundTables::build(self.marks, &keys.query, keys.norm, keys.weights.as_deref())?;
        let mut heap: BoundedQueue<HeapTid> = BoundedQueue::new(k);
        let mut lower_bounds: Vec<(HeapTid, f64)> = Vec::new();

        self.store.for_each_live_tuple(&self.cancel, |tuple| {
            if keys
                .input_bitmap
                .as_ref()
                .is_some_and(|b| !b.contains(encode_tid(tuple.heap_tid)))
            {
                return;
            }
            let lower = bounds.lower_bound(&tuple.apx);
            lower_bounds.push((tuple.heap_tid, lower));

            if heap.insert_check(lower) {
                let upper = bounds.upper_bound(&tuple.apx);
                heap.insert(upper, tuple.heap_tid);
            }
        })?;

        let max_upper_in_heap = heap.max_key().unwrap_or(f64::INFINITY);
        let mut bitmap = RoaringTreemap::new();
        let mut count: i64 = 0;
        for (tid, lower) in lower_bounds {
            if lower <= max_upper_in_heap {
                bitmap.insert(encode_tid(tid));
                count += 1;
            }
        }

        debug!(candidates = count, k, "bounded scan complete");
        Ok((bitmap, count))
    }

    /// Ends the scan, releasing its resources.
    pub fn end(&mut self) {
        self.state = ScanState::Closed;
        self.keys = None;
    }

    /// Marking a scan position is not supported.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::BadQuery`].
    pub fn mark_pos(&self) -> Result<()> {
        Err(Error::BadQuery("mark_pos is not supported by this index".into()))
    }

    /// Restoring a scan position is not supported.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::BadQuery`].
    pub fn restore_pos(&self) -> Result<()> {
        Err(Error::BadQuery("restore_pos is not supported by this index".into()))
    }
}
