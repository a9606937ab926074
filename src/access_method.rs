//! The external index access method surface: the entry points a host
//! query executor calls to build, maintain, scan, and cost a VA-File
//! index, gathered behind one handle.

use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::cancel::CancellationToken;
use crate::config::{MarksConfig, MarksStrategy, ScanConfig, StorageConfig};
use crate::error::{Error, Result};
use crate::feature::{HeapTid, RowSource};
use crate::marks::{self, Marks};
use crate::page::{BuildStats, DeleteStats, PageStore, VacuumStats};
use crate::scan::{Scan, ScanKeys};

/// Options recognized at `CREATE INDEX` time, mirroring the historical
/// `vamarks` reloption.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOptions {
    /// Mark-building strategy; falls back to the configured default when
    /// unset.
    pub vamarks: Option<MarksStrategy>,
}

/// A planner-facing description of the query the index would serve,
/// sufficient to compute [`CostEstimate`].
#[derive(Debug, Clone)]
pub struct CostQuery {
    /// Result cap, if any.
    pub limit: Option<usize>,
    /// Whether the query also specifies an offset.
    pub has_offset: bool,
    /// Estimated row count of the base relation.
    pub table_rows: u64,
    /// Planner-level toggle (`enable_vascan = false`).
    pub user_disabled: bool,
}

/// Costs and selectivity returned by [`VaFileIndex::cost_estimate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostEstimate {
    pub startup_cost: f64,
    pub total_cost: f64,
    pub selectivity: f64,
    pub correlation: f64,
    /// Sentinel: the planner should not choose this index for this query.
    pub disabled: bool,
}

/// A built VA-File index: its persisted marks and its page store.
pub struct VaFileIndex {
    store: PageStore,
    marks: Marks,
    scan_cfg: ScanConfig,
    strategy: MarksStrategy,
}

impl VaFileIndex {
    /// Builds a fresh index at `path` from `source`, failing if a file
    /// already exists there.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::InsufficientSamples`], [`Error::BadVector`],
    /// or I/O failures from mark building and the page store.
    #[instrument(skip(source, marks_cfg, storage_cfg))]
    pub fn build(
        path: &Path,
        source: &mut dyn RowSource,
        marks_cfg: &MarksConfig,
        storage_cfg: &StorageConfig,
        scan_cfg: &ScanConfig,
        options: IndexOptions,
        cancel: &CancellationToken,
    ) -> Result<(Self, BuildStats)> {
        let mut cfg = marks_cfg.clone();
        if let Some(strategy) = options.vamarks {
            cfg.strategy = strategy;
        }

        let marks = marks::build(source, &cfg)?;
        let dim = marks.dim();
        let mut store = PageStore::create(path, storage_cfg.page_size, dim)?;
        let stats = store.build(source, &marks, cancel)?;
        marks.save(&marks_sidecar_path(path))?;

        Ok((
            Self {
                store,
                marks,
                scan_cfg: scan_cfg.clone(),
                strategy: cfg.strategy,
            },
            stats,
        ))
    }

    /// Building an unlogged (empty, crash-unsafe) index is not supported.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::BadQuery`].
    pub fn build_empty(_path: &Path) -> Result<()> {
        Err(Error::BadQuery(
            "unlogged index build is not supported; use build with a row source".into(),
        ))
    }

    /// Opens a previously built index, loading its persisted marks from
    /// the sidecar file written by [`Self::build`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupted`] if the file's magic number, page
    /// layout, or marks attachment is invalid.
    pub fn open(path: &Path, storage_cfg: &StorageConfig, scan_cfg: &ScanConfig) -> Result<Self> {
        let marks = Marks::load(&marks_sidecar_path(path))?;
        let store = PageStore::open(path, storage_cfg.page_size, marks.dim())?;
        Ok(Self {
            store,
            marks,
            scan_cfg: scan_cfg.clone(),
            strategy: MarksStrategy::Equifrequent,
        })
    }

    /// Encodes `vector` and inserts it, unless `is_null` is set. Never
    /// reports uniqueness violations (the index has none).
    ///
    /// # Errors
    ///
    /// Propagates I/O failures from the page store.
    #[instrument(skip(self, vector))]
    pub fn insert(&mut self, vector: Option<&crate::feature::FeatureVector>, heap_tid: HeapTid) -> Result<()> {
        let Some(vector) = vector else {
            return Ok(());
        };
        let apx = crate::codec::encode(vector, &self.marks);
        self.store.insert(heap_tid, apx)
    }

    /// Removes every tuple whose TID `callback` rejects.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires mid-operation.
    pub fn bulk_delete(
        &mut self,
        callback: &mut dyn FnMut(HeapTid) -> bool,
        cancel: &CancellationToken,
    ) -> Result<DeleteStats> {
        self.store.bulk_delete(callback, cancel)
    }

    /// Reclaims space left behind by a prior `bulk_delete`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires mid-operation.
    pub fn vacuum_cleanup(&mut self, cancel: &CancellationToken) -> Result<VacuumStats> {
        self.store.vacuum_cleanup(cancel)
    }

    /// Begins a new scan handle against this index.
    #[must_use]
    pub fn begin_scan(&self, cancel: CancellationToken) -> Scan<'_> {
        Scan::begin(&self.store, &self.marks, cancel)
    }

    /// Binds search keys to `scan`.
    ///
    /// # Errors
    ///
    /// Propagates [`Scan::rescan`]'s state errors.
    pub fn rescan(scan: &mut Scan<'_>, keys: ScanKeys) -> Result<()> {
        scan.rescan(keys)
    }

    /// Ends `scan`, releasing its resources.
    pub fn end_scan(scan: &mut Scan<'_>) {
        scan.end();
    }

    /// Runs `scan`'s candidate-selection pass, returning the candidate
    /// count. The caller is responsible for OR-ing the returned bitmap
    /// into its own result set.
    ///
    /// # Errors
    ///
    /// Propagates [`Scan::get_bitmap`]'s errors.
    pub fn get_bitmap(
        &self,
        scan: &mut Scan<'_>,
        reltuples: u64,
    ) -> Result<(roaring::RoaringTreemap, i64)> {
        scan.get_bitmap(reltuples, &self.scan_cfg)
    }

    /// Estimates planner costs for a query this index would serve.
    ///
    /// Disables the index (sets [`CostEstimate::disabled`]) when: no
    /// limit is specified, an offset is present, the limit exceeds 500
    /// and more than 10% of the table, or the caller disabled vascan.
    /// Equifrequent-strategy indexes are preferred by a small (~1%) cost
    /// discount, reflecting their better worst-case pruning on skewed
    /// data.
    #[must_use]
    pub fn cost_estimate(&self, query: &CostQuery) -> CostEstimate {
        #[allow(clippy::cast_precision_loss)]
        let table_rows = query.table_rows as f64;
        let large_limit_fraction = query
            .limit
            .map(|l| l > 500 && (l as f64) > 0.1 * table_rows)
            .unwrap_or(false);

        let disabled =
            query.limit.is_none() || query.has_offset || large_limit_fraction || query.user_disabled;

        #[allow(clippy::cast_precision_loss)]
        let limit = query.limit.unwrap_or(query.table_rows as usize).max(1) as f64;
        let selectivity = (limit / table_rows.max(1.0)).min(1.0);

        let mut total_cost = table_rows.max(1.0).log2() * limit;
        if self.strategy == MarksStrategy::Equifrequent {
            total_cost *= 0.99;
        }

        CostEstimate {
            startup_cost: 0.0,
            total_cost,
            selectivity,
            correlation: 0.0,
            disabled,
        }
    }

    /// The index can never return a value directly (it stores only
    /// approximations); callers must refine against the base table.
    #[must_use]
    pub const fn can_return() -> bool {
        false
    }

    /// The marks this index was built with.
    #[must_use]
    pub const fn marks(&self) -> &Marks {
        &self.marks
    }
}

/// The sidecar path a built index's marks are persisted to, alongside
/// its page-store file: the "catalog-external slot" of the crate's data
/// model, reduced to a plain file next to the index it describes.
fn marks_sidecar_path(index_path: &Path) -> PathBuf {
    let mut os = index_path.as_os_str().to_owned();
    os.push(".marks");
    PathBuf::from(os)
}

/// Resolves `options.vamarks` against a default config's strategy,
/// matching the precedence the layered configuration uses elsewhere:
/// explicit option beats configured default.
#[must_use]
pub fn resolve_strategy(options: IndexOptions, cfg: &MarksConfig) -> MarksStrategy {
    options.vamarks.unwrap_or(cfg.strategy)
}

/// Resolves the path an index's backing file should live at, given the
/// configured storage directory and the index's logical name.
#[must_use]
pub fn index_file_path(storage_cfg: &StorageConfig, index_name: &str) -> PathBuf {
    Path::new(&storage_cfg.data_dir).join(format!("{index_name}.va"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{FeatureVector, SampleRow};
    use tempfile::tempdir;

    struct VecSource(Vec<SampleRow>);
    impl RowSource for VecSource {
        fn sample_rows(&mut self, limit: usize) -> Result<Vec<SampleRow>> {
            Ok(self
                .0
                .iter()
                .take(limit)
                .map(|r| SampleRow {
                    heap_tid: r.heap_tid,
                    feature: r.feature.clone(),
                })
                .collect())
        }
        fn scan_live_rows(&mut self, on_row: &mut dyn FnMut(SampleRow) -> Result<()>) -> Result<()> {
            for row in self.0.drain(..) {
                on_row(row)?;
            }
            Ok(())
        }
    }

    fn sample_rows(n: u32, dim: usize) -> Vec<SampleRow> {
        (0..n)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let t = f64::from(i) / f64::from(n - 1);
                SampleRow {
                    heap_tid: HeapTid::new(i, 0),
                    feature: Some(FeatureVector::new(vec![t; dim]).unwrap()),
                }
            })
            .collect()
    }

    #[test]
    fn build_then_scan_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx.va");
        let mut source = VecSource(sample_rows(501, 2));
        let marks_cfg = MarksConfig {
            max_partitions: 8,
            min_samples: 256,
            ..MarksConfig::default()
        };
        let storage_cfg = StorageConfig {
            page_size: 512,
            data_dir: dir.path().to_string_lossy().to_string(),
        };
        let scan_cfg = ScanConfig::default();
        let cancel = CancellationToken::new();
        let (index, stats) = VaFileIndex::build(
            &path,
            &mut source,
            &marks_cfg,
            &storage_cfg,
            &scan_cfg,
            IndexOptions::default(),
            &cancel,
        )
        .unwrap();
        assert_eq!(stats.heap_tuples, 501);

        let mut scan = index.begin_scan(CancellationToken::new());
        VaFileIndex::rescan(
            &mut scan,
            ScanKeys {
                query: vec![0.5, 0.5],
                norm: crate::distance::MinkowskiNorm::from_s(2.0).unwrap(),
                weights: None,
                limit: Some(1),
                input_bitmap: None,
            },
        )
        .unwrap();
        let (_bitmap, count) = index.get_bitmap(&mut scan, 501).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn open_after_build_loads_persisted_marks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx.va");
        let mut source = VecSource(sample_rows(300, 2));
        let marks_cfg = MarksConfig {
            max_partitions: 8,
            min_samples: 256,
            ..MarksConfig::default()
        };
        let storage_cfg = StorageConfig {
            page_size: 512,
            data_dir: dir.path().to_string_lossy().to_string(),
        };
        let scan_cfg = ScanConfig::default();
        let cancel = CancellationToken::new();
        let (built, _stats) = VaFileIndex::build(
            &path,
            &mut source,
            &marks_cfg,
            &storage_cfg,
            &scan_cfg,
            IndexOptions::default(),
            &cancel,
        )
        .unwrap();

        let reopened = VaFileIndex::open(&path, &storage_cfg, &scan_cfg).unwrap();
        assert_eq!(reopened.marks(), built.marks());
    }

    #[test]
    fn open_fails_without_marks_sidecar() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("orphan.va");
        let storage_cfg = StorageConfig {
            page_size: 512,
            data_dir: dir.path().to_string_lossy().to_string(),
        };
        let scan_cfg = ScanConfig::default();
        assert!(VaFileIndex::open(&path, &storage_cfg, &scan_cfg).is_err());
    }

    #[test]
    fn build_empty_is_unsupported() {
        let dir = tempdir().unwrap();
        assert!(VaFileIndex::build_empty(&dir.path().join("x.va")).is_err());
    }

    #[test]
    fn cost_estimate_disables_unbounded_queries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx.va");
        let mut source = VecSource(sample_rows(500, 2));
        let marks_cfg = MarksConfig {
            max_partitions: 8,
            min_samples: 256,
            ..MarksConfig::default()
        };
        let storage_cfg = StorageConfig {
            page_size: 512,
            data_dir: dir.path().to_string_lossy().to_string(),
        };
        let scan_cfg = ScanConfig::default();
        let cancel = CancellationToken::new();
        let (index, _stats) = VaFileIndex::build(
            &path,
            &mut source,
            &marks_cfg,
            &storage_cfg,
            &scan_cfg,
            IndexOptions::default(),
            &cancel,
        )
        .unwrap();

        let estimate = index.cost_estimate(&CostQuery {
            limit: None,
            has_offset: false,
            table_rows: 500,
            user_disabled: false,
        });
        assert!(estimate.disabled);

        let estimate = index.cost_estimate(&CostQuery {
            limit: Some(5),
            has_offset: false,
            table_rows: 500,
            user_disabled: false,
        });
        assert!(!estimate.disabled);
    }

    #[test]
    fn can_return_is_always_false() {
        assert!(!VaFileIndex::can_return());
    }
}
