//! Memory-mapped page store: meta page, free-page ring, and the
//! build/insert/bulk-delete/vacuum operations over fixed-size data pages.
//!
//! Concurrency is expressed at the Rust type level rather than with
//! explicit per-page locks: methods that only read pages take `&self` and
//! may run from any number of threads against a store wrapped in an
//! `Arc<RwLock<PageStore>>` by the embedding host (shared guard); methods
//! that mutate pages take `&mut self` and require the host to hold the
//! write guard, which is the exclusive-lock discipline the historical
//! per-page locks encoded, collapsed onto the borrow checker's
//! exclusivity guarantee.

use std::fs::{File, OpenOptions};
use std::path::Path;

use memmap2::MmapMut;
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::feature::{HeapTid, RowSource};
use crate::marks::Marks;

use super::format::{ring_capacity_for, MetaPage, PageTrailer, FLAG_DELETED, FLAG_META, META_BLOCKNO};
use super::tuple::ApproxTuple;

/// Counts returned by [`PageStore::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuildStats {
    pub heap_tuples: u64,
    pub index_tuples: u64,
}

/// Counts returned by [`PageStore::bulk_delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteStats {
    pub tuples_removed: u64,
    pub num_index_tuples: u64,
}

/// Counts returned by [`PageStore::vacuum_cleanup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VacuumStats {
    pub live_pages: u64,
    pub reclaimed_pages: u64,
}

/// A memory-mapped, page-oriented approximation file.
pub struct PageStore {
    file: File,
    mmap: MmapMut,
    page_size: usize,
    dim: usize,
    ring_capacity: usize,
}

impl PageStore {
    /// Creates a fresh index file at `path` containing only an
    /// initialized meta page. Fails if the file already exists and is
    /// non-empty (the caller's responsibility to ensure a clean build
    /// target, matching `build`'s "fails on non-empty index" contract).
    pub fn create(path: &Path, page_size: usize, dim: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        if file.metadata()?.len() > 0 {
            return Err(Error::BadQuery(
                "index file is not empty; build requires a fresh index".into(),
            ));
        }
        file.set_len(page_size as u64)?;
        let mut mmap = unsafe { MmapMut::map_mut(&file)? };
        let ring_capacity = ring_capacity_for(page_size);
        let meta = MetaPage::new(ring_capacity);
        write_page_trailer(
            &mut mmap[0..page_size],
            &meta.to_bytes(),
            PageTrailer {
                maxoff: 0,
                flags: FLAG_META,
            },
            page_size,
        );
        mmap.flush()?;
        Ok(Self {
            file,
            mmap,
            page_size,
            dim,
            ring_capacity,
        })
    }

    /// Opens an existing index file, validating the meta page's magic
    /// number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupted`] if the magic number does not match or
    /// the file is shorter than one page.
    pub fn open(path: &Path, page_size: usize, dim: usize) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        if len < page_size as u64 {
            return Err(Error::Corrupted("index file shorter than one page".into()));
        }
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        let store = Self {
            file,
            mmap,
            page_size,
            dim,
            ring_capacity: ring_capacity_for(page_size),
        };
        store.read_meta()?;
        Ok(store)
    }

    /// Number of blocks (pages) currently in the file.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.mmap.len() / self.page_size
    }

    fn page(&self, block: usize) -> &[u8] {
        let start = block * self.page_size;
        &self.mmap[start..start + self.page_size]
    }

    fn page_mut(&mut self, block: usize) -> &mut [u8] {
        let start = block * self.page_size;
        &mut self.mmap[start..start + self.page_size]
    }

    fn tuple_byte_len(&self) -> usize {
        ApproxTuple::byte_len(self.dim)
    }

    fn tuples_per_page(&self) -> usize {
        (self.page_size - PageTrailer::BYTE_LEN) / self.tuple_byte_len()
    }

    fn read_meta(&self) -> Result<MetaPage> {
        let page = self.page(META_BLOCKNO as usize);
        MetaPage::from_bytes(page, self.ring_capacity)
    }

    fn write_meta(&mut self, meta: &MetaPage) {
        let page_size = self.page_size;
        let page = self.page_mut(META_BLOCKNO as usize);
        write_page_trailer(
            page,
            &meta.to_bytes(),
            PageTrailer {
                maxoff: 0,
                flags: FLAG_META,
            },
            page_size,
        );
    }

    fn read_trailer(&self, block: usize) -> PageTrailer {
        let page = self.page(block);
        PageTrailer::from_bytes(&page[self.page_size - PageTrailer::BYTE_LEN..])
    }

    fn write_trailer(&mut self, block: usize, trailer: PageTrailer) {
        let page_size = self.page_size;
        let page = self.page_mut(block);
        page[page_size - PageTrailer::BYTE_LEN..].copy_from_slice(&trailer.to_bytes());
    }

    fn read_tuples(&self, block: usize) -> Vec<ApproxTuple> {
        let trailer = self.read_trailer(block);
        let tuple_len = self.tuple_byte_len();
        let page = self.page(block);
        (0..usize::from(trailer.maxoff))
            .map(|i| ApproxTuple::from_bytes(&page[i * tuple_len..(i + 1) * tuple_len], self.dim))
            .collect()
    }

    fn write_tuples(&mut self, block: usize, tuples: &[ApproxTuple]) {
        let tuple_len = self.tuple_byte_len();
        let flags = if tuples.is_empty() { FLAG_DELETED } else { 0 };
        let page_size = self.page_size;
        let page = self.page_mut(block);
        for (i, t) in tuples.iter().enumerate() {
            page[i * tuple_len..(i + 1) * tuple_len].copy_from_slice(&t.to_bytes());
        }
        page[page_size - PageTrailer::BYTE_LEN..].copy_from_slice(
            &PageTrailer {
                #[allow(clippy::cast_possible_truncation)]
                maxoff: tuples.len() as u16,
                flags,
            }
            .to_bytes(),
        );
    }

    /// Extends the file by one page, remapping it, and returns the new
    /// block number.
    fn grow_by_one_page(&mut self) -> Result<u32> {
        self.mmap.flush()?;
        let new_len = (self.block_count() + 1) as u64 * self.page_size as u64;
        self.file.set_len(new_len)?;
        self.mmap = unsafe { MmapMut::map_mut(&self.file)? };
        #[allow(clippy::cast_possible_truncation)]
        let new_block = (self.block_count() - 1) as u32;
        self.write_tuples(new_block as usize, &[]);
        Ok(new_block)
    }

    /// Builds the index from scratch: allocates the meta page (already
    /// done by [`Self::create`]), invokes the mark builder's output
    /// `marks`, then scans every live row from `source`, encoding and
    /// appending its approximation.
    ///
    /// # Errors
    ///
    /// Propagates I/O and row-source errors; returns [`Error::Cancelled`]
    /// if `cancel` fires between pages.
    pub fn build(
        &mut self,
        source: &mut dyn RowSource,
        marks: &Marks,
        cancel: &CancellationToken,
    ) -> Result<BuildStats> {
        let mut stats = BuildStats::default();
        let mut pending: Vec<ApproxTuple> = Vec::new();
        let per_page = self.tuples_per_page();

        source.scan_live_rows(&mut |row| {
            cancel.check()?;
            stats.heap_tuples += 1;
            let Some(feature) = row.feature.as_ref() else {
                return Ok(());
            };
            let apx = crate::codec::encode(feature, marks);
            pending.push(ApproxTuple {
                heap_tid: row.heap_tid,
                apx,
            });
            stats.index_tuples += 1;

            if pending.len() == per_page {
                let block = self.grow_by_one_page()?;
                self.write_tuples(block as usize, &pending);
                pending.clear();
            }
            Ok(())
        })?;

        if !pending.is_empty() {
            let block = self.grow_by_one_page()?;
            self.write_tuples(block as usize, &pending);
        }

        self.mmap.flush()?;
        info!(
            heap_tuples = stats.heap_tuples,
            index_tuples = stats.index_tuples,
            "vafile build complete"
        );
        Ok(stats)
    }

    /// Encodes `feature` against the index's persisted `marks` and
    /// inserts it, consulting the free-page ring first and falling back
    /// to a freshly allocated page.
    pub fn insert(&mut self, heap_tid: HeapTid, apx: Vec<u8>) -> Result<()> {
        let tuple = ApproxTuple { heap_tid, apx };
        let mut meta = self.read_meta()?;
        let per_page = self.tuples_per_page();

        loop {
            let Some(block) = meta.ring_front() else {
                let block = self.grow_by_one_page()?;
                self.write_tuples(block as usize, std::slice::from_ref(&tuple));
                meta.ring_push(block);
                meta.n_changes += 1;
                self.write_meta(&meta);
                self.mmap.flush()?;
                return Ok(());
            };

            let mut tuples = self.read_tuples(block as usize);
            if tuples.len() < per_page {
                tuples.push(tuple);
                let still_has_room = tuples.len() < per_page;
                self.write_tuples(block as usize, &tuples);
                if !still_has_room {
                    meta.ring_pop_front();
                }
                meta.n_changes += 1;
                self.write_meta(&meta);
                self.mmap.flush()?;
                debug!(block, "inserted approximation tuple");
                return Ok(());
            }

            meta.ring_pop_front();
        }
    }

    /// Removes every tuple whose TID `should_delete` accepts, compacting
    /// each affected page in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires between pages.
    pub fn bulk_delete(
        &mut self,
        should_delete: &mut dyn FnMut(HeapTid) -> bool,
        cancel: &CancellationToken,
    ) -> Result<DeleteStats> {
        let mut stats = DeleteStats::default();
        let mut meta = self.read_meta()?;
        meta.ring_clear();
        let per_page = self.tuples_per_page();
        let blocks = self.block_count();

        for block in 1..blocks {
            cancel.check()?;
            let trailer = self.read_trailer(block);
            if trailer.is_deleted() || trailer.is_meta() {
                continue;
            }
            let tuples = self.read_tuples(block);
            let before = tuples.len();
            let survivors: Vec<ApproxTuple> = tuples
                .into_iter()
                .filter(|t| !should_delete(t.heap_tid))
                .collect();
            stats.tuples_removed += (before - survivors.len()) as u64;
            stats.num_index_tuples += survivors.len() as u64;

            let has_room = survivors.len() < per_page;
            self.write_tuples(block, &survivors);
            if has_room && !survivors.is_empty() {
                #[allow(clippy::cast_possible_truncation)]
                meta.ring_push(block as u32);
            }
        }

        self.write_meta(&meta);
        self.mmap.flush()?;
        info!(
            tuples_removed = stats.tuples_removed,
            num_index_tuples = stats.num_index_tuples,
            "vafile bulk delete complete"
        );
        Ok(stats)
    }

    /// Recomputes live-tuple totals, returns fully deleted pages to the
    /// free-page ring bookkeeping, and truncates trailing deleted pages
    /// from the file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires between pages.
    pub fn vacuum_cleanup(&mut self, cancel: &CancellationToken) -> Result<VacuumStats> {
        let mut stats = VacuumStats::default();
        let blocks = self.block_count();
        let mut last_live = 0usize;

        for block in 1..blocks {
            cancel.check()?;
            let trailer = self.read_trailer(block);
            if trailer.is_deleted() {
                stats.reclaimed_pages += 1;
            } else {
                stats.live_pages += 1;
                last_live = block;
            }
        }

        if last_live + 1 < blocks {
            self.mmap.flush()?;
            let new_len = (last_live + 1) as u64 * self.page_size as u64;
            self.file.set_len(new_len)?;
            self.mmap = unsafe { MmapMut::map_mut(&self.file)? };
        }

        info!(
            live_pages = stats.live_pages,
            reclaimed_pages = stats.reclaimed_pages,
            "vafile vacuum complete"
        );
        Ok(stats)
    }

    /// Whether the index should be treated as stale given `reltuples`
    /// live base-table rows, per the configured thresholds.
    #[must_use]
    pub fn is_stale(&self, reltuples: u64, changes_threshold: u32, fraction_threshold: f64) -> bool {
        match self.read_meta() {
            Ok(meta) => meta.is_stale(reltuples, changes_threshold, fraction_threshold),
            Err(_) => false,
        }
    }

    /// Invokes `visit` once per live tuple in page order, honoring
    /// `cancel` between pages. Used by the scan's candidate-selection
    /// pass; never dereferences base-table rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupted`] if the meta page is unreadable, or
    /// [`Error::Cancelled`] if `cancel` fires between pages.
    pub fn for_each_live_tuple(
        &self,
        cancel: &CancellationToken,
        mut visit: impl FnMut(&ApproxTuple),
    ) -> Result<()> {
        self.read_meta()?;
        let blocks = self.block_count();
        for block in 1..blocks {
            cancel.check()?;
            let trailer = self.read_trailer(block);
            if trailer.is_deleted() || trailer.is_meta() {
                continue;
            }
            debug!(block, "scanning page");
            for tuple in self.read_tuples(block) {
                visit(&tuple);
            }
        }
        Ok(())
    }

    /// Warns (without failing the scan) if the index looks stale.
    pub fn warn_if_stale(&self, reltuples: u64, changes_threshold: u32, fraction_threshold: f64) {
        if self.is_stale(reltuples, changes_threshold, fraction_threshold) {
            warn!(reltuples, "vafile index is stale; consider a rebuild");
        }
    }
}

fn write_page_trailer(page: &mut [u8], header_bytes: &[u8], trailer: PageTrailer, page_size: usize) {
    page[..header_bytes.len()].copy_from_slice(header_bytes);
    page[page_size - PageTrailer::BYTE_LEN..].copy_from_slice(&trailer.to_bytes());
}
