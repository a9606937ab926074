//! Page-oriented storage for approximation tuples: the on-disk binary
//! format, fixed-size tuples, and the memory-mapped store that implements
//! build/insert/bulk-delete/vacuum.

mod format;
mod store;
mod tuple;

pub use format::{
    ring_capacity_for, MetaPage, PageTrailer, FLAG_DELETED, FLAG_META, MAGIC, META_BLOCKNO,
};
pub use store::{BuildStats, DeleteStats, PageStore, VacuumStats};
pub use tuple::ApproxTuple;
