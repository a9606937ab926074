//! Fixed-size approximation tuples: a heap TID plus a `D`-byte cell index
//! array, tightly packed on data pages.

use crate::feature::HeapTid;

/// One stored approximation: `heap_tid` plus `apx[0..D]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApproxTuple {
    pub heap_tid: HeapTid,
    pub apx: Vec<u8>,
}

impl ApproxTuple {
    /// Size in bytes of a tuple for dimensionality `d`: `6 + d`.
    #[must_use]
    pub const fn byte_len(d: usize) -> usize {
        6 + d
    }

    pub(super) fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::byte_len(self.apx.len()));
        out.extend_from_slice(&self.heap_tid.to_bytes());
        out.extend_from_slice(&self.apx);
        out
    }

    pub(super) fn from_bytes(bytes: &[u8], d: usize) -> Self {
        let tid_bytes: [u8; 6] = bytes[0..6].try_into().expect("6 bytes");
        Self {
            heap_tid: HeapTid::from_bytes(tid_bytes),
            apx: bytes[6..6 + d].to_vec(),
        }
    }
}
