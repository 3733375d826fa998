use serde::{Deserialize, Serialize};

/// Opaque external document identifier (spec: a 6-byte heap tuple id, treated
/// as an opaque 48-bit key with stable equality and total order). We carry it
/// in a `u64` and only ever use the low 48 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocRef(pub u64);

pub const DOC_REF_MASK: u64 = (1u64 << 48) - 1;

impl DocRef {
    pub fn new(raw: u64) -> Self {
        DocRef(raw & DOC_REF_MASK)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for DocRef {
    fn from(raw: u64) -> Self {
        DocRef::new(raw)
    }
}

/// Stable identifier for one index, standing in for the host relation OID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexId(pub u64);

/// A segment is rooted at a logical block number; here we model "blocks" as
/// indices into a page store rather than real filesystem block numbers.
pub type BlockNo = u32;

/// Sentinel meaning "no block" (spec's `InvalidBlockNumber`-equivalent).
pub const NULL_BLOCK: BlockNo = u32::MAX;

/// A `(term, term_frequency)` pair as produced by the external tokenizer.
/// The tokenizer itself is out of scope for this crate (spec §1); this type
/// is the boundary the core accepts documents through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedTerm {
    pub term: String,
    pub tf: u32,
}
