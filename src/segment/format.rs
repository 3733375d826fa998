//! On-disk segment byte layouts (spec §6.2–§6.5).
//!
//! Encoding is hand-rolled (`to_le_bytes`/`from_le_bytes`) rather than
//! `bincode`-derived: the spec fixes exact field widths and alignment for
//! these records, which a generic serializer doesn't guarantee.

use crate::core::types::BlockNo;

pub const SEGMENT_MAGIC: u32 = 0x5450_5347; // "TPSG"
pub const SEGMENT_VERSION: u32 = 1;

/// Dictionary entry: fixed 32 bytes, 8-byte aligned (spec §6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictEntry {
    pub term_hash: u32,
    pub string_offset: u32,
    pub string_len: u32,
    pub posting_offset: u32,
    pub skip_index_offset: u32,
    pub block_count: u16,
    pub doc_freq: u32,
    pub reserved: u16,
}

pub const DICT_ENTRY_SIZE: usize = 32;

impl DictEntry {
    pub fn to_bytes(&self) -> [u8; DICT_ENTRY_SIZE] {
        let mut buf = [0u8; DICT_ENTRY_SIZE];
        buf[0..4].copy_from_slice(&self.term_hash.to_le_bytes());
        buf[4..8].copy_from_slice(&self.string_offset.to_le_bytes());
        buf[8..12].copy_from_slice(&self.string_len.to_le_bytes());
        buf[12..16].copy_from_slice(&self.posting_offset.to_le_bytes());
        buf[16..20].copy_from_slice(&self.skip_index_offset.to_le_bytes());
        buf[20..22].copy_from_slice(&self.block_count.to_le_bytes());
        buf[22..26].copy_from_slice(&self.doc_freq.to_le_bytes());
        buf[26..28].copy_from_slice(&self.reserved.to_le_bytes());
        // 28..32 padding to keep the record 8-byte aligned.
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        DictEntry {
            term_hash: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            string_offset: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            string_len: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            posting_offset: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            skip_index_offset: u32::from_le_bytes(buf[16..20].try_into().unwrap()),
            block_count: u16::from_le_bytes(buf[20..22].try_into().unwrap()),
            doc_freq: u32::from_le_bytes(buf[22..26].try_into().unwrap()),
            reserved: u16::from_le_bytes(buf[26..28].try_into().unwrap()),
        }
    }
}

/// Skip entry, one per posting block (spec §6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipEntry {
    pub first_doc_id: u32,
    pub last_doc_id: u32,
    pub doc_count: u16,
    pub block_max_tf: u16,
    pub block_min_norm: u8,
    pub posting_offset: u32,
}

pub const SKIP_ENTRY_SIZE: usize = 4 + 4 + 2 + 2 + 1 + 4;

impl SkipEntry {
    pub fn to_bytes(&self) -> [u8; SKIP_ENTRY_SIZE] {
        let mut buf = [0u8; SKIP_ENTRY_SIZE];
        buf[0..4].copy_from_slice(&self.first_doc_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.last_doc_id.to_le_bytes());
        buf[8..10].copy_from_slice(&self.doc_count.to_le_bytes());
        buf[10..12].copy_from_slice(&self.block_max_tf.to_le_bytes());
        buf[12] = self.block_min_norm;
        buf[13..17].copy_from_slice(&self.posting_offset.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        SkipEntry {
            first_doc_id: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            last_doc_id: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            doc_count: u16::from_le_bytes(buf[8..10].try_into().unwrap()),
            block_max_tf: u16::from_le_bytes(buf[10..12].try_into().unwrap()),
            block_min_norm: buf[12],
            posting_offset: u32::from_le_bytes(buf[13..17].try_into().unwrap()),
        }
    }
}

/// Posting entry, packed, within a block (spec §6.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingEntryOnDisk {
    pub doc_id: u32,
    pub frequency: u16,
}

pub const POSTING_ENTRY_SIZE: usize = 6;

impl PostingEntryOnDisk {
    pub fn to_bytes(&self) -> [u8; POSTING_ENTRY_SIZE] {
        let mut buf = [0u8; POSTING_ENTRY_SIZE];
        buf[0..4].copy_from_slice(&self.doc_id.to_le_bytes());
        buf[4..6].copy_from_slice(&self.frequency.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        PostingEntryOnDisk {
            doc_id: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            frequency: u16::from_le_bytes(buf[4..6].try_into().unwrap()),
        }
    }
}

/// Doc-ref table entry. The spec leaves this entry's on-disk width
/// unspecified (unlike the dictionary/skip/posting records); we use a plain
/// 8-byte little-endian value rather than the host's packed 6-byte
/// `ItemPointerData`, which simplifies `doc_id * 8` addressing at no cost to
/// the semantics (`doc_ref` is still treated as an opaque 48-bit key).
pub const DOC_REF_ENTRY_SIZE: usize = 8;

/// SmallFloat field-norm quantization (spec §4.4 step 2):
/// `norm = (1 + mantissa/8) * 2^exponent`, `mantissa in [0,7]`,
/// `exponent in [0,31]`, packed into one byte as `exponent << 3 | mantissa`.
///
/// `quantize` always rounds *down*, so `dequantize(quantize(l)) <= l` for
/// all `l` — required so a block's `block_min_norm` (the quantized byte of
/// the block's shortest document) decodes to a value that is still a true
/// lower bound on every raw length in the block (invariant 9 /
/// `bmw_block_max` soundness).
pub fn quantize_norm(doc_length: u32) -> u8 {
    if doc_length <= 1 {
        return 0; // exponent=0, mantissa=0 => value 1
    }
    let l = doc_length as f64;
    let exponent = l.log2().floor().clamp(0.0, 31.0) as i32;
    let base = (exponent as f64).exp2();
    let mantissa = (((l / base) - 1.0) * 8.0).floor().clamp(0.0, 7.0) as u8;
    ((exponent as u8) << 3) | mantissa
}

pub fn dequantize_norm(byte: u8) -> u32 {
    let exponent = (byte >> 3) as i32;
    let mantissa = (byte & 0x7) as f64;
    let value = (1.0 + mantissa / 8.0) * (exponent as f64).exp2();
    value.floor() as u32
}

/// Non-cryptographic 32-bit hash used to short-circuit dictionary probes
/// (spec §6.3). FNV-1a, same construction used by the interning table.
pub fn term_hash32(term: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for &b in term.as_bytes() {
        hash ^= b as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Segment root-page header (spec §6.2). The page-map itself is handled by
/// `segment::writer`/`segment::reader`, not stored inline in this struct.
#[derive(Debug, Clone, Copy)]
pub struct SegmentHeader {
    pub magic: u32,
    pub version: u32,
    pub num_terms: u32,
    pub num_docs: u32,
    pub total_doc_length: u64,
    pub strings_offset: u32,
    pub strings_size: u32,
    pub dict_offset: u32,
    pub dict_size: u32,
    pub skip_offset: u32,
    pub skip_size: u32,
    pub postings_offset: u32,
    pub postings_size: u32,
    pub fieldnorms_offset: u32,
    pub fieldnorms_size: u32,
    pub docrefs_offset: u32,
    pub docrefs_size: u32,
    pub next_segment: BlockNo,
    pub level: u32,
    pub created_at_unix: i64,
    pub data_pages: u32,
    pub inline_page_map_count: u32,
    pub page_map_overflow: BlockNo,
}

pub const SEGMENT_HEADER_SIZE: usize = 4 * 2 // magic, version
    + 4 * 2 // num_terms, num_docs
    + 8 // total_doc_length
    + 4 * 2 * 6 // 6 (offset,size) pairs
    + 4 // next_segment
    + 4 // level
    + 8 // created_at
    + 4 // data_pages
    + 4 // inline_page_map_count
    + 4; // page_map_overflow

impl SegmentHeader {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(SEGMENT_HEADER_SIZE);
        buf.extend_from_slice(&self.magic.to_le_bytes());
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.num_terms.to_le_bytes());
        buf.extend_from_slice(&self.num_docs.to_le_bytes());
        buf.extend_from_slice(&self.total_doc_length.to_le_bytes());
        for (offset, size) in [
            (self.strings_offset, self.strings_size),
            (self.dict_offset, self.dict_size),
            (self.skip_offset, self.skip_size),
            (self.postings_offset, self.postings_size),
            (self.fieldnorms_offset, self.fieldnorms_size),
            (self.docrefs_offset, self.docrefs_size),
        ] {
            buf.extend_from_slice(&offset.to_le_bytes());
            buf.extend_from_slice(&size.to_le_bytes());
        }
        buf.extend_from_slice(&self.next_segment.to_le_bytes());
        buf.extend_from_slice(&self.level.to_le_bytes());
        buf.extend_from_slice(&self.created_at_unix.to_le_bytes());
        buf.extend_from_slice(&self.data_pages.to_le_bytes());
        buf.extend_from_slice(&self.inline_page_map_count.to_le_bytes());
        buf.extend_from_slice(&self.page_map_overflow.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> crate::core::error::Result<Self> {
        use crate::core::error::Error;
        if buf.len() < SEGMENT_HEADER_SIZE {
            return Err(Error::corrupt("segment header truncated"));
        }
        let mut p = 0usize;
        let mut next_u32 = || {
            let v = u32::from_le_bytes(buf[p..p + 4].try_into().unwrap());
            p += 4;
            v
        };
        let magic = next_u32();
        let version = next_u32();
        let num_terms = next_u32();
        let num_docs = next_u32();
        let total_doc_length = u64::from_le_bytes(buf[p..p + 8].try_into().unwrap());
        p += 8;
        let mut pairs = [(0u32, 0u32); 6];
        for pair in &mut pairs {
            let offset = next_u32();
            let size = next_u32();
            *pair = (offset, size);
        }
        let next_segment = next_u32();
        let level = next_u32();
        let created_at_unix = i64::from_le_bytes(buf[p..p + 8].try_into().unwrap());
        p += 8;
        let data_pages = next_u32();
        let inline_page_map_count = next_u32();
        let page_map_overflow = next_u32();

        if magic != SEGMENT_MAGIC {
            return Err(Error::corrupt(format!("segment magic mismatch: {magic:#x}")));
        }
        if version != SEGMENT_VERSION {
            return Err(Error::corrupt(format!("segment version mismatch: {version}")));
        }

        Ok(SegmentHeader {
            magic,
            version,
            num_terms,
            num_docs,
            total_doc_length,
            strings_offset: pairs[0].0,
            strings_size: pairs[0].1,
            dict_offset: pairs[1].0,
            dict_size: pairs[1].1,
            skip_offset: pairs[2].0,
            skip_size: pairs[2].1,
            postings_offset: pairs[3].0,
            postings_size: pairs[3].1,
            fieldnorms_offset: pairs[4].0,
            fieldnorms_size: pairs[4].1,
            docrefs_offset: pairs[5].0,
            docrefs_size: pairs[5].1,
            next_segment,
            level,
            created_at_unix,
            data_pages,
            inline_page_map_count,
            page_map_overflow,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn norm_quantization_is_monotone() {
        let mut prev = dequantize_norm(quantize_norm(0));
        for l in 1..5000u32 {
            let cur = dequantize_norm(quantize_norm(l));
            assert!(cur >= prev, "monotonicity violated at {l}: {cur} < {prev}");
            assert!(cur as u32 <= l, "quantize overestimated length at {l}: got {cur}");
            prev = cur;
        }
    }

    #[test]
    fn dict_entry_round_trips() {
        let e = DictEntry {
            term_hash: 0xAABBCCDD,
            string_offset: 10,
            string_len: 5,
            posting_offset: 100,
            skip_index_offset: 50,
            block_count: 3,
            doc_freq: 42,
            reserved: 0,
        };
        let bytes = e.to_bytes();
        assert_eq!(bytes.len(), DICT_ENTRY_SIZE);
        assert_eq!(DictEntry::from_bytes(&bytes), e);
    }

    #[test]
    fn segment_header_round_trips() {
        let h = SegmentHeader {
            magic: SEGMENT_MAGIC,
            version: SEGMENT_VERSION,
            num_terms: 3,
            num_docs: 10,
            total_doc_length: 123,
            strings_offset: 0,
            strings_size: 10,
            dict_offset: 10,
            dict_size: 96,
            skip_offset: 106,
            skip_size: 17,
            postings_offset: 123,
            postings_size: 60,
            fieldnorms_offset: 183,
            fieldnorms_size: 10,
            docrefs_offset: 193,
            docrefs_size: 80,
            next_segment: 7,
            level: 1,
            created_at_unix: 1_700_000_000,
            data_pages: 4,
            inline_page_map_count: 4,
            page_map_overflow: crate::core::types::NULL_BLOCK,
        };
        let bytes = h.to_bytes();
        let back = SegmentHeader::from_bytes(&bytes).unwrap();
        assert_eq!(back.num_docs, h.num_docs);
        assert_eq!(back.next_segment, h.next_segment);
        assert_eq!(back.docrefs_offset, h.docrefs_offset);
    }
}
