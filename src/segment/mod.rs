pub mod assemble;
pub mod format;
pub mod reader;
pub mod writer;

pub use format::{dequantize_norm, quantize_norm, DictEntry, PostingEntryOnDisk, SkipEntry};
pub use reader::SegmentReader;
pub use writer::write_segment;
