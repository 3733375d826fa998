pub mod bm25;
pub mod bmw;

pub use bmw::{top_k, top_k_with_stats};
