//! Okapi BM25. The scorer returns the raw BM25 sum with no sign flip for a
//! max-heap convention (design note, Open Question 1) — callers compare
//! raw scores directly.

/// `idf(t) = ln((N - df(t) + 0.5) / (df(t) + 0.5))`. Deliberately unfloored:
/// the glossary calls out that this may go negative for a term occurring in
/// more than half the corpus, and the scorer must tolerate that rather than
/// clamp it to zero.
pub fn idf(total_docs: u64, doc_freq: u32) -> f32 {
    let n = total_docs as f32;
    let df = doc_freq as f32;
    ((n - df + 0.5) / (df + 0.5)).ln()
}

pub fn term_score(idf: f32, tf: u32, doc_length: u32, avg_doc_length: f32, k1: f32, b: f32) -> f32 {
    let tf = tf as f32;
    let length_norm = 1.0 - b + b * (doc_length as f32 / avg_doc_length.max(1.0));
    idf * (tf * (k1 + 1.0)) / (tf + k1 * length_norm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idf_is_positive_for_rare_terms() {
        assert!(idf(1000, 1) > idf(1000, 500));
    }

    #[test]
    fn score_increases_with_term_frequency() {
        let idf = 2.0;
        let low = term_score(idf, 1, 100, 100.0, 1.2, 0.75);
        let high = term_score(idf, 5, 100, 100.0, 1.2, 0.75);
        assert!(high > low);
    }

    #[test]
    fn score_decreases_with_document_length_above_average() {
        let idf = 2.0;
        let short = term_score(idf, 3, 50, 100.0, 1.2, 0.75);
        let long = term_score(idf, 3, 300, 100.0, 1.2, 0.75);
        assert!(short > long);
    }
}
