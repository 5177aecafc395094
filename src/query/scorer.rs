//! Scoring functions for ranking matched documents.
//!
//! Matchers never compute relevance themselves: a leaf hands `(doc_id, freq)`
//! to a [`Scorer`], combinators add their children's scores up and apply a
//! coordination factor, and a sloppy phrase turns match distances into a
//! frequency through [`Scorer::slop_factor`].

use std::fmt::Debug;
use std::sync::Arc;

use ahash::AHashMap;

use crate::DocId;

/// Trait for per-document scoring functions.
pub trait Scorer: Send + Sync + Debug {
    /// Calculate the score for a document.
    fn score(&self, doc_id: DocId, freq: f32) -> f32;

    /// Contribution of one sloppy phrase match of the given length.
    ///
    /// Exact matches (length 0) contribute the most.
    fn slop_factor(&self, match_length: i32) -> f32 {
        1.0 / (match_length.max(0) as f32 + 1.0)
    }
}

/// BM25 scorer implementation.
#[derive(Debug, Clone)]
pub struct BM25Scorer {
    /// Document frequency of the term.
    doc_freq: u64,
    /// Average field length.
    avg_field_length: f64,
    /// Total number of documents in the index.
    total_docs: u64,
    /// Per-document field lengths; the average is used when absent.
    field_lengths: Option<Arc<AHashMap<DocId, u32>>>,
    /// Boost factor.
    boost: f32,
    /// BM25 k1 parameter.
    k1: f32,
    /// BM25 b parameter.
    b: f32,
}

impl BM25Scorer {
    /// Create a new BM25 scorer.
    pub fn new(doc_freq: u64, avg_field_length: f64, total_docs: u64, boost: f32) -> Self {
        BM25Scorer {
            doc_freq,
            avg_field_length,
            total_docs,
            field_lengths: None,
            boost,
            k1: 1.2,
            b: 0.75,
        }
    }

    /// Create a new BM25 scorer with custom parameters.
    pub fn with_params(
        doc_freq: u64,
        avg_field_length: f64,
        total_docs: u64,
        boost: f32,
        k1: f32,
        b: f32,
    ) -> Self {
        BM25Scorer {
            doc_freq,
            avg_field_length,
            total_docs,
            field_lengths: None,
            boost,
            k1,
            b,
        }
    }

    /// Use actual field lengths for length normalization.
    pub fn with_field_lengths(mut self, field_lengths: Arc<AHashMap<DocId, u32>>) -> Self {
        self.field_lengths = Some(field_lengths);
        self
    }

    /// Calculate the IDF (Inverse Document Frequency) component.
    fn idf(&self) -> f32 {
        if self.doc_freq == 0 || self.total_docs == 0 {
            return 0.0;
        }

        let n = self.total_docs as f32;
        let df = self.doc_freq as f32;

        // IDF = log(1 + (N - df + 0.5) / (df + 0.5)), never negative
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    /// Calculate the TF (Term Frequency) component.
    fn tf(&self, freq: f32, field_length: f32) -> f32 {
        if freq == 0.0 {
            return 0.0;
        }

        let avg_len = self.avg_field_length as f32;
        let norm_factor = if avg_len > 0.0 {
            1.0 - self.b + self.b * (field_length / avg_len)
        } else {
            1.0
        };

        // TF = (tf * (k1 + 1)) / (tf + k1 * norm_factor)
        (freq * (self.k1 + 1.0)) / (freq + self.k1 * norm_factor)
    }

    fn field_length(&self, doc_id: DocId) -> f32 {
        self.field_lengths
            .as_ref()
            .and_then(|lengths| lengths.get(&doc_id))
            .map_or(self.avg_field_length as f32, |&len| len as f32)
    }

    /// Get the boost factor.
    pub fn boost(&self) -> f32 {
        self.boost
    }

    /// Get the k1 parameter.
    pub fn k1(&self) -> f32 {
        self.k1
    }

    /// Get the b parameter.
    pub fn b(&self) -> f32 {
        self.b
    }
}

impl Scorer for BM25Scorer {
    fn score(&self, doc_id: DocId, freq: f32) -> f32 {
        if self.doc_freq == 0 || self.total_docs == 0 {
            return 0.0;
        }

        let tf = self.tf(freq, self.field_length(doc_id));
        self.boost * self.idf() * tf
    }
}

/// A constant scorer that always returns the same score.
#[derive(Debug, Clone)]
pub struct ConstantScorer {
    /// The constant score value.
    score: f32,
    /// The boost factor.
    boost: f32,
}

impl ConstantScorer {
    /// Create a new constant scorer.
    pub fn new(score: f32) -> Self {
        ConstantScorer { score, boost: 1.0 }
    }

    /// Create a new constant scorer with boost.
    pub fn with_boost(score: f32, boost: f32) -> Self {
        ConstantScorer { score, boost }
    }
}

impl Default for ConstantScorer {
    fn default() -> Self {
        ConstantScorer::new(1.0)
    }
}

impl Scorer for ConstantScorer {
    fn score(&self, _doc_id: DocId, _freq: f32) -> f32 {
        self.score * self.boost
    }
}

/// Coordination table for `max_clauses` optional clauses.
///
/// Entry `i` is the factor applied when `i` clauses matched: `i / max_clauses`
/// when enabled, `1.0` everywhere otherwise.
pub fn coord_table(max_clauses: usize, enabled: bool) -> Vec<f32> {
    (0..=max_clauses)
        .map(|overlap| {
            if !enabled || max_clauses == 0 {
                1.0
            } else {
                overlap as f32 / max_clauses as f32
            }
        })
        .collect()
}
