//! Posting iterators.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::Result;
use crate::postings::posting::Posting;
use crate::{DocId, NO_MORE_DOCS, NO_MORE_POSITIONS, Position, UNPOSITIONED};

/// Trait for iterating over the postings of one term.
///
/// This is the interface consumed from the postings collaborator. Document
/// ids follow the same contract as [`Matcher`](crate::query::Matcher):
/// `-1` before the first call, strictly increasing afterwards,
/// [`NO_MORE_DOCS`] once exhausted.
///
/// Positions are read with [`next_position`](PostingIterator::next_position),
/// at most [`freq`](PostingIterator::freq) times per document, in
/// non-decreasing order. Reading past `freq` yields [`NO_MORE_POSITIONS`];
/// reading positions of a term indexed without them is a contract violation.
pub trait PostingIterator: Send + Debug {
    /// Get the current document ID.
    fn doc_id(&self) -> DocId;

    /// Move to the next document.
    fn next_doc(&mut self) -> Result<DocId>;

    /// Skip to the first document >= target.
    fn advance(&mut self, target: DocId) -> Result<DocId>;

    /// Get the term frequency in the current document.
    fn freq(&self) -> u32;

    /// Read the next position in the current document.
    fn next_position(&mut self) -> Result<Position>;

    /// Start byte offset of the last position read, `-1` if not recorded.
    fn start_offset(&self) -> i32 {
        -1
    }

    /// End byte offset of the last position read, `-1` if not recorded.
    fn end_offset(&self) -> i32 {
        -1
    }

    /// Whether positions were indexed for this term.
    fn has_positions(&self) -> bool {
        true
    }

    /// Get the cost of iterating through this posting list.
    fn cost(&self) -> u64;
}

/// A posting iterator over an in-memory, sorted posting vector.
///
/// `advance` uses a binary search over the remaining postings.
#[derive(Debug, Clone)]
pub struct VecPostingIterator {
    /// The posting data.
    postings: Arc<Vec<Posting>>,
    /// Index of the current posting, `None` before the first call.
    cursor: Option<usize>,
    /// Current document ID.
    doc: DocId,
    /// Positions consumed on the current document.
    positions_read: usize,
}

impl VecPostingIterator {
    /// Create a new posting iterator.
    pub fn new(postings: Arc<Vec<Posting>>) -> Self {
        debug_assert!(
            postings.windows(2).all(|w| w[0].doc_id < w[1].doc_id),
            "postings must be sorted by strictly increasing doc id"
        );
        VecPostingIterator {
            postings,
            cursor: None,
            doc: UNPOSITIONED,
            positions_read: 0,
        }
    }

    fn current(&self) -> Option<&Posting> {
        self.cursor.and_then(|i| self.postings.get(i))
    }

    fn position_to(&mut self, index: usize) -> DocId {
        self.cursor = Some(index);
        self.positions_read = 0;
        self.doc = self
            .postings
            .get(index)
            .map_or(NO_MORE_DOCS, |posting| posting.doc_id);
        self.doc
    }
}

impl PostingIterator for VecPostingIterator {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        debug_assert!(self.doc != NO_MORE_DOCS, "next_doc called after exhaustion");
        let next = self.cursor.map_or(0, |i| i + 1);
        Ok(self.position_to(next))
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        debug_assert!(
            target > self.doc,
            "advance target {} must be beyond current doc {}",
            target,
            self.doc
        );
        let start = self.cursor.map_or(0, |i| i + 1).min(self.postings.len());
        let offset = self.postings[start..].partition_point(|p| p.doc_id < target);
        Ok(self.position_to(start + offset))
    }

    fn freq(&self) -> u32 {
        self.current().map_or(0, |posting| posting.frequency)
    }

    fn next_position(&mut self) -> Result<Position> {
        let position = self.current().and_then(|posting| {
            posting
                .positions
                .as_ref()
                .and_then(|positions| positions.get(self.positions_read).copied())
        });
        match position {
            Some(position) => {
                self.positions_read += 1;
                Ok(position)
            }
            None => {
                debug_assert!(
                    self.has_positions() && self.freq() as usize <= self.positions_read,
                    "positions requested from a posting without positions"
                );
                Ok(NO_MORE_POSITIONS)
            }
        }
    }

    fn start_offset(&self) -> i32 {
        self.current()
            .and_then(|posting| posting.offsets.as_ref())
            .and_then(|offsets| offsets.get(self.positions_read.wrapping_sub(1)))
            .map_or(-1, |&(start, _)| start)
    }

    fn end_offset(&self) -> i32 {
        self.current()
            .and_then(|posting| posting.offsets.as_ref())
            .and_then(|offsets| offsets.get(self.positions_read.wrapping_sub(1)))
            .map_or(-1, |&(_, end)| end)
    }

    fn has_positions(&self) -> bool {
        self.postings
            .first()
            .is_none_or(|posting| posting.positions.is_some())
    }

    fn cost(&self) -> u64 {
        self.postings.len() as u64
    }
}
