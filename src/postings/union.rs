//! A posting iterator over the union of several terms.
//!
//! Used for multi-term phrase positions (e.g. `"quick (fox|dog)"`), where one
//! query position is satisfied by any of several terms. Documents are the
//! union of the sub-iterators' documents, and the positions of every
//! sub-iterator on the current document are merged into one sorted stream.

use crate::error::Result;
use crate::postings::iterator::PostingIterator;
use crate::{DocId, NO_MORE_DOCS, NO_MORE_POSITIONS, Position, UNPOSITIONED};

/// One buffered position with its byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct BufferedPosition {
    position: Position,
    start_offset: i32,
    end_offset: i32,
}

/// Union of several posting iterators.
#[derive(Debug)]
pub struct UnionPostingIterator {
    subs: Vec<Box<dyn PostingIterator>>,
    doc: DocId,
    positions: Vec<BufferedPosition>,
    /// Index of the next buffered position to hand out.
    upto: usize,
    cost: u64,
}

impl UnionPostingIterator {
    /// Create a union over `subs`.
    pub fn new(subs: Vec<Box<dyn PostingIterator>>) -> Self {
        let cost = subs.iter().map(|sub| sub.cost()).sum();
        UnionPostingIterator {
            subs,
            doc: UNPOSITIONED,
            positions: Vec::new(),
            upto: 0,
            cost,
        }
    }

    /// Number of sub-iterators.
    pub fn len(&self) -> usize {
        self.subs.len()
    }

    /// Check if this union has no sub-iterators.
    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    /// Settle on the smallest sub doc and buffer the merged positions.
    fn settle(&mut self) -> Result<DocId> {
        self.doc = self
            .subs
            .iter()
            .map(|sub| sub.doc_id())
            .min()
            .unwrap_or(NO_MORE_DOCS);
        self.positions.clear();
        self.upto = 0;
        if self.doc == NO_MORE_DOCS {
            return Ok(self.doc);
        }

        let doc = self.doc;
        for sub in self.subs.iter_mut().filter(|sub| sub.doc_id() == doc) {
            if !sub.has_positions() {
                continue;
            }
            for _ in 0..sub.freq() {
                let position = sub.next_position()?;
                if position == NO_MORE_POSITIONS {
                    break;
                }
                self.positions.push(BufferedPosition {
                    position,
                    start_offset: sub.start_offset(),
                    end_offset: sub.end_offset(),
                });
            }
        }
        self.positions.sort_unstable();
        Ok(self.doc)
    }
}

impl PostingIterator for UnionPostingIterator {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        debug_assert!(self.doc != NO_MORE_DOCS, "next_doc called after exhaustion");
        let current = self.doc;
        for sub in self.subs.iter_mut() {
            if sub.doc_id() <= current {
                sub.next_doc()?;
            }
        }
        self.settle()
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        debug_assert!(target > self.doc, "advance target must be beyond current doc");
        for sub in self.subs.iter_mut() {
            if sub.doc_id() < target {
                sub.advance(target)?;
            }
        }
        self.settle()
    }

    fn freq(&self) -> u32 {
        if self.doc == NO_MORE_DOCS || self.doc == UNPOSITIONED {
            return 0;
        }
        if self.positions.is_empty() {
            // Frequencies without positions still add up.
            return self
                .subs
                .iter()
                .filter(|sub| sub.doc_id() == self.doc)
                .map(|sub| sub.freq())
                .sum();
        }
        self.positions.len() as u32
    }

    fn next_position(&mut self) -> Result<Position> {
        match self.positions.get(self.upto) {
            Some(buffered) => {
                self.upto += 1;
                Ok(buffered.position)
            }
            None => Ok(NO_MORE_POSITIONS),
        }
    }

    fn start_offset(&self) -> i32 {
        self.upto
            .checked_sub(1)
            .and_then(|i| self.positions.get(i))
            .map_or(-1, |buffered| buffered.start_offset)
    }

    fn end_offset(&self) -> i32 {
        self.upto
            .checked_sub(1)
            .and_then(|i| self.positions.get(i))
            .map_or(-1, |buffered| buffered.end_offset)
    }

    fn has_positions(&self) -> bool {
        self.subs.iter().all(|sub| sub.has_positions())
    }

    fn cost(&self) -> u64 {
        self.cost
    }
}
