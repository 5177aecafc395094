//! In-memory posting lists.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::postings::iterator::VecPostingIterator;
use crate::{DocId, Position};

/// A single posting in a posting list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    /// Document ID.
    pub doc_id: DocId,
    /// Term frequency in the document.
    pub frequency: u32,
    /// Positions of the term in the document (for phrase queries).
    pub positions: Option<Vec<Position>>,
    /// Byte offsets `(start, end)` paired with `positions`.
    pub offsets: Option<Vec<(i32, i32)>>,
}

impl Posting {
    /// Create a new posting.
    pub fn new(doc_id: DocId) -> Self {
        Posting {
            doc_id,
            frequency: 1,
            positions: None,
            offsets: None,
        }
    }

    /// Create a posting with frequency.
    pub fn with_frequency(doc_id: DocId, frequency: u32) -> Self {
        Posting {
            doc_id,
            frequency,
            positions: None,
            offsets: None,
        }
    }

    /// Create a posting with positions.
    pub fn with_positions(doc_id: DocId, positions: Vec<Position>) -> Self {
        let frequency = positions.len() as u32;
        Posting {
            doc_id,
            frequency,
            positions: Some(positions),
            offsets: None,
        }
    }

    /// Attach byte offsets, one `(start, end)` pair per position.
    pub fn with_offsets(mut self, offsets: Vec<(i32, i32)>) -> Self {
        debug_assert_eq!(
            offsets.len(),
            self.positions.as_ref().map_or(0, |p| p.len()),
            "one offset pair per position"
        );
        self.offsets = Some(offsets);
        self
    }

    /// Add a position to this posting.
    pub fn add_position(&mut self, position: Position) {
        match &mut self.positions {
            Some(positions) => {
                positions.push(position);
                self.frequency = positions.len() as u32;
            }
            None => {
                self.positions = Some(vec![position]);
                self.frequency = 1;
            }
        }
    }

    /// Get the term frequency.
    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    /// Get positions if available.
    pub fn positions(&self) -> Option<&[Position]> {
        self.positions.as_deref()
    }
}

/// A posting list for a specific term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingList {
    /// The term this posting list represents.
    pub term: String,
    /// The postings in this list, sorted by document id.
    pub postings: Vec<Posting>,
    /// Total frequency across all documents.
    pub total_frequency: u64,
    /// Document frequency (number of documents containing this term).
    pub doc_frequency: u64,
}

impl PostingList {
    /// Create a new empty posting list.
    pub fn new<S: Into<String>>(term: S) -> Self {
        PostingList {
            term: term.into(),
            postings: Vec::new(),
            total_frequency: 0,
            doc_frequency: 0,
        }
    }

    /// Add a posting to this list.
    ///
    /// A posting for a document already in the list replaces the old one.
    pub fn add_posting(&mut self, posting: Posting) {
        match self
            .postings
            .binary_search_by_key(&posting.doc_id, |p| p.doc_id)
        {
            Ok(pos) => {
                self.total_frequency -= self.postings[pos].frequency as u64;
                self.total_frequency += posting.frequency as u64;
                self.postings[pos] = posting;
            }
            Err(pos) => {
                self.total_frequency += posting.frequency as u64;
                self.doc_frequency += 1;
                self.postings.insert(pos, posting);
            }
        }
    }

    /// Build a list from `(doc_id, positions)` pairs.
    pub fn from_positions<S, I>(term: S, docs: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = (DocId, Vec<Position>)>,
    {
        let mut list = PostingList::new(term);
        for (doc_id, positions) in docs {
            list.add_posting(Posting::with_positions(doc_id, positions));
        }
        list
    }

    /// Build a list of frequency-one postings without positions.
    pub fn from_doc_ids<S, I>(term: S, doc_ids: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = DocId>,
    {
        let mut list = PostingList::new(term);
        for doc_id in doc_ids {
            list.add_posting(Posting::new(doc_id));
        }
        list
    }

    /// Number of documents in this list.
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    /// Check if this list has no postings.
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Open an iterator over this list.
    pub fn iterator(&self) -> VecPostingIterator {
        VecPostingIterator::new(Arc::new(self.postings.clone()))
    }
}
