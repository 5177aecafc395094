//! Leaf matcher over the postings of a single term.

use crate::error::Result;
use crate::postings::{PostingIterator, PostingList};
use crate::query::matcher::{Matcher, Poison};
use crate::query::position::Interval;
use crate::query::scorer::{ConstantScorer, Scorer};
use crate::{DocId, NO_MORE_DOCS, NO_MORE_POSITIONS, Position};

/// A matcher that yields the documents containing one term.
///
/// Document iteration is delegated to the postings; scoring to a pluggable
/// [`Scorer`] fed with the term frequency.
#[derive(Debug)]
pub struct TermMatcher {
    /// The term this matcher reads postings for.
    term: String,
    postings: Box<dyn PostingIterator>,
    scorer: Box<dyn Scorer>,
    /// Positions not yet read on the current document.
    positions_left: u32,
    interval: Interval,
    poison: Poison,
}

impl TermMatcher {
    /// Create a new term matcher.
    pub fn new<T: Into<String>>(
        term: T,
        postings: Box<dyn PostingIterator>,
        scorer: Box<dyn Scorer>,
    ) -> Self {
        TermMatcher {
            term: term.into(),
            postings,
            scorer,
            positions_left: 0,
            interval: Interval::EMPTY,
            poison: Poison::default(),
        }
    }

    /// Create a constant-scoring matcher over an in-memory posting list.
    pub fn from_list(list: &PostingList) -> Self {
        TermMatcher::new(
            list.term.clone(),
            Box::new(list.iterator()),
            Box::new(ConstantScorer::default()),
        )
    }

    /// Replace the scorer.
    pub fn with_scorer(mut self, scorer: Box<dyn Scorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Get the term.
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Occurrences of the term in the current document.
    pub fn frequency(&self) -> u32 {
        self.postings.freq()
    }

    fn on_document(&mut self, doc: DocId) -> DocId {
        self.positions_left = if doc == NO_MORE_DOCS {
            0
        } else {
            self.postings.freq()
        };
        self.interval.reset();
        doc
    }
}

impl Matcher for TermMatcher {
    fn doc_id(&self) -> DocId {
        self.postings.doc_id()
    }

    fn next_doc(&mut self) -> Result<DocId> {
        self.poison.check()?;
        let result = self.postings.next_doc();
        let doc = self.poison.track(result)?;
        Ok(self.on_document(doc))
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.poison.check()?;
        let result = self.postings.advance(target);
        let doc = self.poison.track(result)?;
        Ok(self.on_document(doc))
    }

    fn cost(&self) -> u64 {
        self.postings.cost()
    }

    fn score(&mut self) -> Result<f32> {
        let freq = self.postings.freq() as f32;
        Ok(self.scorer.score(self.postings.doc_id(), freq))
    }

    fn freq(&mut self) -> Result<f32> {
        Ok(self.postings.freq() as f32)
    }

    fn has_positions(&self) -> bool {
        self.postings.has_positions()
    }

    fn next_position(&mut self) -> Result<Position> {
        self.poison.check()?;
        debug_assert!(
            self.postings.has_positions(),
            "term {:?} was indexed without positions",
            self.term
        );
        if self.positions_left == 0 || !self.postings.has_positions() {
            self.interval.set_maximum();
            return Ok(NO_MORE_POSITIONS);
        }
        self.positions_left -= 1;
        let result = self.postings.next_position();
        let position = self.poison.track(result)?;
        if position == NO_MORE_POSITIONS {
            self.positions_left = 0;
            self.interval.set_maximum();
        } else {
            self.interval = Interval::new(
                position,
                position,
                self.postings.start_offset(),
                self.postings.end_offset(),
            );
        }
        Ok(position)
    }

    fn interval(&self) -> &Interval {
        &self.interval
    }

    fn name(&self) -> &'static str {
        "Term"
    }
}
