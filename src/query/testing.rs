//! Instrumented postings for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{HalberdError, Result};
use crate::postings::{PostingIterator, PostingList, VecPostingIterator};
use crate::query::QueryMatcher;
use crate::query::scorer::ConstantScorer;
use crate::query::term::TermMatcher;
use crate::{DocId, NO_MORE_DOCS, Position, UNPOSITIONED};

/// Postings that fail once the given document is reached.
#[derive(Debug)]
pub(crate) struct FailingPostings {
    docs: Vec<DocId>,
    index: Option<usize>,
    fail_at: DocId,
}

impl FailingPostings {
    pub(crate) fn new(docs: Vec<DocId>, fail_at: DocId) -> Self {
        FailingPostings {
            docs,
            index: None,
            fail_at,
        }
    }
}

impl PostingIterator for FailingPostings {
    fn doc_id(&self) -> DocId {
        match self.index {
            None => UNPOSITIONED,
            Some(i) => self.docs.get(i).copied().unwrap_or(NO_MORE_DOCS),
        }
    }

    fn next_doc(&mut self) -> Result<DocId> {
        let next = self.index.map_or(0, |i| i + 1);
        if self.docs.get(next) == Some(&self.fail_at) {
            return Err(HalberdError::storage("postings block checksum mismatch"));
        }
        self.index = Some(next);
        Ok(self.doc_id())
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        while self.doc_id() < target {
            self.next_doc()?;
        }
        Ok(self.doc_id())
    }

    fn freq(&self) -> u32 {
        1
    }

    fn next_position(&mut self) -> Result<Position> {
        Ok(0)
    }

    fn cost(&self) -> u64 {
        self.docs.len() as u64
    }
}

/// Postings that count every `next_doc`/`advance` call.
#[derive(Debug)]
pub(crate) struct CountingPostings {
    inner: VecPostingIterator,
    moves: Arc<AtomicUsize>,
}

impl PostingIterator for CountingPostings {
    fn doc_id(&self) -> DocId {
        self.inner.doc_id()
    }

    fn next_doc(&mut self) -> Result<DocId> {
        self.moves.fetch_add(1, Ordering::SeqCst);
        self.inner.next_doc()
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.moves.fetch_add(1, Ordering::SeqCst);
        self.inner.advance(target)
    }

    fn freq(&self) -> u32 {
        self.inner.freq()
    }

    fn next_position(&mut self) -> Result<Position> {
        self.inner.next_position()
    }

    fn has_positions(&self) -> bool {
        self.inner.has_positions()
    }

    fn cost(&self) -> u64 {
        self.inner.cost()
    }
}

/// A term matcher over `list` plus a handle on its move counter.
pub(crate) fn counting_term(list: &PostingList) -> (QueryMatcher, Arc<AtomicUsize>) {
    let moves = Arc::new(AtomicUsize::new(0));
    let postings = CountingPostings {
        inner: list.iterator(),
        moves: Arc::clone(&moves),
    };
    let matcher = TermMatcher::new(
        list.term.clone(),
        Box::new(postings),
        Box::new(ConstantScorer::default()),
    );
    (QueryMatcher::from(matcher), moves)
}

/// A constant-scoring term matcher over `list`.
pub(crate) fn term(list: &PostingList) -> QueryMatcher {
    QueryMatcher::from(TermMatcher::from_list(list))
}

/// A failing term matcher.
pub(crate) fn failing_term(docs: Vec<DocId>, fail_at: DocId) -> QueryMatcher {
    QueryMatcher::from(TermMatcher::new(
        "broken",
        Box::new(FailingPostings::new(docs, fail_at)),
        Box::new(ConstantScorer::default()),
    ))
}

/// Drain `matcher` with `next_doc`.
pub(crate) fn collect_docs<M: crate::query::Matcher + ?Sized>(matcher: &mut M) -> Vec<DocId> {
    let mut docs = Vec::new();
    loop {
        let doc = matcher.next_doc().unwrap();
        if doc == NO_MORE_DOCS {
            break;
        }
        docs.push(doc);
    }
    docs
}
