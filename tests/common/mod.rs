//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;

use halberd::postings::{Posting, PostingList};
use halberd::prelude::*;
use halberd::query::TermMatcher;

/// In-memory postings for a handful of whitespace-tokenized documents.
#[derive(Debug, Default)]
pub struct TestIndex {
    lists: HashMap<String, PostingList>,
    pub doc_count: usize,
}

impl TestIndex {
    pub fn new(docs: &[&str]) -> Self {
        let mut index = TestIndex::default();
        for text in docs {
            index.add(text);
        }
        index
    }

    pub fn add(&mut self, text: &str) -> DocId {
        let doc_id = self.doc_count as DocId;
        self.doc_count += 1;
        let mut positions: HashMap<&str, Vec<Position>> = HashMap::new();
        for (position, token) in text.split_whitespace().enumerate() {
            positions.entry(token).or_default().push(position as Position);
        }
        for (token, positions) in positions {
            self.lists
                .entry(token.to_string())
                .or_insert_with(|| PostingList::new(token))
                .add_posting(Posting::with_positions(doc_id, positions));
        }
        doc_id
    }

    /// The posting list of `term`; empty if it never occurs.
    pub fn list(&self, term: &str) -> PostingList {
        self.lists
            .get(term)
            .cloned()
            .unwrap_or_else(|| PostingList::new(term))
    }

    pub fn term(&self, term: &str) -> QueryMatcher {
        QueryMatcher::from(TermMatcher::from_list(&self.list(term)))
    }
}

/// Drain a matcher into its document ids.
pub fn collect<M: Matcher>(matcher: &mut M) -> Result<Vec<DocId>> {
    let mut docs = Vec::new();
    loop {
        let doc = matcher.next_doc()?;
        if doc == NO_MORE_DOCS {
            return Ok(docs);
        }
        docs.push(doc);
    }
}
