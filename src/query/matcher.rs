//! The document iterator contract shared by every matcher.

use std::fmt::Debug;

use crate::error::{HalberdError, Result};
use crate::query::QueryMatcher;
use crate::query::boolean::Occur;
use crate::query::position::Interval;
use crate::{DocId, NO_MORE_DOCS, NO_MORE_POSITIONS, Position, UNPOSITIONED};

static NO_INTERVAL: Interval = Interval::EMPTY;

/// Trait for document matchers.
///
/// A matcher walks the documents it matches in strictly increasing id order.
/// [`doc_id`](Matcher::doc_id) is `-1` before the first
/// [`next_doc`](Matcher::next_doc)/[`advance`](Matcher::advance) call and
/// [`NO_MORE_DOCS`] once exhausted; neither may be called after exhaustion.
///
/// `score`, `freq` and the position methods are only meaningful while the
/// matcher sits on a real document.
///
/// Once a call fails the matcher is poisoned: later `next_doc`, `advance`
/// and `next_position` calls return [`HalberdError::Poisoned`].
pub trait Matcher: Send + Debug {
    /// Get the current document ID.
    fn doc_id(&self) -> DocId;

    /// Move to the next matching document.
    fn next_doc(&mut self) -> Result<DocId>;

    /// Skip to the first matching document >= target.
    ///
    /// `target` must be greater than the current document.
    fn advance(&mut self, target: DocId) -> Result<DocId> {
        slow_advance(self, target)
    }

    /// Get the cost of iterating through this matcher.
    fn cost(&self) -> u64;

    /// Relevance of the current document.
    fn score(&mut self) -> Result<f32>;

    /// Frequency of the match on the current document.
    fn freq(&mut self) -> Result<f32>;

    /// Whether this matcher can produce positions.
    fn has_positions(&self) -> bool {
        false
    }

    /// Read the start of the next matching interval on the current document.
    ///
    /// Returns [`NO_MORE_POSITIONS`] once the document's intervals are used up.
    fn next_position(&mut self) -> Result<Position> {
        debug_assert!(
            self.has_positions(),
            "{} matcher does not produce positions",
            self.name()
        );
        Ok(NO_MORE_POSITIONS)
    }

    /// The interval found by the last `next_position` call.
    fn interval(&self) -> &Interval {
        &NO_INTERVAL
    }

    /// Immediate sub-matchers and how they take part in the match.
    fn children(&self) -> Vec<ChildMatcher<'_>> {
        Vec::new()
    }

    /// Short name of the matcher kind.
    fn name(&self) -> &'static str;

    /// Check if this matcher is exhausted.
    fn is_exhausted(&self) -> bool {
        self.doc_id() == NO_MORE_DOCS
    }
}

/// Advance by calling `next_doc` until reaching `target`.
pub fn slow_advance<M: Matcher + ?Sized>(matcher: &mut M, target: DocId) -> Result<DocId> {
    debug_assert!(
        target > matcher.doc_id(),
        "advance target {} must be beyond current doc {}",
        target,
        matcher.doc_id()
    );
    let mut doc = matcher.doc_id();
    while doc < target {
        doc = matcher.next_doc()?;
    }
    Ok(doc)
}

/// A sub-matcher together with its role in the parent.
#[derive(Debug, Clone, Copy)]
pub struct ChildMatcher<'a> {
    /// The child.
    pub matcher: &'a QueryMatcher,
    /// How the child takes part in the parent's match.
    pub occur: Occur,
}

impl<'a> ChildMatcher<'a> {
    /// Create a new child entry.
    pub fn new(matcher: &'a QueryMatcher, occur: Occur) -> Self {
        ChildMatcher { matcher, occur }
    }

    /// The role as a string: `"MUST"`, `"SHOULD"` or `"MUST_NOT"`.
    pub fn relationship(&self) -> &'static str {
        self.occur.as_str()
    }
}

/// Remembers the first failure of a matcher.
#[derive(Debug, Default, Clone)]
pub(crate) struct Poison {
    cause: Option<String>,
}

impl Poison {
    /// Fail if an earlier call already failed.
    pub(crate) fn check(&self) -> Result<()> {
        match &self.cause {
            Some(cause) => Err(HalberdError::poisoned(cause.clone())),
            None => Ok(()),
        }
    }

    /// Pass `result` through, recording it if it is an error.
    pub(crate) fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result
            && self.cause.is_none()
        {
            self.cause = Some(err.to_string());
        }
        result
    }

    #[cfg(test)]
    pub(crate) fn is_poisoned(&self) -> bool {
        self.cause.is_some()
    }
}

/// A matcher that matches no documents.
#[derive(Debug)]
pub struct EmptyMatcher {
    doc: DocId,
}

impl EmptyMatcher {
    /// Create a new empty matcher.
    pub fn new() -> Self {
        EmptyMatcher { doc: UNPOSITIONED }
    }
}

impl Default for EmptyMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Matcher for EmptyMatcher {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        self.doc = NO_MORE_DOCS;
        Ok(self.doc)
    }

    fn advance(&mut self, _target: DocId) -> Result<DocId> {
        self.doc = NO_MORE_DOCS;
        Ok(self.doc)
    }

    fn cost(&self) -> u64 {
        0
    }

    fn score(&mut self) -> Result<f32> {
        Ok(0.0)
    }

    fn freq(&mut self) -> Result<f32> {
        Ok(0.0)
    }

    fn name(&self) -> &'static str {
        "Empty"
    }
}
