//! A required matcher minus the documents of an excluded matcher.

use crate::error::Result;
use crate::query::QueryMatcher;
use crate::query::boolean::Occur;
use crate::query::matcher::{ChildMatcher, Matcher, Poison};
use crate::query::position::Interval;
use crate::{DocId, NO_MORE_DOCS, Position, UNPOSITIONED};

/// Matches the documents of `required` that `excluded` does not match.
///
/// The excluded child is only advanced up to the required child's candidate
/// documents and is dropped once exhausted.
#[derive(Debug)]
pub struct ReqExclMatcher {
    required: Box<QueryMatcher>,
    excluded: Option<Box<QueryMatcher>>,
    doc: DocId,
    poison: Poison,
}

impl ReqExclMatcher {
    /// Create a new required/excluded matcher.
    pub fn new(required: QueryMatcher, excluded: QueryMatcher) -> Self {
        ReqExclMatcher {
            required: Box::new(required),
            excluded: Some(Box::new(excluded)),
            doc: UNPOSITIONED,
            poison: Poison::default(),
        }
    }

    /// Move forward from the required child's current document to the first
    /// one that is not excluded.
    fn to_non_excluded(&mut self) -> Result<DocId> {
        let mut current = self.required.doc_id();
        while current != NO_MORE_DOCS {
            let Some(excluded) = self.excluded.as_mut() else {
                return Ok(current);
            };
            let mut excluded_doc = excluded.doc_id();
            if excluded_doc < current {
                excluded_doc = excluded.advance(current)?;
                if excluded_doc == NO_MORE_DOCS {
                    self.excluded = None;
                    return Ok(current);
                }
            }
            if excluded_doc > current {
                return Ok(current);
            }
            current = self.required.next_doc()?;
        }
        Ok(NO_MORE_DOCS)
    }
}

impl Matcher for ReqExclMatcher {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        self.poison.check()?;
        debug_assert!(self.doc != NO_MORE_DOCS, "next_doc called after exhaustion");
        let result = self
            .required
            .next_doc()
            .and_then(|_| self.to_non_excluded());
        self.doc = self.poison.track(result)?;
        Ok(self.doc)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.poison.check()?;
        debug_assert!(
            target > self.doc,
            "advance target {} must be beyond current doc {}",
            target,
            self.doc
        );
        let result = self
            .required
            .advance(target)
            .and_then(|_| self.to_non_excluded());
        self.doc = self.poison.track(result)?;
        Ok(self.doc)
    }

    fn cost(&self) -> u64 {
        self.required.cost()
    }

    fn score(&mut self) -> Result<f32> {
        self.required.score()
    }

    fn freq(&mut self) -> Result<f32> {
        self.required.freq()
    }

    fn has_positions(&self) -> bool {
        self.required.has_positions()
    }

    fn next_position(&mut self) -> Result<Position> {
        self.required.next_position()
    }

    fn interval(&self) -> &Interval {
        self.required.interval()
    }

    fn children(&self) -> Vec<ChildMatcher<'_>> {
        let mut children = vec![ChildMatcher::new(&self.required, Occur::Must)];
        if let Some(excluded) = &self.excluded {
            children.push(ChildMatcher::new(excluded, Occur::MustNot));
        }
        children
    }

    fn name(&self) -> &'static str {
        "ReqExcl"
    }
}
