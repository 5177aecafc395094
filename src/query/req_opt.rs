//! A required matcher with an optional matcher that only adds to the score.

use crate::error::Result;
use crate::query::QueryMatcher;
use crate::query::boolean::Occur;
use crate::query::matcher::{ChildMatcher, Matcher};
use crate::query::position::Interval;
use crate::{DocId, NO_MORE_DOCS, Position};

/// Matches the documents of `required`; `optional` only contributes score.
///
/// The optional child is advanced lazily from [`score`](Matcher::score) and
/// [`freq`](Matcher::freq), never while iterating documents. Once it is
/// exhausted it is dropped.
#[derive(Debug)]
pub struct ReqOptMatcher {
    required: Box<QueryMatcher>,
    optional: Option<Box<QueryMatcher>>,
}

impl ReqOptMatcher {
    /// Create a new required/optional matcher.
    pub fn new(required: QueryMatcher, optional: QueryMatcher) -> Self {
        ReqOptMatcher {
            required: Box::new(required),
            optional: Some(Box::new(optional)),
        }
    }

    /// Whether the optional child is still attached.
    pub fn has_optional(&self) -> bool {
        self.optional.is_some()
    }

    /// Bring the optional child up to the current document.
    ///
    /// Returns whether it matches the current document.
    fn optional_matches(&mut self) -> Result<bool> {
        let current = self.required.doc_id();
        let Some(optional) = self.optional.as_mut() else {
            return Ok(false);
        };
        let mut optional_doc = optional.doc_id();
        if optional_doc < current {
            optional_doc = optional.advance(current)?;
            if optional_doc == NO_MORE_DOCS {
                log::debug!("optional clause exhausted at doc {}, dropping it", current);
                self.optional = None;
                return Ok(false);
            }
        }
        Ok(optional_doc == current)
    }
}

impl Matcher for ReqOptMatcher {
    fn doc_id(&self) -> DocId {
        self.required.doc_id()
    }

    fn next_doc(&mut self) -> Result<DocId> {
        self.required.next_doc()
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.required.advance(target)
    }

    fn cost(&self) -> u64 {
        self.required.cost()
    }

    fn score(&mut self) -> Result<f32> {
        let required_score = self.required.score()?;
        if !self.optional_matches()? {
            return Ok(required_score);
        }
        match self.optional.as_mut() {
            Some(optional) => Ok(required_score + optional.score()?),
            None => Ok(required_score),
        }
    }

    fn freq(&mut self) -> Result<f32> {
        // Make sure the optional child is positioned before counting it.
        if self.optional_matches()? {
            Ok(2.0)
        } else {
            Ok(1.0)
        }
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
        if let Some(optional) = &self.optional {
            children.push(ChildMatcher::new(optional, Occur::Should));
        }
        children
    }

    fn name(&self) -> &'static str {
        "ReqOpt"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::error::HalberdError;
    use crate::postings::PostingList;
    use crate::query::testing::{collect_docs, counting_term, failing_term, term};

    #[test]
    fn test_req_opt_iterates_required_only() {
        let required = PostingList::from_doc_ids("req", [1, 3, 5]);
        let optional = PostingList::from_doc_ids("opt", [0, 2, 3, 4]);
        let mut matcher = ReqOptMatcher::new(term(&required), term(&optional));

        assert_eq!(collect_docs(&mut matcher), vec![1, 3, 5]);
    }

    #[test]
    fn test_req_opt_scores() {
        let required = PostingList::from_doc_ids("req", [1, 3, 5]);
        let optional = PostingList::from_doc_ids("opt", [3, 4]);
        let mut matcher = ReqOptMatcher::new(term(&required), term(&optional));

        assert_eq!(matcher.next_doc().unwrap(), 1);
        assert_eq!(matcher.score().unwrap(), 1.0);
        assert_eq!(matcher.freq().unwrap(), 1.0);

        assert_eq!(matcher.next_doc().unwrap(), 3);
        assert_eq!(matcher.score().unwrap(), 2.0);
        assert_eq!(matcher.freq().unwrap(), 2.0);

        assert_eq!(matcher.next_doc().unwrap(), 5);
        assert_eq!(matcher.score().unwrap(), 1.0);
        // Exhausted while catching up to doc 5.
        assert!(!matcher.has_optional());
        assert_eq!(matcher.children().len(), 1);
    }

    #[test]
    fn test_req_opt_optional_is_lazy() {
        let required = PostingList::from_doc_ids("req", [2, 4, 6, 8]);
        let optional = PostingList::from_doc_ids("opt", [4, 8]);
        let (optional, moves) = counting_term(&optional);
        let mut matcher = ReqOptMatcher::new(term(&required), optional);

        assert_eq!(collect_docs(&mut matcher), vec![2, 4, 6, 8]);
        assert_eq!(moves.load(Ordering::SeqCst), 0);

        let (optional, moves) = counting_term(&PostingList::from_doc_ids("opt", [4, 8]));
        let mut matcher = ReqOptMatcher::new(term(&required), optional);
        matcher.next_doc().unwrap();
        matcher.next_doc().unwrap();
        assert_eq!(matcher.score().unwrap(), 2.0);
        assert_eq!(moves.load(Ordering::SeqCst), 1);
        // Scoring the same document again does not move it.
        matcher.score().unwrap();
        assert_eq!(moves.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_req_opt_children_roles() {
        let required = PostingList::from_doc_ids("req", [1]);
        let optional = PostingList::from_doc_ids("opt", [1]);
        let matcher = ReqOptMatcher::new(term(&required), term(&optional));

        let roles: Vec<&str> = matcher.children().iter().map(|c| c.relationship()).collect();
        assert_eq!(roles, vec!["MUST", "SHOULD"]);
        assert_eq!(matcher.cost(), 1);
    }

    #[test]
    fn test_req_opt_optional_error_surfaces_from_score() {
        let required = PostingList::from_doc_ids("req", [1, 5]);
        let mut matcher = ReqOptMatcher::new(term(&required), failing_term(vec![1, 5], 5));

        assert_eq!(matcher.next_doc().unwrap(), 1);
        assert_eq!(matcher.score().unwrap(), 2.0);
        assert_eq!(matcher.next_doc().unwrap(), 5);
        assert!(matches!(matcher.score(), Err(HalberdError::Storage(_))));
        assert!(matches!(matcher.score(), Err(HalberdError::Poisoned(_))));
    }
}
