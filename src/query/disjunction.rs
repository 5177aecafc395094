//! Disjunction (OR) of several matchers.

use crate::error::{HalberdError, Result};
use crate::query::QueryMatcher;
use crate::query::boolean::Occur;
use crate::query::config::MatcherConfig;
use crate::query::matcher::{ChildMatcher, Matcher, Poison};
use crate::query::position::{Interval, PositionQueue};
use crate::query::queue::MatcherQueue;
use crate::{DocId, NO_MORE_DOCS, Position, UNPOSITIONED};

/// A matcher for documents matched by at least one child.
///
/// Children live in a [`MatcherQueue`]; the current document is the queue's
/// minimum and the children on it form the queue's top list.
#[derive(Debug)]
pub struct DisjunctionMatcher {
    queue: MatcherQueue,
    doc: DocId,
    /// Score factor indexed by the number of matching children.
    coord: Vec<f32>,
    positions: PositionQueue,
    poison: Poison,
}

impl DisjunctionMatcher {
    /// Create a disjunction with a flat coordination table.
    pub fn new(children: Vec<QueryMatcher>) -> Result<Self> {
        let coord = vec![1.0; children.len() + 1];
        Self::with_coord(children, coord)
    }

    /// Create a disjunction with a coordination table of `children.len() + 1`
    /// factors, indexed by the number of children on the current document.
    pub fn with_coord(children: Vec<QueryMatcher>, coord: Vec<f32>) -> Result<Self> {
        if children.is_empty() {
            return Err(HalberdError::invalid_argument(
                "disjunction needs at least 1 child",
            ));
        }
        if coord.len() != children.len() + 1 {
            return Err(HalberdError::invalid_argument(format!(
                "coordination table has {} entries, expected {}",
                coord.len(),
                children.len() + 1
            )));
        }
        let positions = PositionQueue::new(children.len());
        Ok(DisjunctionMatcher {
            queue: MatcherQueue::new(children),
            doc: UNPOSITIONED,
            coord,
            positions,
            poison: Poison::default(),
        })
    }

    /// Create a disjunction after checking the clause cap of `config`,
    /// using the config's coordination table.
    pub fn with_config(children: Vec<QueryMatcher>, config: &MatcherConfig) -> Result<Self> {
        config.check_clause_count(children.len())?;
        let coord = config.coord_table(children.len());
        Self::with_coord(children, coord)
    }

    /// Number of children on the current document.
    pub fn matching_children(&mut self) -> usize {
        let head = self.queue.top_list();
        self.queue.tied(head).count()
    }

    fn next_doc_inner(&mut self) -> Result<DocId> {
        let current = self.doc;
        while let Some(top) = self.queue.top() {
            if self.queue.doc(top) != current {
                break;
            }
            self.queue.matcher_mut(top).next_doc()?;
            self.queue.update_top();
        }
        Ok(self.queue.top_doc())
    }

    fn advance_inner(&mut self, target: DocId) -> Result<DocId> {
        while let Some(top) = self.queue.top() {
            if self.queue.doc(top) >= target {
                break;
            }
            self.queue.matcher_mut(top).advance(target)?;
            self.queue.update_top();
        }
        Ok(self.queue.top_doc())
    }

    fn on_document(&mut self, doc: DocId) -> DocId {
        self.doc = doc;
        self.positions.advance_to(doc);
        doc
    }
}

impl Matcher for DisjunctionMatcher {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        self.poison.check()?;
        debug_assert!(self.doc != NO_MORE_DOCS, "next_doc called after exhaustion");
        let result = self.next_doc_inner();
        let doc = self.poison.track(result)?;
        Ok(self.on_document(doc))
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.poison.check()?;
        debug_assert!(
            target > self.doc,
            "advance target {} must be beyond current doc {}",
            target,
            self.doc
        );
        let result = self.advance_inner(target);
        let doc = self.poison.track(result)?;
        Ok(self.on_document(doc))
    }

    fn cost(&self) -> u64 {
        self.queue.total_cost()
    }

    fn score(&mut self) -> Result<f32> {
        let mut sum = 0.0;
        let mut count = 0;
        let mut cursor = self.queue.top_list();
        while let Some(index) = cursor {
            sum += self.queue.matcher_mut(index).score()?;
            count += 1;
            cursor = self.queue.next_tied(index);
        }
        Ok(sum * self.coord[count])
    }

    fn freq(&mut self) -> Result<f32> {
        Ok(self.matching_children() as f32)
    }

    fn has_positions(&self) -> bool {
        self.queue.matchers().iter().any(|child| child.has_positions())
    }

    fn next_position(&mut self) -> Result<Position> {
        self.poison.check()?;
        let result = self.positions.next_position(self.queue.matchers_mut());
        self.poison.track(result)
    }

    fn interval(&self) -> &Interval {
        self.positions.interval()
    }

    fn children(&self) -> Vec<ChildMatcher<'_>> {
        self.queue
            .matchers()
            .iter()
            .map(|child| ChildMatcher::new(child, Occur::Should))
            .collect()
    }

    fn name(&self) -> &'static str {
        "Disjunction"
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::NO_MORE_POSITIONS;
    use crate::postings::PostingList;
    use crate::query::testing::{collect_docs, failing_term, term};

    fn disjunction(lists: &[PostingList]) -> DisjunctionMatcher {
        DisjunctionMatcher::new(lists.iter().map(term).collect()).unwrap()
    }

    #[test]
    fn test_disjunction_unions() {
        let lists = [
            PostingList::from_doc_ids("a", [1, 4, 9]),
            PostingList::from_doc_ids("b", [2, 4, 10]),
            PostingList::from_doc_ids("c", [4, 9]),
        ];
        let mut matcher = disjunction(&lists);

        assert_eq!(matcher.cost(), 8);
        assert_eq!(collect_docs(&mut matcher), vec![1, 2, 4, 9, 10]);
    }

    #[test]
    fn test_disjunction_freq_counts_matching_children() {
        let lists = [
            PostingList::from_doc_ids("a", [1, 4]),
            PostingList::from_doc_ids("b", [4]),
            PostingList::from_doc_ids("c", [4, 6]),
        ];
        let mut matcher = disjunction(&lists);

        assert_eq!(matcher.next_doc().unwrap(), 1);
        assert_eq!(matcher.freq().unwrap(), 1.0);
        assert_eq!(matcher.next_doc().unwrap(), 4);
        assert_eq!(matcher.freq().unwrap(), 3.0);
        assert_eq!(matcher.score().unwrap(), 3.0);
        assert_eq!(matcher.advance(5).unwrap(), 6);
        assert_eq!(matcher.freq().unwrap(), 1.0);
    }

    #[test]
    fn test_disjunction_coord() {
        let lists = [
            PostingList::from_doc_ids("a", [1, 2]),
            PostingList::from_doc_ids("b", [2]),
        ];
        let config = MatcherConfig::default();
        let mut matcher =
            DisjunctionMatcher::with_config(lists.iter().map(term).collect(), &config).unwrap();

        assert_eq!(matcher.next_doc().unwrap(), 1);
        assert_eq!(matcher.score().unwrap(), 0.5);
        assert_eq!(matcher.next_doc().unwrap(), 2);
        assert_eq!(matcher.score().unwrap(), 2.0);
    }

    #[test]
    fn test_disjunction_rejects_bad_construction() {
        let lists: Vec<PostingList> = (0..3)
            .map(|i| PostingList::from_doc_ids(format!("t{}", i), [1]))
            .collect();

        let result = DisjunctionMatcher::with_coord(lists.iter().map(term).collect(), vec![1.0; 3]);
        assert!(matches!(result, Err(HalberdError::InvalidArgument(_))));

        let config = MatcherConfig::builder().max_clause_count(2).build();
        let result = DisjunctionMatcher::with_config(lists.iter().map(term).collect(), &config);
        assert!(matches!(
            result,
            Err(HalberdError::TooManyClauses { count: 3, max: 2 })
        ));

        assert!(DisjunctionMatcher::new(Vec::new()).is_err());
    }

    #[test]
    fn test_disjunction_positions_skip_other_documents() {
        let lists = [
            PostingList::from_positions("fox", [(3, vec![4, 8])]),
            PostingList::from_positions("dog", [(3, vec![1]), (7, vec![0])]),
            PostingList::from_positions("cat", [(7, vec![2])]),
        ];
        let mut matcher = disjunction(&lists);

        assert_eq!(matcher.next_doc().unwrap(), 3);
        let mut positions = Vec::new();
        loop {
            let position = matcher.next_position().unwrap();
            if position == NO_MORE_POSITIONS {
                break;
            }
            positions.push(position);
        }
        assert_eq!(positions, vec![1, 4, 8]);

        assert_eq!(matcher.next_doc().unwrap(), 7);
        assert_eq!(matcher.next_position().unwrap(), 0);
        assert_eq!(matcher.next_position().unwrap(), 2);
        assert_eq!(matcher.next_position().unwrap(), NO_MORE_POSITIONS);
    }

    #[test]
    fn test_disjunction_children_roles() {
        let lists = [
            PostingList::from_doc_ids("a", [1]),
            PostingList::from_doc_ids("b", [2]),
        ];
        let matcher = disjunction(&lists);
        let roles: Vec<&str> = matcher.children().iter().map(|c| c.relationship()).collect();
        assert_eq!(roles, vec!["SHOULD", "SHOULD"]);
    }

    #[test]
    fn test_disjunction_poisoned() {
        let list = PostingList::from_doc_ids("a", [1, 2]);
        let mut matcher =
            DisjunctionMatcher::new(vec![term(&list), failing_term(vec![1, 2], 2)]).unwrap();

        assert_eq!(matcher.next_doc().unwrap(), 1);
        assert!(matcher.next_doc().is_err());
        assert!(matches!(matcher.next_doc(), Err(HalberdError::Poisoned(_))));
    }

    #[test]
    fn test_disjunction_random_union() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..40 {
            let count = rng.random_range(1..8);
            let sets: Vec<BTreeSet<DocId>> = (0..count)
                .map(|_| {
                    let density = rng.random_range(0.01..0.5);
                    (0..200).filter(|_| rng.random_bool(density)).collect()
                })
                .collect();
            let lists: Vec<PostingList> = sets
                .iter()
                .enumerate()
                .map(|(i, set)| PostingList::from_doc_ids(format!("t{}", i), set.iter().copied()))
                .collect();
            let union: BTreeSet<DocId> = sets.iter().flatten().copied().collect();

            let mut matcher = disjunction(&lists);
            for &expected in &union {
                assert_eq!(matcher.next_doc().unwrap(), expected);
                let containing = sets.iter().filter(|set| set.contains(&expected)).count();
                assert_eq!(matcher.matching_children(), containing);
            }
            assert_eq!(matcher.next_doc().unwrap(), NO_MORE_DOCS);
        }
    }
}
