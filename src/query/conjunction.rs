//! Conjunction (AND) of several matchers.

use crate::error::{HalberdError, Result};
use crate::query::QueryMatcher;
use crate::query::boolean::Occur;
use crate::query::config::MatcherConfig;
use crate::query::matcher::{ChildMatcher, Matcher, Poison};
use crate::query::position::{Interval, PositionQueue};
use crate::{DocId, NO_MORE_DOCS, Position, UNPOSITIONED};

/// A matcher for documents matched by every child.
///
/// Children are ordered by cost; the cheapest one leads and the others are
/// only advanced to the leader's candidates.
#[derive(Debug)]
pub struct ConjunctionMatcher {
    /// Children sorted by ascending cost; `children[0]` leads.
    children: Vec<QueryMatcher>,
    /// Cached current document of each child.
    docs: Vec<DocId>,
    /// Index into `children` of each child in the order it was given.
    order: Vec<usize>,
    doc: DocId,
    coord: f32,
    positions: PositionQueue,
    poison: Poison,
}

impl ConjunctionMatcher {
    /// Create a conjunction of at least two children.
    pub fn new(children: Vec<QueryMatcher>) -> Result<Self> {
        Self::with_coord(children, 1.0)
    }

    /// Create a conjunction whose summed score is multiplied by `coord`.
    pub fn with_coord(children: Vec<QueryMatcher>, coord: f32) -> Result<Self> {
        if children.len() < 2 {
            return Err(HalberdError::invalid_argument(format!(
                "conjunction needs at least 2 children, got {}",
                children.len()
            )));
        }
        let mut indexed: Vec<(usize, QueryMatcher)> = children.into_iter().enumerate().collect();
        indexed.sort_by_key(|(_, child)| child.cost());
        let mut order = vec![0; indexed.len()];
        for (slot, (given, _)) in indexed.iter().enumerate() {
            order[*given] = slot;
        }
        let children: Vec<QueryMatcher> = indexed.into_iter().map(|(_, child)| child).collect();
        let docs = children.iter().map(|child| child.doc_id()).collect();
        let positions = PositionQueue::new(children.len());
        Ok(ConjunctionMatcher {
            children,
            docs,
            order,
            doc: UNPOSITIONED,
            coord,
            positions,
            poison: Poison::default(),
        })
    }

    /// Create a conjunction after checking the clause cap of `config`.
    pub fn with_config(
        children: Vec<QueryMatcher>,
        coord: f32,
        config: &MatcherConfig,
    ) -> Result<Self> {
        config.check_clause_count(children.len())?;
        Self::with_coord(children, coord)
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Always false: a conjunction has at least two children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// The child given at `index` to the constructor.
    pub(crate) fn child_in_order_mut(&mut self, index: usize) -> &mut QueryMatcher {
        &mut self.children[self.order[index]]
    }

    /// Align every child on the leader's document `doc`.
    fn do_next(&mut self, mut doc: DocId) -> Result<DocId> {
        'lead: loop {
            if doc == NO_MORE_DOCS {
                return Ok(NO_MORE_DOCS);
            }
            for i in 1..self.children.len() {
                if self.docs[i] < doc {
                    self.docs[i] = self.children[i].advance(doc)?;
                }
                if self.docs[i] > doc {
                    // This child skipped the candidate; move the leader on.
                    doc = self.children[0].next_doc()?;
                    self.docs[0] = doc;
                    continue 'lead;
                }
            }
            self.positions.advance_to(doc);
            return Ok(doc);
        }
    }

    fn next_doc_inner(&mut self) -> Result<DocId> {
        let lead = self.children[0].next_doc()?;
        self.docs[0] = lead;
        self.do_next(lead)
    }

    fn advance_inner(&mut self, target: DocId) -> Result<DocId> {
        let lead = self.children[0].advance(target)?;
        self.docs[0] = lead;
        self.do_next(lead)
    }
}

impl Matcher for ConjunctionMatcher {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        self.poison.check()?;
        debug_assert!(self.doc != NO_MORE_DOCS, "next_doc called after exhaustion");
        let result = self.next_doc_inner();
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
        let result = self.advance_inner(target);
        self.doc = self.poison.track(result)?;
        Ok(self.doc)
    }

    fn cost(&self) -> u64 {
        self.children[0].cost()
    }

    fn score(&mut self) -> Result<f32> {
        let mut sum = 0.0;
        for child in self.children.iter_mut() {
            sum += child.score()?;
        }
        Ok(sum * self.coord)
    }

    fn freq(&mut self) -> Result<f32> {
        Ok(self.children.len() as f32)
    }

    fn has_positions(&self) -> bool {
        self.children.iter().any(|child| child.has_positions())
    }

    fn next_position(&mut self) -> Result<Position> {
        self.poison.check()?;
        let result = self.positions.next_position(&mut self.children);
        self.poison.track(result)
    }

    fn interval(&self) -> &Interval {
        self.positions.interval()
    }

    fn children(&self) -> Vec<ChildMatcher<'_>> {
        self.children
            .iter()
            .map(|child| ChildMatcher::new(child, Occur::Must))
            .collect()
    }

    fn name(&self) -> &'static str {
        "Conjunction"
    }
}
