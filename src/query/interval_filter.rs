//! Matchers that filter documents by the arrangement of their intervals.
//!
//! Both matchers find the first passing interval while positioning on a
//! document, so a document is only returned when at least one interval
//! passes. That interval is buffered and handed out by the first
//! `next_position` call.

use crate::error::Result;
use crate::query::QueryMatcher;
use crate::query::boolean::Occur;
use crate::query::config::MatcherConfig;
use crate::query::conjunction::ConjunctionMatcher;
use crate::query::matcher::{ChildMatcher, Matcher, Poison};
use crate::query::position::Interval;
use crate::{DocId, NO_MORE_DOCS, NO_MORE_POSITIONS, Position};

/// How the children's intervals must be arranged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalFilter {
    /// Each child's interval starts after the previous child's ends.
    Ordered,
    /// Each child's interval starts right after the previous child's ends.
    Block,
}

/// A conjunction that only matches where its children's intervals line up
/// in the given child order.
///
/// Reported intervals span from the first child's interval to the last
/// child's. Ordered matching reports minimal spans only: a span is dropped
/// when a shorter one inside it also lines up.
#[derive(Debug)]
pub struct IntervalFilterMatcher {
    inner: ConjunctionMatcher,
    filter: IntervalFilter,
    /// Widest gap allowed between the children's intervals.
    max_distance: Option<i32>,
    /// Latest interval read from each child, in child order.
    intervals: Vec<Interval>,
    /// Next child to line up in ordered matching.
    index: usize,
    current: Interval,
    match_distance: i32,
    buffered: bool,
    done: bool,
    poison: Poison,
}

impl IntervalFilterMatcher {
    /// Filter the intervals of at least two children.
    pub fn new(children: Vec<QueryMatcher>, filter: IntervalFilter) -> Result<Self> {
        let len = children.len();
        let inner = ConjunctionMatcher::new(children)?;
        Ok(Self::wrap(inner, len, filter))
    }

    /// Create a filter after checking the clause cap of `config`.
    pub fn with_config(
        children: Vec<QueryMatcher>,
        filter: IntervalFilter,
        config: &MatcherConfig,
    ) -> Result<Self> {
        let len = children.len();
        let inner = ConjunctionMatcher::with_config(children, 1.0, config)?;
        Ok(Self::wrap(inner, len, filter))
    }

    fn wrap(inner: ConjunctionMatcher, len: usize, filter: IntervalFilter) -> Self {
        IntervalFilterMatcher {
            inner,
            filter,
            max_distance: None,
            intervals: vec![Interval::EMPTY; len],
            index: 1,
            current: Interval::EMPTY,
            match_distance: 0,
            buffered: false,
            done: false,
            poison: Poison::default(),
        }
    }

    /// Only accept spans with at most `distance` uncovered positions between
    /// the children's intervals.
    pub fn with_max_distance(mut self, distance: u32) -> Self {
        self.max_distance = Some(i32::try_from(distance).unwrap_or(i32::MAX));
        self
    }

    /// The arrangement this matcher checks.
    pub fn filter(&self) -> IntervalFilter {
        self.filter
    }

    /// Uncovered positions inside the last reported span; always `0` for
    /// block matches.
    pub fn match_distance(&self) -> i32 {
        self.match_distance
    }

    /// Read the next interval of the child given at `index`.
    fn read(&mut self, index: usize) -> Result<Option<Interval>> {
        let doc = self.inner.doc_id();
        let child = self.inner.child_in_order_mut(index);
        if child.doc_id() != doc || !child.has_positions() {
            return Ok(None);
        }
        if child.next_position()? == NO_MORE_POSITIONS {
            return Ok(None);
        }
        Ok(Some(*child.interval()))
    }

    fn reset(&mut self) -> Result<()> {
        self.intervals.fill(Interval::EMPTY);
        self.index = 1;
        self.current.reset();
        self.buffered = false;
        self.done = false;
        if self.filter == IntervalFilter::Ordered {
            match self.read(0)? {
                Some(first) => self.intervals[0] = first,
                None => self.intervals[0].set_maximum(),
            }
        }
        Ok(())
    }

    /// Move from the conjunction's document `doc` to the first one with a
    /// passing interval.
    fn settle(&mut self, mut doc: DocId) -> Result<DocId> {
        while doc != NO_MORE_DOCS {
            self.reset()?;
            if self.next_filtered()? != NO_MORE_POSITIONS {
                self.buffered = true;
                return Ok(doc);
            }
            log::trace!("doc {}: no interval passes the {:?} filter", doc, self.filter);
            doc = self.inner.next_doc()?;
        }
        Ok(NO_MORE_DOCS)
    }

    fn next_filtered(&mut self) -> Result<Position> {
        while !self.done {
            let position = match self.filter {
                IntervalFilter::Ordered => self.next_ordered()?,
                IntervalFilter::Block => self.next_block()?,
            };
            if position == NO_MORE_POSITIONS {
                self.done = true;
                break;
            }
            if self.passes_filter() {
                return Ok(position);
            }
        }
        self.current.set_maximum();
        Ok(NO_MORE_POSITIONS)
    }

    fn passes_filter(&self) -> bool {
        self.max_distance
            .is_none_or(|max| self.match_distance <= max)
    }

    /// Report the span from the first child's interval to the last's.
    fn capture(&mut self) {
        let last = self.intervals.len() - 1;
        let (first, end) = (self.intervals[0], self.intervals[last]);
        self.current.update_span(&first, &end);
        let covered: i32 = self
            .intervals
            .iter()
            .map(|interval| interval.end - interval.begin + 1)
            .sum();
        self.match_distance = (self.current.end - self.current.begin + 1) - covered;
    }

    /// Find the next minimal span where the children line up in order.
    ///
    /// A span found is only reported once the first child moved past it and
    /// no shorter span ending no later was found.
    fn next_ordered(&mut self) -> Result<Position> {
        if self.intervals[0].is_exhausted() {
            return Ok(NO_MORE_POSITIONS);
        }
        let len = self.intervals.len();
        self.current.set_maximum();
        let mut bound = NO_MORE_POSITIONS;
        loop {
            // Children before `index` line up; the rest did before the
            // first child moved.
            loop {
                let previous = self.intervals[self.index - 1];
                if previous.end >= bound {
                    return Ok(self.current.begin);
                }
                if self.index == len || self.intervals[self.index].begin > previous.end {
                    break;
                }
                loop {
                    if self.intervals[self.index].end >= bound {
                        return Ok(self.current.begin);
                    }
                    match self.read(self.index)? {
                        Some(next) => self.intervals[self.index] = next,
                        None => return Ok(self.current.begin),
                    }
                    if self.intervals[self.index].begin > previous.end {
                        break;
                    }
                }
                self.index += 1;
            }
            self.capture();
            bound = self.intervals[len - 1].begin;
            self.index = 1;
            match self.read(0)? {
                Some(next) => self.intervals[0] = next,
                None => {
                    self.intervals[0].set_maximum();
                    return Ok(self.current.begin);
                }
            }
        }
    }

    /// Find the next span where every child's interval directly follows the
    /// previous one.
    fn next_block(&mut self) -> Result<Position> {
        let Some(first) = self.read(0)? else {
            return Ok(NO_MORE_POSITIONS);
        };
        self.intervals[0] = first;
        let mut i = 1;
        while i < self.intervals.len() {
            while self.intervals[i].begin <= self.intervals[i - 1].end {
                match self.read(i)? {
                    Some(next) => self.intervals[i] = next,
                    None => return Ok(NO_MORE_POSITIONS),
                }
            }
            if self.intervals[i].begin == self.intervals[i - 1].end + 1 {
                i += 1;
                continue;
            }
            // Start over from a first interval that can still touch the
            // second child's.
            loop {
                match self.read(0)? {
                    Some(next) => self.intervals[0] = next,
                    None => return Ok(NO_MORE_POSITIONS),
                }
                if self.intervals[0].end + 1 >= self.intervals[1].begin {
                    break;
                }
            }
            i = 1;
        }
        self.capture();
        Ok(self.current.begin)
    }
}

impl Matcher for IntervalFilterMatcher {
    fn doc_id(&self) -> DocId {
        self.inner.doc_id()
    }

    fn next_doc(&mut self) -> Result<DocId> {
        self.poison.check()?;
        debug_assert!(
            self.inner.doc_id() != NO_MORE_DOCS,
            "next_doc called after exhaustion"
        );
        let result = self
            .inner
            .next_doc()
            .and_then(|doc| self.settle(doc));
        self.poison.track(result)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.poison.check()?;
        debug_assert!(
            target > self.inner.doc_id(),
            "advance target {} must be beyond current doc {}",
            target,
            self.inner.doc_id()
        );
        let result = self
            .inner
            .advance(target)
            .and_then(|doc| self.settle(doc));
        self.poison.track(result)
    }

    fn cost(&self) -> u64 {
        self.inner.cost()
    }

    fn score(&mut self) -> Result<f32> {
        self.inner.score()
    }

    fn freq(&mut self) -> Result<f32> {
        self.inner.freq()
    }

    fn has_positions(&self) -> bool {
        true
    }

    fn next_position(&mut self) -> Result<Position> {
        self.poison.check()?;
        if self.buffered {
            self.buffered = false;
            return Ok(self.current.begin);
        }
        let result = self.next_filtered();
        self.poison.track(result)
    }

    fn interval(&self) -> &Interval {
        &self.current
    }

    fn children(&self) -> Vec<ChildMatcher<'_>> {
        self.inner.children()
    }

    fn name(&self) -> &'static str {
        "IntervalFilter"
    }
}

/// Matches the intervals of `minuend` that neither contain nor lie within an
/// interval of `subtrahend` on the same document.
///
/// Documents the subtrahend does not match keep all of the minuend's
/// intervals. A subtrahend without positions removes nothing.
#[derive(Debug)]
pub struct NonOverlappingMatcher {
    minuend: Box<QueryMatcher>,
    subtrahend: Box<QueryMatcher>,
    /// Current subtrahend interval; maximum when none is left on the document.
    subtracted: Interval,
    current: Interval,
    buffered: bool,
    poison: Poison,
}

impl NonOverlappingMatcher {
    /// Create a matcher removing `subtrahend`'s intervals from `minuend`'s.
    pub fn new(minuend: QueryMatcher, subtrahend: QueryMatcher) -> Self {
        NonOverlappingMatcher {
            minuend: Box::new(minuend),
            subtrahend: Box::new(subtrahend),
            subtracted: Interval::EMPTY,
            current: Interval::EMPTY,
            buffered: false,
            poison: Poison::default(),
        }
    }

    fn read_subtracted(&mut self) -> Result<()> {
        let doc = self.minuend.doc_id();
        if self.subtrahend.doc_id() == doc
            && self.subtrahend.has_positions()
            && self.subtrahend.next_position()? != NO_MORE_POSITIONS
        {
            self.subtracted = *self.subtrahend.interval();
        } else {
            self.subtracted.set_maximum();
        }
        Ok(())
    }

    fn reset(&mut self, doc: DocId) -> Result<()> {
        if self.subtrahend.doc_id() < doc {
            self.subtrahend.advance(doc)?;
        }
        self.buffered = false;
        self.current.reset();
        self.read_subtracted()
    }

    fn settle(&mut self, mut doc: DocId) -> Result<DocId> {
        while doc != NO_MORE_DOCS {
            self.reset(doc)?;
            if self.next_filtered()? != NO_MORE_POSITIONS {
                self.buffered = true;
                return Ok(doc);
            }
            doc = self.minuend.next_doc()?;
        }
        Ok(NO_MORE_DOCS)
    }

    fn next_filtered(&mut self) -> Result<Position> {
        if self.minuend.has_positions() {
            while self.minuend.next_position()? != NO_MORE_POSITIONS {
                let candidate = *self.minuend.interval();
                while self.subtracted.less_than_exclusive(&candidate) {
                    self.read_subtracted()?;
                }
                if !candidate.overlaps(&self.subtracted) {
                    self.current = candidate;
                    return Ok(candidate.begin);
                }
            }
        }
        self.current.set_maximum();
        Ok(NO_MORE_POSITIONS)
    }
}

impl Matcher for NonOverlappingMatcher {
    fn doc_id(&self) -> DocId {
        self.minuend.doc_id()
    }

    fn next_doc(&mut self) -> Result<DocId> {
        self.poison.check()?;
        debug_assert!(
            self.minuend.doc_id() != NO_MORE_DOCS,
            "next_doc called after exhaustion"
        );
        let result = self
            .minuend
            .next_doc()
            .and_then(|doc| self.settle(doc));
        self.poison.track(result)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.poison.check()?;
        debug_assert!(
            target > self.minuend.doc_id(),
            "advance target {} must be beyond current doc {}",
            target,
            self.minuend.doc_id()
        );
        let result = self
            .minuend
            .advance(target)
            .and_then(|doc| self.settle(doc));
        self.poison.track(result)
    }

    fn cost(&self) -> u64 {
        self.minuend.cost()
    }

    fn score(&mut self) -> Result<f32> {
        self.minuend.score()
    }

    fn freq(&mut self) -> Result<f32> {
        self.minuend.freq()
    }

    fn has_positions(&self) -> bool {
        true
    }

    fn next_position(&mut self) -> Result<Position> {
        self.poison.check()?;
        if self.buffered {
            self.buffered = false;
            return Ok(self.current.begin);
        }
        let result = self.next_filtered();
        self.poison.track(result)
    }

    fn interval(&self) -> &Interval {
        &self.current
    }

    fn children(&self) -> Vec<ChildMatcher<'_>> {
        vec![
            ChildMatcher::new(&self.minuend, Occur::Must),
            ChildMatcher::new(&self.subtrahend, Occur::MustNot),
        ]
    }

    fn name(&self) -> &'static str {
        "NonOverlapping"
    }
}
