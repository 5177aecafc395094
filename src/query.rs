//! Query execution: matchers over postings and the combinators built from them.
//!
//! Every matcher implements [`Matcher`]. Trees are assembled from the closed
//! [`QueryMatcher`] sum type, so combinators hold their children by value and
//! dispatch statically.

pub mod boolean;
pub mod config;
pub mod conjunction;
pub mod disjunction;
pub mod interval_filter;
pub mod matcher;
pub mod phrase;
pub mod position;
pub mod queue;
pub mod req_excl;
pub mod req_opt;
pub mod scorer;
pub mod term;

#[cfg(test)]
pub(crate) mod testing;

pub use self::boolean::{BooleanClause, BooleanMatcherBuilder, Occur};
pub use self::config::{MatcherConfig, MatcherConfigBuilder};
pub use self::conjunction::ConjunctionMatcher;
pub use self::disjunction::DisjunctionMatcher;
pub use self::interval_filter::{IntervalFilter, IntervalFilterMatcher, NonOverlappingMatcher};
pub use self::matcher::{ChildMatcher, EmptyMatcher, Matcher, slow_advance};
pub use self::phrase::{PhraseTerm, SloppyPhraseMatcher};
pub use self::position::{Interval, PositionQueue};
pub use self::queue::MatcherQueue;
pub use self::req_excl::ReqExclMatcher;
pub use self::req_opt::ReqOptMatcher;
pub use self::scorer::{BM25Scorer, ConstantScorer, Scorer};
pub use self::term::TermMatcher;

use crate::error::Result;
use crate::{DocId, Position};

/// Any matcher of this crate.
#[derive(Debug)]
pub enum QueryMatcher {
    Empty(EmptyMatcher),
    Term(TermMatcher),
    Conjunction(ConjunctionMatcher),
    Disjunction(DisjunctionMatcher),
    ReqOpt(ReqOptMatcher),
    ReqExcl(ReqExclMatcher),
    SloppyPhrase(Box<SloppyPhraseMatcher>),
    IntervalFilter(Box<IntervalFilterMatcher>),
    NonOverlapping(Box<NonOverlappingMatcher>),
}

macro_rules! dispatch {
    ($value:expr, $matcher:ident => $body:expr) => {
        match $value {
            QueryMatcher::Empty($matcher) => $body,
            QueryMatcher::Term($matcher) => $body,
            QueryMatcher::Conjunction($matcher) => $body,
            QueryMatcher::Disjunction($matcher) => $body,
            QueryMatcher::ReqOpt($matcher) => $body,
            QueryMatcher::ReqExcl($matcher) => $body,
            QueryMatcher::SloppyPhrase($matcher) => $body,
            QueryMatcher::IntervalFilter($matcher) => $body,
            QueryMatcher::NonOverlapping($matcher) => $body,
        }
    };
}

impl QueryMatcher {
    /// A matcher that matches nothing.
    pub fn empty() -> Self {
        QueryMatcher::Empty(EmptyMatcher::new())
    }
}

impl Matcher for QueryMatcher {
    fn doc_id(&self) -> DocId {
        dispatch!(self, m => m.doc_id())
    }

    fn next_doc(&mut self) -> Result<DocId> {
        dispatch!(self, m => m.next_doc())
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        dispatch!(self, m => m.advance(target))
    }

    fn cost(&self) -> u64 {
        dispatch!(self, m => m.cost())
    }

    fn score(&mut self) -> Result<f32> {
        dispatch!(self, m => m.score())
    }

    fn freq(&mut self) -> Result<f32> {
        dispatch!(self, m => m.freq())
    }

    fn has_positions(&self) -> bool {
        dispatch!(self, m => m.has_positions())
    }

    fn next_position(&mut self) -> Result<Position> {
        dispatch!(self, m => m.next_position())
    }

    fn interval(&self) -> &Interval {
        dispatch!(self, m => m.interval())
    }

    fn children(&self) -> Vec<ChildMatcher<'_>> {
        dispatch!(self, m => m.children())
    }

    fn name(&self) -> &'static str {
        dispatch!(self, m => m.name())
    }
}

impl From<EmptyMatcher> for QueryMatcher {
    fn from(matcher: EmptyMatcher) -> Self {
        QueryMatcher::Empty(matcher)
    }
}

impl From<TermMatcher> for QueryMatcher {
    fn from(matcher: TermMatcher) -> Self {
        QueryMatcher::Term(matcher)
    }
}

impl From<ConjunctionMatcher> for QueryMatcher {
    fn from(matcher: ConjunctionMatcher) -> Self {
        QueryMatcher::Conjunction(matcher)
    }
}

impl From<DisjunctionMatcher> for QueryMatcher {
    fn from(matcher: DisjunctionMatcher) -> Self {
        QueryMatcher::Disjunction(matcher)
    }
}

impl From<ReqOptMatcher> for QueryMatcher {
    fn from(matcher: ReqOptMatcher) -> Self {
        QueryMatcher::ReqOpt(matcher)
    }
}

impl From<ReqExclMatcher> for QueryMatcher {
    fn from(matcher: ReqExclMatcher) -> Self {
        QueryMatcher::ReqExcl(matcher)
    }
}

impl From<SloppyPhraseMatcher> for QueryMatcher {
    fn from(matcher: SloppyPhraseMatcher) -> Self {
        QueryMatcher::SloppyPhrase(Box::new(matcher))
    }
}

impl From<IntervalFilterMatcher> for QueryMatcher {
    fn from(matcher: IntervalFilterMatcher) -> Self {
        QueryMatcher::IntervalFilter(Box::new(matcher))
    }
}

impl From<NonOverlappingMatcher> for QueryMatcher {
    fn from(matcher: NonOverlappingMatcher) -> Self {
        QueryMatcher::NonOverlapping(Box::new(matcher))
    }
}
