//! Boolean clause lists and their translation into combinator trees.

use std::fmt;

use crate::error::Result;
use crate::query::QueryMatcher;
use crate::query::config::MatcherConfig;
use crate::query::conjunction::ConjunctionMatcher;
use crate::query::disjunction::DisjunctionMatcher;
use crate::query::matcher::EmptyMatcher;
use crate::query::req_excl::ReqExclMatcher;
use crate::query::req_opt::ReqOptMatcher;

/// Occurrence requirements for boolean clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occur {
    /// The clause must match (equivalent to AND).
    Must,
    /// The clause should match (equivalent to OR).
    Should,
    /// The clause must not match (equivalent to NOT).
    MustNot,
}

impl Occur {
    /// The role name reported by matcher introspection.
    pub fn as_str(&self) -> &'static str {
        match self {
            Occur::Must => "MUST",
            Occur::Should => "SHOULD",
            Occur::MustNot => "MUST_NOT",
        }
    }
}

impl fmt::Display for Occur {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A clause in a boolean matcher tree.
#[derive(Debug)]
pub struct BooleanClause {
    /// The matcher for this clause.
    pub matcher: QueryMatcher,
    /// The occurrence requirement.
    pub occur: Occur,
}

impl BooleanClause {
    /// Create a new boolean clause.
    pub fn new(matcher: QueryMatcher, occur: Occur) -> Self {
        BooleanClause { matcher, occur }
    }

    /// Create a MUST clause.
    pub fn must(matcher: QueryMatcher) -> Self {
        BooleanClause::new(matcher, Occur::Must)
    }

    /// Create a SHOULD clause.
    pub fn should(matcher: QueryMatcher) -> Self {
        BooleanClause::new(matcher, Occur::Should)
    }

    /// Create a MUST_NOT clause.
    pub fn must_not(matcher: QueryMatcher) -> Self {
        BooleanClause::new(matcher, Occur::MustNot)
    }
}

/// Builds a combinator tree out of MUST / SHOULD / MUST_NOT clauses.
///
/// - MUST clauses form a [`ConjunctionMatcher`] (a single one is used as is).
/// - SHOULD clauses form a [`DisjunctionMatcher`]; next to MUST clauses they
///   only add score through a [`ReqOptMatcher`].
/// - MUST_NOT clauses are subtracted with a [`ReqExclMatcher`].
///
/// A tree with no positive clause matches nothing.
#[derive(Debug, Default)]
pub struct BooleanMatcherBuilder {
    clauses: Vec<BooleanClause>,
    config: MatcherConfig,
}

impl BooleanMatcherBuilder {
    /// Create a builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder with a custom configuration.
    pub fn with_config(config: MatcherConfig) -> Self {
        BooleanMatcherBuilder {
            clauses: Vec::new(),
            config,
        }
    }

    /// Add a clause.
    pub fn add_clause(&mut self, clause: BooleanClause) {
        self.clauses.push(clause);
    }

    /// Add a MUST clause.
    pub fn add_must(&mut self, matcher: QueryMatcher) {
        self.add_clause(BooleanClause::must(matcher));
    }

    /// Add a SHOULD clause.
    pub fn add_should(&mut self, matcher: QueryMatcher) {
        self.add_clause(BooleanClause::should(matcher));
    }

    /// Add a MUST_NOT clause.
    pub fn add_must_not(&mut self, matcher: QueryMatcher) {
        self.add_clause(BooleanClause::must_not(matcher));
    }

    /// Add a MUST clause, builder style.
    pub fn must(mut self, matcher: QueryMatcher) -> Self {
        self.add_must(matcher);
        self
    }

    /// Add a SHOULD clause, builder style.
    pub fn should(mut self, matcher: QueryMatcher) -> Self {
        self.add_should(matcher);
        self
    }

    /// Add a MUST_NOT clause, builder style.
    pub fn must_not(mut self, matcher: QueryMatcher) -> Self {
        self.add_must_not(matcher);
        self
    }

    /// Get the clauses.
    pub fn clauses(&self) -> &[BooleanClause] {
        &self.clauses
    }

    /// Check if no clause was added.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Assemble the matcher tree.
    ///
    /// Fails with [`TooManyClauses`](crate::error::HalberdError::TooManyClauses)
    /// before any iteration if the clause cap is exceeded.
    pub fn build(self) -> Result<QueryMatcher> {
        let config = self.config;
        config.check_clause_count(self.clauses.len())?;

        let mut must = Vec::new();
        let mut should = Vec::new();
        let mut must_not = Vec::new();
        for clause in self.clauses {
            match clause.occur {
                Occur::Must => must.push(clause.matcher),
                Occur::Should => should.push(clause.matcher),
                Occur::MustNot => must_not.push(clause.matcher),
            }
        }

        let positive = match (must.is_empty(), should.is_empty()) {
            (true, true) => return Ok(QueryMatcher::from(EmptyMatcher::new())),
            (true, false) => Self::disjunction(should, &config)?,
            (false, true) => Self::conjunction(must, &config)?,
            (false, false) => {
                let required = Self::conjunction(must, &config)?;
                let optional = Self::disjunction(should, &config)?;
                QueryMatcher::from(ReqOptMatcher::new(required, optional))
            }
        };

        if must_not.is_empty() {
            return Ok(positive);
        }
        let excluded = Self::flat_disjunction(must_not)?;
        Ok(QueryMatcher::from(ReqExclMatcher::new(positive, excluded)))
    }

    fn conjunction(mut matchers: Vec<QueryMatcher>, config: &MatcherConfig) -> Result<QueryMatcher> {
        if matchers.len() == 1 {
            return Ok(matchers.remove(0));
        }
        let matcher = ConjunctionMatcher::with_config(matchers, 1.0, config)?;
        Ok(QueryMatcher::from(matcher))
    }

    fn disjunction(mut matchers: Vec<QueryMatcher>, config: &MatcherConfig) -> Result<QueryMatcher> {
        if matchers.len() == 1 {
            return Ok(matchers.remove(0));
        }
        let matcher = DisjunctionMatcher::with_config(matchers, config)?;
        Ok(QueryMatcher::from(matcher))
    }

    /// Exclusions only need membership, never scores.
    fn flat_disjunction(mut matchers: Vec<QueryMatcher>) -> Result<QueryMatcher> {
        if matchers.len() == 1 {
            return Ok(matchers.remove(0));
        }
        Ok(QueryMatcher::from(DisjunctionMatcher::new(matchers)?))
    }
}
