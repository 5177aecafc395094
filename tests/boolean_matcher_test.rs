//! Integration tests for boolean matcher trees.

mod common;

use std::collections::BTreeSet;
use std::io::Write;

use common::{TestIndex, collect};
use halberd::prelude::*;
use halberd::query::{
    BooleanMatcherBuilder, ChildMatcher, ConjunctionMatcher, DisjunctionMatcher, MatcherConfig,
    ReqExclMatcher, ReqOptMatcher,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::NamedTempFile;

fn library() -> TestIndex {
    TestIndex::new(&[
        "python programming for beginners",
        "javascript web development",
        "cooking with python",
        "advanced python web frameworks",
        "web design basics",
    ])
}

#[test]
fn test_must_and_must_not() -> Result<()> {
    let index = library();

    let mut matcher = BooleanMatcherBuilder::new()
        .must(index.term("python"))
        .must_not(index.term("cooking"))
        .build()?;
    assert_eq!(collect(&mut matcher)?, vec![0, 3]);

    let mut matcher = BooleanMatcherBuilder::new()
        .should(index.term("web"))
        .should(index.term("python"))
        .must_not(index.term("javascript"))
        .must_not(index.term("design"))
        .build()?;
    assert_eq!(collect(&mut matcher)?, vec![0, 2, 3]);

    Ok(())
}

#[test]
fn test_optional_clause_raises_score() -> Result<()> {
    let index = library();
    let mut matcher = BooleanMatcherBuilder::new()
        .must(index.term("python"))
        .should(index.term("web"))
        .build()?;

    let mut scores = Vec::new();
    while matcher.next_doc()? != NO_MORE_DOCS {
        scores.push((matcher.doc_id(), matcher.score()?));
    }
    assert_eq!(scores, vec![(0, 1.0), (2, 1.0), (3, 2.0)]);
    Ok(())
}

#[test]
fn test_nested_trees() -> Result<()> {
    let index = library();
    // (python OR javascript) AND web AND NOT frameworks
    let either = DisjunctionMatcher::new(vec![index.term("python"), index.term("javascript")])?;
    let both = ConjunctionMatcher::new(vec![QueryMatcher::from(either), index.term("web")])?;
    let mut matcher = ReqExclMatcher::new(QueryMatcher::from(both), index.term("frameworks"));

    assert_eq!(collect(&mut matcher)?, vec![1]);
    Ok(())
}

fn describe(child: &ChildMatcher<'_>, depth: usize, out: &mut Vec<String>) {
    out.push(format!(
        "{}{} {}",
        "  ".repeat(depth),
        child.relationship(),
        child.matcher.name()
    ));
    for grandchild in child.matcher.children() {
        describe(&grandchild, depth + 1, out);
    }
}

#[test]
fn test_tree_introspection() -> Result<()> {
    let index = library();
    let matcher = BooleanMatcherBuilder::new()
        .must(index.term("python"))
        .must(index.term("web"))
        .should(index.term("advanced"))
        .must_not(index.term("cooking"))
        .build()?;

    assert_eq!(matcher.name(), "ReqExcl");
    let mut lines = Vec::new();
    for child in matcher.children() {
        describe(&child, 0, &mut lines);
    }
    assert_eq!(
        lines,
        vec![
            "MUST ReqOpt",
            "  MUST Conjunction",
            "    MUST Term",
            "    MUST Term",
            "  SHOULD Term",
            "MUST_NOT Term",
        ]
    );
    Ok(())
}

#[test]
fn test_conjunction_positions_merge_children() -> Result<()> {
    let index = TestIndex::new(&["the quick brown fox jumps over the lazy dog"]);
    let mut matcher = ConjunctionMatcher::new(vec![index.term("fox"), index.term("the")])?;

    assert_eq!(matcher.next_doc()?, 0);
    let mut positions = Vec::new();
    loop {
        let position = matcher.next_position()?;
        if position == NO_MORE_POSITIONS {
            break;
        }
        positions.push(position);
    }
    assert_eq!(positions, vec![0, 3, 6]);
    Ok(())
}

#[test]
fn test_req_opt_with_boolean_required() -> Result<()> {
    let index = library();
    let required = BooleanMatcherBuilder::new()
        .should(index.term("web"))
        .should(index.term("cooking"))
        .build()?;
    let mut matcher = ReqOptMatcher::new(required, index.term("python"));

    assert_eq!(collect(&mut matcher)?, vec![1, 2, 3, 4]);
    Ok(())
}

#[test]
fn test_config_from_file() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    write!(
        file,
        r#"{{"max_clause_count": 2, "coord_enabled": false}}"#
    )?;

    let config = MatcherConfig::from_file(file.path())?;
    assert_eq!(config.max_clause_count, 2);
    assert!(!config.coord_enabled);
    assert_eq!(config.default_slop, 0);

    let index = library();
    let result = BooleanMatcherBuilder::with_config(config)
        .should(index.term("web"))
        .should(index.term("python"))
        .should(index.term("cooking"))
        .build();
    assert!(matches!(
        result,
        Err(HalberdError::TooManyClauses { count: 3, max: 2 })
    ));
    Ok(())
}

#[test]
fn test_random_trees_match_set_algebra() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(2024);
    let vocabulary = ["a", "b", "c", "d", "e", "f"];

    for _ in 0..25 {
        let mut index = TestIndex::default();
        let mut docs: Vec<BTreeSet<&str>> = Vec::new();
        for _ in 0..120 {
            let words: Vec<&str> = vocabulary
                .iter()
                .copied()
                .filter(|_| rng.random_bool(0.35))
                .collect();
            index.add(&words.join(" "));
            docs.push(words.into_iter().collect());
        }

        // (a AND b) OR c, minus d
        let must = ConjunctionMatcher::new(vec![index.term("a"), index.term("b")])?;
        let positive = DisjunctionMatcher::new(vec![QueryMatcher::from(must), index.term("c")])?;
        let mut matcher = ReqExclMatcher::new(QueryMatcher::from(positive), index.term("d"));

        let expected: Vec<DocId> = docs
            .iter()
            .enumerate()
            .filter(|(_, words)| {
                ((words.contains("a") && words.contains("b")) || words.contains("c"))
                    && !words.contains("d")
            })
            .map(|(doc, _)| doc as DocId)
            .collect();
        assert_eq!(collect(&mut matcher)?, expected);
    }
    Ok(())
}
