//! # Halberd
//!
//! The query execution core of a full-text search engine: sorted document-id
//! iterators, the boolean combinators built from them, and position-aware
//! matchers up to sloppy phrase matching.
//!
//! ## Features
//!
//! - Pure Rust implementation
//! - Cost-led conjunctions and heap-merged disjunctions
//! - Lazy required/optional scoring
//! - Position merging for highlighting and proximity
//! - Sloppy phrase matching with repeated-term resolution
//! - Pluggable scoring (BM25 included)
//!
//! ```
//! use halberd::postings::{Posting, PostingList};
//! use halberd::query::{ConjunctionMatcher, Matcher, QueryMatcher, TermMatcher};
//! use halberd::NO_MORE_DOCS;
//!
//! let mut quick = PostingList::new("quick");
//! quick.add_posting(Posting::with_positions(1, vec![0]));
//! quick.add_posting(Posting::with_positions(5, vec![0, 10]));
//! let mut fox = PostingList::new("fox");
//! fox.add_posting(Posting::with_positions(5, vec![2]));
//!
//! let mut matcher = ConjunctionMatcher::new(vec![
//!     QueryMatcher::from(TermMatcher::from_list(&quick)),
//!     QueryMatcher::from(TermMatcher::from_list(&fox)),
//! ])
//! .unwrap();
//! assert_eq!(matcher.next_doc().unwrap(), 5);
//! assert_eq!(matcher.next_doc().unwrap(), NO_MORE_DOCS);
//! ```

pub mod error;
pub mod postings;
pub mod query;

/// Identifier of a document within one iteration scope.
///
/// Real ids are non-negative; `-1` is the "not yet positioned" state.
pub type DocId = i32;

/// Token offset of a term within a document.
pub type Position = i32;

/// Returned by `next_doc`/`advance`/`doc_id` once an iterator is exhausted.
pub const NO_MORE_DOCS: DocId = i32::MAX;

/// Returned by `next_position` once a document's positions are exhausted.
pub const NO_MORE_POSITIONS: Position = i32::MAX;

/// Document id reported by iterators that have not been advanced yet.
pub const UNPOSITIONED: DocId = -1;

pub mod prelude {
    pub use crate::error::{HalberdError, Result};
    pub use crate::postings::{Posting, PostingIterator, PostingList};
    pub use crate::query::{Matcher, QueryMatcher};
    pub use crate::{DocId, NO_MORE_DOCS, NO_MORE_POSITIONS, Position};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
