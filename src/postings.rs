//! The postings collaborator interface and an in-memory implementation.
//!
//! Query execution only needs a [`PostingIterator`] per term: document ids
//! in increasing order, a per-document frequency and a position stream. On-disk
//! dictionaries and codecs live outside this crate; the in-memory lists here
//! back tests, benchmarks and small embedded indexes.

pub mod iterator;
pub mod posting;
pub mod union;

pub use self::iterator::{PostingIterator, VecPostingIterator};
pub use self::posting::{Posting, PostingList};
pub use self::union::UnionPostingIterator;
