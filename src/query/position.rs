//! Position intervals and the queue that merges per-document position streams.
//!
//! A [`PositionQueue`] sits inside a combinator and turns the position streams
//! of its children into one stream ordered by interval start. It does not own
//! the children: every call borrows the combinator's child slice.

use std::fmt;

use crate::error::Result;
use crate::query::QueryMatcher;
use crate::query::matcher::Matcher;
use crate::{DocId, NO_MORE_DOCS, NO_MORE_POSITIONS, Position};

/// A matched span of positions, with optional byte offsets.
///
/// The producing matcher owns its interval and overwrites it in place on the
/// next position read.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    /// First position of the span.
    pub begin: Position,
    /// Last position of the span (inclusive).
    pub end: Position,
    /// Start byte offset, `-1` if not recorded.
    pub offset_begin: i32,
    /// End byte offset, `-1` if not recorded.
    pub offset_end: i32,
}

impl Interval {
    /// The reset interval; compares below every real interval.
    pub const EMPTY: Interval = Interval {
        begin: i32::MIN,
        end: i32::MIN,
        offset_begin: -1,
        offset_end: -1,
    };

    /// Create a new interval.
    pub const fn new(begin: Position, end: Position, offset_begin: i32, offset_end: i32) -> Self {
        Interval {
            begin,
            end,
            offset_begin,
            offset_end,
        }
    }

    /// A single-position interval.
    pub const fn at(position: Position) -> Self {
        Interval::new(position, position, -1, -1)
    }

    /// Reset so the interval compares below everything.
    pub fn reset(&mut self) {
        *self = Interval::EMPTY;
    }

    /// Mark the interval as exhausted; it then compares above everything.
    pub fn set_maximum(&mut self) {
        self.begin = NO_MORE_POSITIONS;
        self.end = NO_MORE_POSITIONS;
        self.offset_begin = -1;
        self.offset_end = -1;
    }

    /// Whether this interval was exhausted with [`set_maximum`](Self::set_maximum).
    pub fn is_exhausted(&self) -> bool {
        self.begin == NO_MORE_POSITIONS
    }

    /// Copy all bounds from `other`.
    pub fn update_from(&mut self, other: &Interval) {
        *self = *other;
    }

    /// Take the start of `start` and the end of `end`.
    pub fn update_span(&mut self, start: &Interval, end: &Interval) {
        self.begin = start.begin;
        self.offset_begin = start.offset_begin;
        self.end = end.end;
        self.offset_end = end.offset_end;
    }

    /// Whether `other` lies within this interval.
    pub fn contains(&self, other: &Interval) -> bool {
        self.begin <= other.begin && other.end <= self.end
    }

    /// Whether one of the two intervals contains the other.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// Whether this interval starts and ends strictly before `other`.
    pub fn less_than_exclusive(&self, other: &Interval) -> bool {
        self.begin < other.begin && self.end < other.end
    }
}

impl Default for Interval {
    fn default() -> Self {
        Interval::EMPTY
    }
}

impl fmt::Debug for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Interval[{}({})..{}({})]",
            self.begin, self.offset_begin, self.end, self.offset_end
        )
    }
}

/// One child stream in the queue.
#[derive(Debug, Clone)]
struct PositionEntry {
    /// Index of the child in the owner's matcher slice.
    child: usize,
    /// Document the buffered interval belongs to, `NO_MORE_DOCS` once dead.
    doc: DocId,
    interval: Interval,
}

impl PositionEntry {
    fn less_than(&self, other: &PositionEntry) -> bool {
        (self.doc, self.interval.begin) < (other.doc, other.interval.begin)
    }

    fn exhaust(&mut self) {
        self.doc = NO_MORE_DOCS;
        self.interval.set_maximum();
    }

    /// Buffer the child's next interval on `doc`; false if the stream is done.
    fn read_next(&mut self, matchers: &mut [QueryMatcher], doc: DocId) -> Result<bool> {
        let matcher = &mut matchers[self.child];
        if doc == NO_MORE_DOCS || matcher.doc_id() != doc || !matcher.has_positions() {
            self.exhaust();
            return Ok(false);
        }
        if matcher.next_position()? == NO_MORE_POSITIONS {
            self.exhaust();
            return Ok(false);
        }
        self.doc = doc;
        self.interval.update_from(matcher.interval());
        Ok(true)
    }
}

/// Merges the position streams of several children on one document.
#[derive(Debug, Clone)]
pub struct PositionQueue {
    /// Binary min-heap ordered by `(doc, interval.begin)`.
    heap: Vec<PositionEntry>,
    doc: DocId,
    positioned: bool,
    /// Entries whose stream is not yet exhausted.
    live: usize,
    current: Interval,
}

impl PositionQueue {
    /// Create a queue over children `0..children` of the owner's slice.
    pub fn new(children: usize) -> Self {
        let heap = (0..children)
            .map(|child| PositionEntry {
                child,
                doc: NO_MORE_DOCS,
                interval: Interval::EMPTY,
            })
            .collect();
        PositionQueue {
            heap,
            doc: -1,
            positioned: false,
            live: 0,
            current: Interval::EMPTY,
        }
    }

    /// Prepare for reading positions on `doc`.
    ///
    /// Nothing is read until the next [`next_position`](Self::next_position).
    pub fn advance_to(&mut self, doc: DocId) {
        self.doc = doc;
        self.positioned = false;
        self.live = 0;
        self.current.reset();
    }

    /// Read the next interval in start order across all children.
    pub fn next_position(&mut self, matchers: &mut [QueryMatcher]) -> Result<Position> {
        if !self.positioned {
            self.positioned = true;
            self.live = 0;
            for entry in self.heap.iter_mut() {
                if entry.read_next(matchers, self.doc)? {
                    self.live += 1;
                }
            }
            for i in (0..self.heap.len() / 2).rev() {
                self.sift_down(i);
            }
        } else {
            if self.live == 0 {
                return Ok(NO_MORE_POSITIONS);
            }
            if !self.heap[0].read_next(matchers, self.doc)? {
                self.live -= 1;
            }
            self.sift_down(0);
        }

        if self.live == 0 {
            self.current.set_maximum();
            return Ok(NO_MORE_POSITIONS);
        }
        self.current.update_from(&self.heap[0].interval);
        Ok(self.current.begin)
    }

    /// The interval reported by the last `next_position` call.
    pub fn interval(&self) -> &Interval {
        &self.current
    }

    /// Number of children with positions left on the current document.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Number of child streams.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Check if the queue has no child streams.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn sift_down(&mut self, mut i: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * i + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let smallest = if right < len && self.heap[right].less_than(&self.heap[left]) {
                right
            } else {
                left
            };
            if !self.heap[smallest].less_than(&self.heap[i]) {
                break;
            }
            self.heap.swap(i, smallest);
            i = smallest;
        }
    }
}
