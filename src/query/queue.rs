//! A min-heap of matchers keyed by their current document.
//!
//! The queue owns its matchers in an arena; the heap holds arena indices and
//! every entry caches its matcher's document so sifting never calls into the
//! matchers. After advancing the top matcher, callers re-sift with
//! [`MatcherQueue::update_top`].

use crate::query::QueryMatcher;
use crate::query::matcher::Matcher;
use crate::{DocId, NO_MORE_DOCS};

/// Per-matcher bookkeeping.
#[derive(Debug, Clone)]
struct QueueEntry {
    /// Cached current document of the matcher.
    doc: DocId,
    /// Cached cost of the matcher.
    cost: u64,
    /// Next entry in the last computed top list.
    next: Option<usize>,
}

fn left_node(node: usize) -> usize {
    2 * node + 1
}

fn parent_node(node: usize) -> usize {
    (node - 1) / 2
}

/// Binary min-heap over matchers ordered by document id.
#[derive(Debug)]
pub struct MatcherQueue {
    matchers: Vec<QueryMatcher>,
    entries: Vec<QueueEntry>,
    heap: Vec<usize>,
}

impl MatcherQueue {
    /// Create an empty queue.
    pub fn with_capacity(capacity: usize) -> Self {
        MatcherQueue {
            matchers: Vec::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
            heap: Vec::with_capacity(capacity),
        }
    }

    /// Create a queue holding all `matchers`.
    pub fn new(matchers: Vec<QueryMatcher>) -> Self {
        let mut queue = MatcherQueue::with_capacity(matchers.len());
        for matcher in matchers {
            queue.push(matcher);
        }
        queue
    }

    /// Add a matcher and return its arena index.
    pub fn push(&mut self, matcher: QueryMatcher) -> usize {
        let index = self.matchers.len();
        self.entries.push(QueueEntry {
            doc: matcher.doc_id(),
            cost: matcher.cost(),
            next: None,
        });
        self.matchers.push(matcher);
        self.heap.push(index);
        self.up_heap(self.heap.len() - 1);
        index
    }

    /// Remove the top entry from the heap. The matcher stays in the arena.
    pub fn pop(&mut self) -> Option<usize> {
        if self.heap.is_empty() {
            return None;
        }
        let top = self.heap.swap_remove(0);
        self.down_heap();
        Some(top)
    }

    /// Arena index of the entry with the smallest document.
    pub fn top(&self) -> Option<usize> {
        self.heap.first().copied()
    }

    /// Smallest cached document, `NO_MORE_DOCS` when the heap is empty.
    pub fn top_doc(&self) -> DocId {
        self.top().map_or(NO_MORE_DOCS, |top| self.entries[top].doc)
    }

    /// Re-read the top matcher's document and restore heap order.
    pub fn update_top(&mut self) -> Option<usize> {
        let top = self.top()?;
        self.entries[top].doc = self.matchers[top].doc_id();
        self.down_heap();
        self.top()
    }

    /// Link every entry sitting on the top document into a list.
    ///
    /// Returns the head; follow the list with [`next_tied`](Self::next_tied).
    /// Only subtrees whose root is on the top document are visited.
    pub fn top_list(&mut self) -> Option<usize> {
        let head = self.top()?;
        self.entries[head].next = None;
        let doc = self.entries[head].doc;
        let size = self.heap.len();
        let mut list = head;
        if size >= 3 {
            list = self.collect_ties(list, doc, 1);
            list = self.collect_ties(list, doc, 2);
        } else if size == 2 && self.entries[self.heap[1]].doc == doc {
            list = self.prepend(self.heap[1], list);
        }
        Some(list)
    }

    /// The entry after `index` in the last computed top list.
    pub fn next_tied(&self, index: usize) -> Option<usize> {
        self.entries[index].next
    }

    /// Iterate a top list starting at `head`.
    pub fn tied(&self, head: Option<usize>) -> TopList<'_> {
        TopList {
            entries: &self.entries,
            next: head,
        }
    }

    fn collect_ties(&mut self, mut list: usize, doc: DocId, node: usize) -> usize {
        let index = self.heap[node];
        if self.entries[index].doc == doc {
            list = self.prepend(index, list);
            let left = left_node(node);
            let right = left + 1;
            let size = self.heap.len();
            if right < size {
                list = self.collect_ties(list, doc, left);
                list = self.collect_ties(list, doc, right);
            } else if left < size && self.entries[self.heap[left]].doc == doc {
                list = self.prepend(self.heap[left], list);
            }
        }
        list
    }

    fn prepend(&mut self, index: usize, list: usize) -> usize {
        self.entries[index].next = Some(list);
        index
    }

    /// The matcher stored at arena `index`.
    pub fn matcher(&self, index: usize) -> &QueryMatcher {
        &self.matchers[index]
    }

    /// Mutable access to the matcher stored at arena `index`.
    ///
    /// Moving the matcher leaves its cached document stale until the entry
    /// is re-sifted.
    pub fn matcher_mut(&mut self, index: usize) -> &mut QueryMatcher {
        &mut self.matchers[index]
    }

    /// All matchers in arena order.
    pub fn matchers(&self) -> &[QueryMatcher] {
        &self.matchers
    }

    /// All matchers in arena order, mutably.
    pub fn matchers_mut(&mut self) -> &mut [QueryMatcher] {
        &mut self.matchers
    }

    /// Cached document of arena `index`.
    pub fn doc(&self, index: usize) -> DocId {
        self.entries[index].doc
    }

    /// Sum of the cached costs of all matchers.
    pub fn total_cost(&self) -> u64 {
        self.entries.iter().map(|entry| entry.cost).sum()
    }

    /// Number of entries in the heap.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Check if the heap is empty.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn up_heap(&mut self, mut i: usize) {
        let node = self.heap[i];
        let node_doc = self.entries[node].doc;
        while i > 0 {
            let parent = parent_node(i);
            if node_doc >= self.entries[self.heap[parent]].doc {
                break;
            }
            self.heap[i] = self.heap[parent];
            i = parent;
        }
        self.heap[i] = node;
    }

    fn down_heap(&mut self) {
        let size = self.heap.len();
        if size == 0 {
            return;
        }
        let node = self.heap[0];
        let node_doc = self.entries[node].doc;
        let mut i = 0;
        loop {
            let mut j = left_node(i);
            if j >= size {
                break;
            }
            let k = j + 1;
            if k < size && self.entries[self.heap[k]].doc < self.entries[self.heap[j]].doc {
                j = k;
            }
            if self.entries[self.heap[j]].doc >= node_doc {
                break;
            }
            self.heap[i] = self.heap[j];
            i = j;
        }
        self.heap[i] = node;
    }
}

/// Iterator over a linked top list.
#[derive(Debug)]
pub struct TopList<'a> {
    entries: &'a [QueueEntry],
    next: Option<usize>,
}

impl Iterator for TopList<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let current = self.next?;
        self.next = self.entries[current].next;
        Some(current)
    }
}
