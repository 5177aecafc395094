//! Sloppy phrase matching.
//!
//! A sloppy phrase matches when its terms occur within a window whose
//! length, counted in moves needed to line the terms up in query order, is
//! at most the slop. Each phrase term is tracked by a [`PhrasePositions`]
//! cursor whose position is phrase-relative (`position - phrase_offset`),
//! so an exact phrase is a set of cursors on one position.
//!
//! The cursors sit in a ring for document-level alignment (the least
//! advanced cursor is always `min`, the most advanced the one before it) and
//! in a priority queue for position-level window search.
//!
//! Query terms that occur more than once (`"a b a"`) would otherwise let one
//! token stand for several query positions. Such cursors are grouped on the
//! first candidate document and kept on distinct tokens ("collisions" are
//! resolved by moving the lesser cursor on).
//!
//! Not every valid slop combination is enumerated: the window search always
//! moves the least cursor, so for a document `"a b c b a"` the queries
//! `"a b c"~4` and `"c b a"~4` get different frequencies although they are
//! equivalent.

use ahash::{AHashMap, AHashSet};
use bit_vec::BitVec;

use crate::error::{HalberdError, Result};
use crate::postings::{PostingIterator, PostingList, UnionPostingIterator};
use crate::query::config::MatcherConfig;
use crate::query::matcher::{Matcher, Poison};
use crate::query::position::Interval;
use crate::query::scorer::Scorer;
use crate::{DocId, NO_MORE_DOCS, NO_MORE_POSITIONS, Position, UNPOSITIONED};

/// One query position of a phrase.
#[derive(Debug)]
pub struct PhraseTerm {
    /// Postings to read documents and positions from.
    pub postings: Box<dyn PostingIterator>,
    /// Position of this term within the query phrase.
    pub phrase_offset: i32,
    /// Terms behind `postings`; more than one for multi-term positions.
    pub terms: Vec<String>,
}

impl PhraseTerm {
    /// A query position satisfied by a single term.
    pub fn new<T: Into<String>>(
        term: T,
        postings: Box<dyn PostingIterator>,
        phrase_offset: i32,
    ) -> Self {
        PhraseTerm {
            postings,
            phrase_offset,
            terms: vec![term.into()],
        }
    }

    /// A query position over an in-memory posting list.
    pub fn from_list(list: &PostingList, phrase_offset: i32) -> Self {
        PhraseTerm::new(list.term.clone(), Box::new(list.iterator()), phrase_offset)
    }

    /// A query position satisfied by any of several terms.
    pub fn union(lists: &[PostingList], phrase_offset: i32) -> Self {
        let subs = lists
            .iter()
            .map(|list| Box::new(list.iterator()) as Box<dyn PostingIterator>)
            .collect();
        PhraseTerm {
            postings: Box::new(UnionPostingIterator::new(subs)),
            phrase_offset,
            terms: lists.iter().map(|list| list.term.clone()).collect(),
        }
    }
}

/// Cursor over one phrase term's documents and positions.
#[derive(Debug)]
struct PhrasePositions {
    postings: Box<dyn PostingIterator>,
    doc: DocId,
    /// Phrase-relative position.
    position: Position,
    /// Positions left on the current document.
    count: u32,
    /// Phrase offset of the term.
    offset: i32,
    /// Unique across the cursors of one matcher.
    ord: usize,
    /// Repetition group, if the term repeats in the phrase.
    rpt_group: Option<usize>,
    /// Index within the repetition group.
    rpt_ind: usize,
    terms: Vec<String>,
}

impl PhrasePositions {
    fn new(term: PhraseTerm, ord: usize) -> Self {
        PhrasePositions {
            postings: term.postings,
            doc: UNPOSITIONED,
            position: 0,
            count: 0,
            offset: term.phrase_offset,
            ord,
            rpt_group: None,
            rpt_ind: 0,
            terms: term.terms,
        }
    }

    /// Read the first position on the current document.
    fn first_position(&mut self) -> Result<bool> {
        self.count = self.postings.freq();
        self.next_position()
    }

    /// Move to the next position; false when the document has no more.
    fn next_position(&mut self) -> Result<bool> {
        if self.count == 0 {
            return Ok(false);
        }
        self.count -= 1;
        let position = self.postings.next_position()?;
        if position == NO_MORE_POSITIONS {
            self.count = 0;
            return Ok(false);
        }
        self.position = position - self.offset;
        Ok(true)
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        self.doc = self.postings.advance(target)?;
        Ok(self.doc != NO_MORE_DOCS)
    }

    /// Absolute position in the document.
    fn tp_pos(&self) -> Position {
        self.position + self.offset
    }

    fn start_offset(&self) -> i32 {
        self.postings.start_offset()
    }

    fn end_offset(&self) -> i32 {
        self.postings.end_offset()
    }
}

/// Orders cursors by position, then phrase offset, then ordinal.
fn pp_less(a: &PhrasePositions, b: &PhrasePositions) -> bool {
    (a.position, a.offset, a.ord) < (b.position, b.offset, b.ord)
}

/// Min-heap of cursor indices.
#[derive(Debug, Default)]
struct PhraseQueue {
    heap: Vec<usize>,
}

impl PhraseQueue {
    fn with_capacity(capacity: usize) -> Self {
        PhraseQueue {
            heap: Vec::with_capacity(capacity),
        }
    }

    fn len(&self) -> usize {
        self.heap.len()
    }

    fn clear(&mut self) {
        self.heap.clear();
    }

    fn top(&self) -> Option<usize> {
        self.heap.first().copied()
    }

    fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.heap.iter().copied()
    }

    fn add(&mut self, pps: &[PhrasePositions], pp: usize) {
        self.heap.push(pp);
        let mut i = self.heap.len() - 1;
        while i > 0 {
            let parent = (i - 1) / 2;
            if !pp_less(&pps[pp], &pps[self.heap[parent]]) {
                break;
            }
            self.heap[i] = self.heap[parent];
            i = parent;
        }
        self.heap[i] = pp;
    }

    fn pop(&mut self, pps: &[PhrasePositions]) -> Option<usize> {
        if self.heap.is_empty() {
            return None;
        }
        let top = self.heap.swap_remove(0);
        let size = self.heap.len();
        if size > 1 {
            let node = self.heap[0];
            let mut i = 0;
            loop {
                let mut j = 2 * i + 1;
                if j >= size {
                    break;
                }
                if j + 1 < size && pp_less(&pps[self.heap[j + 1]], &pps[self.heap[j]]) {
                    j += 1;
                }
                if !pp_less(&pps[self.heap[j]], &pps[node]) {
                    break;
                }
                self.heap[i] = self.heap[j];
                i = j;
            }
            self.heap[i] = node;
        }
        Some(top)
    }
}

/// Repetition groups, computed once on the first candidate document.
#[derive(Debug, Default)]
struct Repeats {
    /// Whether the check ran.
    checked: bool,
    /// Whether any term repeats.
    present: bool,
    /// Whether a repeating cursor reads several terms.
    multi_term: bool,
    /// Cursor indices per group, sorted by phrase offset.
    groups: Vec<Vec<usize>>,
    /// Per-group marks of cursors to re-queue after a collision.
    bits: Vec<BitVec>,
    /// Scratch stack for re-queuing.
    stack: Vec<usize>,
}

/// Matches documents where the phrase terms occur within `slop` moves of
/// their query arrangement.
///
/// ```
/// use halberd::postings::PostingList;
/// use halberd::query::{ConstantScorer, Matcher, PhraseTerm, SloppyPhraseMatcher};
///
/// let quick = PostingList::from_positions("quick", [(5, vec![0, 10])]);
/// let fox = PostingList::from_positions("fox", [(5, vec![2])]);
/// let mut matcher = SloppyPhraseMatcher::new(
///     vec![PhraseTerm::from_list(&quick, 0), PhraseTerm::from_list(&fox, 1)],
///     1,
///     Box::new(ConstantScorer::default()),
/// )
/// .unwrap();
///
/// assert_eq!(matcher.next_doc().unwrap(), 5);
/// assert_eq!(matcher.freq().unwrap(), 0.5);
/// ```
#[derive(Debug)]
pub struct SloppyPhraseMatcher {
    pps: Vec<PhrasePositions>,
    /// Ring index of the least advanced cursor.
    min: usize,
    doc: DocId,
    slop: i32,
    scorer: Box<dyn Scorer>,
    pq: PhraseQueue,
    cost: u64,
    /// Largest phrase-relative position among the cursors.
    current_end: Position,
    /// Largest absolute position among the cursors.
    current_real_end: Position,
    current_end_offset: i32,
    span_end: Position,
    span_offset_end: i32,
    match_length: i32,
    /// Span of the last reported match.
    interval: Interval,
    /// Matches found on the current document with their lengths, in
    /// search order. Reused across documents.
    matches: Vec<(Interval, i32)>,
    /// Number of buffered matches handed out by `next_position`.
    replayed: usize,
    /// The window search has found every match on the current document.
    searched: bool,
    /// Sum of slop factors of the matches produced on this document.
    accumulated: f32,
    sloppy_freq: Option<f32>,
    repeats: Repeats,
    poison: Poison,
}

impl SloppyPhraseMatcher {
    /// Create a sloppy phrase matcher over at least two phrase terms.
    pub fn new(terms: Vec<PhraseTerm>, slop: u32, scorer: Box<dyn Scorer>) -> Result<Self> {
        if terms.len() < 2 {
            return Err(HalberdError::invalid_argument(format!(
                "phrase needs at least 2 terms, got {}",
                terms.len()
            )));
        }
        let cost = terms.iter().map(|term| term.postings.cost()).min().unwrap_or(0);
        let pps: Vec<PhrasePositions> = terms
            .into_iter()
            .enumerate()
            .map(|(ord, term)| PhrasePositions::new(term, ord))
            .collect();
        let pq = PhraseQueue::with_capacity(pps.len());
        Ok(SloppyPhraseMatcher {
            pps,
            min: 0,
            doc: UNPOSITIONED,
            slop: i32::try_from(slop).unwrap_or(i32::MAX),
            scorer,
            pq,
            cost,
            current_end: i32::MIN,
            current_real_end: i32::MIN,
            current_end_offset: -1,
            span_end: -1,
            span_offset_end: -1,
            match_length: 0,
            interval: Interval::EMPTY,
            matches: Vec::new(),
            replayed: 0,
            searched: false,
            accumulated: 0.0,
            sloppy_freq: None,
            repeats: Repeats::default(),
            poison: Poison::default(),
        })
    }

    /// Create a matcher using the config's clause cap and default slop.
    pub fn with_config(
        terms: Vec<PhraseTerm>,
        scorer: Box<dyn Scorer>,
        config: &MatcherConfig,
    ) -> Result<Self> {
        config.check_clause_count(terms.len())?;
        Self::new(terms, config.default_slop, scorer)
    }

    /// The allowed slop.
    pub fn slop(&self) -> u32 {
        self.slop as u32
    }

    /// Number of phrase terms.
    pub fn len(&self) -> usize {
        self.pps.len()
    }

    /// Always false: a phrase has at least two terms.
    pub fn is_empty(&self) -> bool {
        self.pps.is_empty()
    }

    /// Length of the last reported match; `0` for an exact phrase.
    pub fn match_length(&self) -> i32 {
        self.match_length
    }

    /// Whether repeated terms were found. Only known after the first
    /// candidate document.
    pub fn has_repeats(&self) -> bool {
        self.repeats.present
    }

    /// Sum of slop factors of all matches on the current document.
    pub fn sloppy_freq(&mut self) -> Result<f32> {
        if let Some(freq) = self.sloppy_freq {
            return Ok(freq);
        }
        if !self.searched {
            while !self.searched {
                self.search_next()?;
            }
            self.restore_current();
        }
        self.sloppy_freq = Some(self.accumulated);
        Ok(self.accumulated)
    }

    /// Index of the most advanced cursor in the ring.
    fn max(&self) -> usize {
        (self.min + self.pps.len() - 1) % self.pps.len()
    }

    /// Advance the least advanced cursor to `target` and rotate the ring.
    fn advance_min(&mut self, target: DocId) -> Result<bool> {
        if !self.pps[self.min].skip_to(target)? {
            return Ok(false);
        }
        self.min = (self.min + 1) % self.pps.len();
        Ok(true)
    }

    fn advance_inner(&mut self, mut target: DocId) -> Result<DocId> {
        loop {
            if !self.advance_min(target)? {
                return Ok(NO_MORE_DOCS);
            }
            while self.pps[self.min].doc < self.pps[self.max()].doc {
                let lagging_target = self.pps[self.max()].doc;
                if !self.advance_min(lagging_target)? {
                    return Ok(NO_MORE_DOCS);
                }
            }
            // All cursors share one document.
            let doc = self.pps[self.min].doc;
            self.doc = doc;
            if self.first_position()? != NO_MORE_POSITIONS {
                return Ok(doc);
            }
            log::trace!("doc {}: all phrase terms present, no match within slop", doc);
            target = doc + 1;
        }
    }

    /// Find the first match on a document where all terms occur.
    fn first_position(&mut self) -> Result<Position> {
        self.matches.clear();
        self.replayed = 0;
        self.searched = false;
        self.accumulated = 0.0;
        self.sloppy_freq = None;
        if !self.init_phrase_positions()? {
            self.searched = true;
            return Ok(NO_MORE_POSITIONS);
        }
        let position = self.search_next()?;
        self.restore_current();
        Ok(position)
    }

    /// Hand out the next match on the current document.
    ///
    /// Matches already found by a frequency computation are replayed from
    /// the buffer; the window search only resumes past them.
    fn next_match(&mut self) -> Result<Position> {
        if self.replayed == self.matches.len() && !self.searched {
            self.search_next()?;
        }
        match self.matches.get(self.replayed) {
            Some(&(interval, match_length)) => {
                self.replayed += 1;
                self.interval = interval;
                self.match_length = match_length;
                Ok(interval.begin)
            }
            None => {
                self.interval.set_maximum();
                Ok(NO_MORE_POSITIONS)
            }
        }
    }

    /// Find one more match and buffer it.
    fn search_next(&mut self) -> Result<Position> {
        let position = self.do_next_position()?;
        if position == NO_MORE_POSITIONS {
            self.searched = true;
        }
        Ok(position)
    }

    /// Point the interval back at the last match handed out, since the
    /// window search overwrites it.
    fn restore_current(&mut self) {
        match self.replayed.checked_sub(1).map(|last| self.matches[last]) {
            Some((interval, match_length)) => {
                self.interval = interval;
                self.match_length = match_length;
            }
            None => {
                self.interval.reset();
                self.match_length = 0;
            }
        }
    }

    fn queue_top_position(&self) -> Position {
        self.pq
            .top()
            .map_or(NO_MORE_POSITIONS, |top| self.pps[top].position)
    }

    /// Search the next window within slop.
    fn do_next_position(&mut self) -> Result<Position> {
        if self.pq.len() < self.pps.len() {
            return Ok(NO_MORE_POSITIONS);
        }
        let Some(mut top) = self.pq.pop(&self.pps) else {
            return Ok(NO_MORE_POSITIONS);
        };
        self.match_length = self.current_end - self.pps[top].position;
        let mut next = self.queue_top_position();
        let mut pos = self.pps[top].tp_pos();
        let mut start_offset = self.pps[top].start_offset();
        self.span_end = self.current_real_end;
        self.span_offset_end = self.current_end_offset;

        while self.advance_pp(top)? {
            if self.repeats.present && !self.advance_rpts(top)? {
                break;
            }
            if self.pps[top].position > next {
                // Done minimizing the current window.
                if self.match_length <= self.slop {
                    self.set_span_start(pos, start_offset);
                    self.pq.add(&self.pps, top);
                    return Ok(self.report_match());
                }
                self.pq.add(&self.pps, top);
                top = match self.pq.pop(&self.pps) {
                    Some(top) => top,
                    None => return Ok(NO_MORE_POSITIONS),
                };
                next = self.queue_top_position();
                self.match_length = self.current_end - self.pps[top].position;
            } else {
                let match_length = self.current_end - self.pps[top].position;
                if match_length < self.match_length {
                    self.match_length = match_length;
                }
            }
            pos = self.pps[top].tp_pos();
            start_offset = self.pps[top].start_offset();
            self.span_end = self.current_real_end;
            self.span_offset_end = self.current_end_offset;
        }

        if self.match_length <= self.slop {
            self.set_span_start(pos, start_offset);
            return Ok(self.report_match());
        }
        Ok(NO_MORE_POSITIONS)
    }

    fn report_match(&mut self) -> Position {
        self.accumulated += self.scorer.slop_factor(self.match_length);
        self.matches.push((self.interval, self.match_length));
        log::trace!(
            "doc {}: phrase match {:?} of length {}",
            self.doc,
            self.interval,
            self.match_length
        );
        self.interval.begin
    }

    /// The span starts at the least absolute position still in the window.
    fn set_span_start(&mut self, top_pos: Position, top_start_offset: i32) {
        let mut start = top_pos;
        let mut start_offset = top_start_offset;
        for pp in self.pq.iter().map(|i| &self.pps[i]) {
            start = start.min(pp.tp_pos());
            start_offset = start_offset.min(pp.start_offset());
        }
        self.interval = Interval::new(start, self.span_end, start_offset, self.span_offset_end);
    }

    /// Advance a cursor and track the window end; false if exhausted.
    fn advance_pp(&mut self, pp: usize) -> Result<bool> {
        if !self.pps[pp].next_position()? {
            return Ok(false);
        }
        self.update_ends(pp);
        Ok(true)
    }

    fn update_ends(&mut self, pp: usize) {
        let cursor = &self.pps[pp];
        if cursor.position > self.current_end {
            self.current_end = cursor.position;
        }
        if cursor.tp_pos() > self.current_real_end {
            self.current_real_end = cursor.tp_pos();
            self.current_end_offset = cursor.end_offset();
        }
    }

    /// `pp` was just advanced. Resolve the collision it may have caused by
    /// advancing the lesser of the two colliding cursors, then re-queue the
    /// cursors moved meanwhile.
    fn advance_rpts(&mut self, pp: usize) -> Result<bool> {
        let Some(group) = self.pps[pp].rpt_group else {
            return Ok(true);
        };
        self.repeats.bits[group].clear();
        let k0 = self.pps[pp].rpt_ind;
        let mut pp = pp;
        while let Some(k) = self.collide(pp) {
            pp = self.lesser(pp, self.repeats.groups[group][k]);
            if !self.advance_pp(pp)? {
                return Ok(false);
            }
            if k != k0 {
                self.repeats.bits[group].set(k, true);
            }
        }

        // Empty the queue until every marked cursor was taken out.
        self.repeats.stack.clear();
        while self.repeats.bits[group].any() {
            let Some(queued) = self.pq.pop(&self.pps) else {
                break;
            };
            self.repeats.stack.push(queued);
            let cursor = &self.pps[queued];
            if cursor.rpt_group == Some(group) {
                self.repeats.bits[group].set(cursor.rpt_ind, false);
            }
        }
        while let Some(queued) = self.repeats.stack.pop() {
            self.pq.add(&self.pps, queued);
        }
        Ok(true)
    }

    /// Compare by position and phrase offset only.
    fn lesser(&self, pp: usize, pp2: usize) -> usize {
        let (a, b) = (&self.pps[pp], &self.pps[pp2]);
        if a.position < b.position || (a.position == b.position && a.offset < b.offset) {
            pp
        } else {
            pp2
        }
    }

    /// Group index of a cursor on the same token as `pp`.
    fn collide(&self, pp: usize) -> Option<usize> {
        let group = self.pps[pp].rpt_group?;
        let tp_pos = self.pps[pp].tp_pos();
        self.repeats.groups[group]
            .iter()
            .position(|&other| other != pp && self.pps[other].tp_pos() == tp_pos)
    }

    fn init_phrase_positions(&mut self) -> Result<bool> {
        self.current_end = i32::MIN;
        self.current_real_end = i32::MIN;
        self.current_end_offset = -1;
        if !self.repeats.checked {
            return self.init_first_time();
        }
        if !self.repeats.present {
            return self.init_simple();
        }
        self.init_complex()
    }

    /// No repetitions: place every cursor and fill the queue.
    fn init_simple(&mut self) -> Result<bool> {
        self.pq.clear();
        for pp in 0..self.pps.len() {
            if !self.pps[pp].first_position()? {
                return Ok(false);
            }
            self.update_ends(pp);
            self.pq.add(&self.pps, pp);
        }
        Ok(true)
    }

    fn init_complex(&mut self) -> Result<bool> {
        if !self.place_first_positions()? || !self.advance_repeat_groups()? {
            return Ok(false);
        }
        self.fill_queue();
        Ok(true)
    }

    fn place_first_positions(&mut self) -> Result<bool> {
        for pp in self.pps.iter_mut() {
            if !pp.first_position()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn fill_queue(&mut self) {
        self.pq.clear();
        for pp in 0..self.pps.len() {
            self.update_ends(pp);
            self.pq.add(&self.pps, pp);
        }
    }

    /// Move repeating cursors apart so no two start on one token.
    fn advance_repeat_groups(&mut self) -> Result<bool> {
        for group in 0..self.repeats.groups.len() {
            let size = self.repeats.groups[group].len();
            if self.repeats.multi_term {
                // Collisions depend on the terms, resolve them one by one.
                let mut i = 0;
                while i < size {
                    let mut incr = 1;
                    let pp = self.repeats.groups[group][i];
                    while let Some(k) = self.collide(pp) {
                        let pp2 = self.lesser(pp, self.repeats.groups[group][k]);
                        if !self.advance_pp(pp2)? {
                            return Ok(false);
                        }
                        if self.pps[pp2].rpt_ind < i {
                            incr = 0;
                            break;
                        }
                    }
                    i += incr;
                }
            } else {
                // The j-th member moves j positions ahead.
                for j in 1..size {
                    let pp = self.repeats.groups[group][j];
                    for _ in 0..j {
                        if !self.pps[pp].next_position()? {
                            return Ok(false);
                        }
                    }
                }
            }
        }
        Ok(true)
    }

    /// Detect repetitions on the first document where all terms occur.
    fn init_first_time(&mut self) -> Result<bool> {
        if !self.place_first_positions()? {
            return Ok(false);
        }
        self.repeats.checked = true;
        let rpt_terms = self.repeating_terms();
        self.repeats.present = !rpt_terms.is_empty();
        if self.repeats.present {
            self.repeats.stack = Vec::with_capacity(self.pps.len());
            let groups = self.gather_rpt_groups(&rpt_terms);
            self.sort_rpt_groups(groups);
            log::debug!(
                "phrase has {} repeating terms in {} groups (multi-term: {})",
                rpt_terms.len(),
                self.repeats.groups.len(),
                self.repeats.multi_term
            );
            if !self.advance_repeat_groups()? {
                return Ok(false);
            }
        }
        self.fill_queue();
        Ok(true)
    }

    /// Terms occurring at more than one query position, with ordinals.
    fn repeating_terms(&self) -> AHashMap<String, usize> {
        let mut counts: AHashMap<&str, usize> = AHashMap::new();
        let mut ordinals = AHashMap::new();
        for pp in &self.pps {
            for term in &pp.terms {
                let count = counts.entry(term.as_str()).or_insert(0);
                *count += 1;
                if *count == 2 {
                    let ordinal = ordinals.len();
                    ordinals.insert(term.clone(), ordinal);
                }
            }
        }
        ordinals
    }

    /// Cursors reading at least one repeating term.
    fn repeating_pps(&mut self, rpt_terms: &AHashMap<String, usize>) -> Vec<usize> {
        let mut rpp = Vec::new();
        for (i, pp) in self.pps.iter().enumerate() {
            if pp.terms.iter().any(|term| rpt_terms.contains_key(term)) {
                rpp.push(i);
                self.repeats.multi_term |= pp.terms.len() > 1;
            }
        }
        rpp
    }

    fn gather_rpt_groups(&mut self, rpt_terms: &AHashMap<String, usize>) -> Vec<Vec<usize>> {
        let rpp = self.repeating_pps(rpt_terms);
        let mut groups: Vec<Vec<usize>> = Vec::new();

        if !self.repeats.multi_term {
            // Single-term cursors of one term all sit on its first token.
            for i in 0..rpp.len() {
                let pp = rpp[i];
                if self.pps[pp].rpt_group.is_some() {
                    continue;
                }
                let tp_pos = self.pps[pp].tp_pos();
                for &pp2 in &rpp[i + 1..] {
                    if self.pps[pp2].rpt_group.is_some()
                        || self.pps[pp2].offset == self.pps[pp].offset
                        || self.pps[pp2].tp_pos() != tp_pos
                    {
                        continue;
                    }
                    let group = match self.pps[pp].rpt_group {
                        Some(group) => group,
                        None => {
                            let group = groups.len();
                            self.pps[pp].rpt_group = Some(group);
                            groups.push(vec![pp]);
                            group
                        }
                    };
                    self.pps[pp2].rpt_group = Some(group);
                    groups[group].push(pp2);
                }
            }
            return groups;
        }

        // Multi-term cursors: cursors sharing a repeating term belong to one
        // group, transitively.
        let mut terms = TermUnion::new(rpt_terms.len());
        for &pp in &rpp {
            let mut ordinals = self.pps[pp]
                .terms
                .iter()
                .filter_map(|term| rpt_terms.get(term).copied());
            if let Some(first) = ordinals.next() {
                for ordinal in ordinals {
                    terms.union(first, ordinal);
                }
            }
        }

        let mut group_of_root: AHashMap<usize, usize> = AHashMap::new();
        let mut members: Vec<AHashSet<usize>> = Vec::new();
        for &pp in &rpp {
            let ordinals: Vec<usize> = self.pps[pp]
                .terms
                .iter()
                .filter_map(|term| rpt_terms.get(term).copied())
                .collect();
            for ordinal in ordinals {
                let root = terms.find(ordinal);
                let group = *group_of_root.entry(root).or_insert_with(|| {
                    members.push(AHashSet::new());
                    members.len() - 1
                });
                debug_assert!(self.pps[pp].rpt_group.is_none_or(|g| g == group));
                self.pps[pp].rpt_group = Some(group);
                members[group].insert(pp);
            }
        }
        for set in members {
            groups.push(set.into_iter().collect());
        }
        groups
    }

    /// Sort each group by phrase offset and size the per-group scratch.
    fn sort_rpt_groups(&mut self, mut groups: Vec<Vec<usize>>) {
        for group in groups.iter_mut() {
            group.sort_by_key(|&pp| (self.pps[pp].offset, self.pps[pp].ord));
            for (j, &pp) in group.iter().enumerate() {
                self.pps[pp].rpt_ind = j;
            }
        }
        self.repeats.bits = groups
            .iter()
            .map(|group| BitVec::from_elem(group.len(), false))
            .collect();
        self.repeats.groups = groups;
    }
}

/// Union-find over repeating term ordinals.
#[derive(Debug)]
struct TermUnion {
    parent: Vec<usize>,
}

impl TermUnion {
    fn new(size: usize) -> Self {
        TermUnion {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb.max(ra)] = ra.min(rb);
        }
    }
}

impl Matcher for SloppyPhraseMatcher {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        let target = self.doc + 1;
        self.advance(target)
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
        self.cost
    }

    fn score(&mut self) -> Result<f32> {
        let freq = self.freq()?;
        Ok(self.scorer.score(self.doc, freq))
    }

    fn freq(&mut self) -> Result<f32> {
        self.poison.check()?;
        let result = self.sloppy_freq();
        self.poison.track(result)
    }

    fn has_positions(&self) -> bool {
        true
    }

    fn next_position(&mut self) -> Result<Position> {
        self.poison.check()?;
        let result = self.next_match();
        self.poison.track(result)
    }

    fn interval(&self) -> &Interval {
        &self.interval
    }

    fn name(&self) -> &'static str {
        "SloppyPhrase"
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::query::scorer::ConstantScorer;
    use crate::query::testing::FailingPostings;

    /// Posting lists for one document per entry of `docs`, tokenized on
    /// whitespace.
    fn index(docs: &[&str]) -> AHashMap<String, PostingList> {
        let mut lists: AHashMap<String, PostingList> = AHashMap::new();
        for (doc_id, text) in docs.iter().enumerate() {
            let mut positions: AHashMap<&str, Vec<Position>> = AHashMap::new();
            for (position, token) in text.split_whitespace().enumerate() {
                positions.entry(token).or_default().push(position as Position);
            }
            for (token, positions) in positions {
                lists
                    .entry(token.to_string())
                    .or_insert_with(|| PostingList::new(token))
                    .add_posting(crate::postings::Posting::with_positions(
                        doc_id as DocId,
                        positions,
                    ));
            }
        }
        lists
    }

    fn list(lists: &AHashMap<String, PostingList>, term: &str) -> PostingList {
        lists
            .get(term)
            .cloned()
            .unwrap_or_else(|| PostingList::new(term))
    }

    fn phrase(lists: &AHashMap<String, PostingList>, query: &str, slop: u32) -> SloppyPhraseMatcher {
        let terms = query
            .split_whitespace()
            .enumerate()
            .map(|(offset, term)| PhraseTerm::from_list(&list(lists, term), offset as i32))
            .collect();
        SloppyPhraseMatcher::new(terms, slop, Box::new(ConstantScorer::default())).unwrap()
    }

    fn matches(matcher: &mut SloppyPhraseMatcher) -> Vec<(Position, Position, i32)> {
        let mut found = Vec::new();
        loop {
            let position = matcher.next_position().unwrap();
            if position == NO_MORE_POSITIONS {
                break;
            }
            let interval = *matcher.interval();
            found.push((interval.begin, interval.end, matcher.match_length()));
        }
        found
    }

    fn docs(matcher: &mut SloppyPhraseMatcher) -> Vec<DocId> {
        let mut found = Vec::new();
        loop {
            let doc = matcher.next_doc().unwrap();
            if doc == NO_MORE_DOCS {
                break;
            }
            found.push(doc);
        }
        found
    }

    #[test]
    fn test_quick_fox_within_slop() {
        let quick = PostingList::from_positions("quick", [(5, vec![0, 10])]);
        let fox = PostingList::from_positions("fox", [(5, vec![2])]);
        let mut matcher = SloppyPhraseMatcher::new(
            vec![PhraseTerm::from_list(&quick, 0), PhraseTerm::from_list(&fox, 1)],
            1,
            Box::new(ConstantScorer::default()),
        )
        .unwrap();

        assert_eq!(matcher.next_doc().unwrap(), 5);
        // Only the window starting at quick@0 is within slop; quick@10 is 9 away.
        assert_eq!(matches(&mut matcher), vec![(0, 2, 1)]);
        assert_eq!(matcher.next_doc().unwrap(), NO_MORE_DOCS);
    }

    #[test]
    fn test_exact_phrase() {
        let lists = index(&["the quick brown fox", "quick the fox brown", "brown fox quick"]);
        let mut matcher = phrase(&lists, "brown fox", 0);

        assert_eq!(docs(&mut matcher), vec![0, 2]);
    }

    #[test]
    fn test_slop_boundary() {
        for k in 0..4u32 {
            let within = format!("a {}b", "x ".repeat(k as usize));
            let beyond = format!("a {}b", "x ".repeat(k as usize + 1));
            let lists = index(&[within.as_str(), beyond.as_str()]);
            let mut matcher = phrase(&lists, "a b", k);

            assert_eq!(matcher.next_doc().unwrap(), 0, "slop {}", k);
            assert_eq!(matches(&mut matcher)[0].2, k as i32);
            assert_eq!(matcher.next_doc().unwrap(), NO_MORE_DOCS, "slop {}", k);
        }
    }

    #[test]
    fn test_reversed_terms_need_slop_two() {
        let lists = index(&["b a"]);
        assert_eq!(docs(&mut phrase(&lists, "a b", 1)), Vec::<DocId>::new());
        assert_eq!(docs(&mut phrase(&lists, "a b", 2)), vec![0]);
    }

    #[test]
    fn test_each_token_used_once_per_window() {
        let lists = index(&["x a b a y"]);
        let mut matcher = phrase(&lists, "a b", 2);

        assert_eq!(matcher.next_doc().unwrap(), 0);
        // "a b" exactly, then "b a" at distance 2; each uses its own "a".
        assert_eq!(matches(&mut matcher), vec![(1, 2, 0), (2, 3, 2)]);
    }

    #[test]
    fn test_sloppy_freq_sums_matches() {
        let lists = index(&["x a b a y"]);
        let mut matcher = phrase(&lists, "a b", 2);

        matcher.next_doc().unwrap();
        let expected = 1.0 + 1.0 / 3.0;
        assert!((matcher.freq().unwrap() - expected).abs() < 1e-6);
        // Cached per document.
        assert!((matcher.score().unwrap() - 1.0).abs() < 1e-6);
        assert!((matcher.freq().unwrap() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_sloppy_freq_counts_consumed_positions() {
        let lists = index(&["x a b a y"]);
        let mut matcher = phrase(&lists, "a b", 2);

        matcher.next_doc().unwrap();
        assert_ne!(matcher.next_position().unwrap(), NO_MORE_POSITIONS);
        assert_ne!(matcher.next_position().unwrap(), NO_MORE_POSITIONS);
        let expected = 1.0 + 1.0 / 3.0;
        assert!((matcher.freq().unwrap() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_repeated_term_needs_distinct_tokens() {
        let lists = index(&["x a b y", "a b a", "a x b a"]);
        let mut matcher = phrase(&lists, "a b a", 0);

        assert_eq!(docs(&mut matcher), vec![1]);
        assert!(matcher.has_repeats());

        let mut matcher = phrase(&lists, "a b a", 2);
        assert_eq!(docs(&mut matcher), vec![1, 2]);
    }

    #[test]
    fn test_single_repeated_term() {
        let lists = index(&["a x a", "a", "x a a"]);

        let mut matcher = phrase(&lists, "a a", 1);
        assert_eq!(docs(&mut matcher), vec![0, 2]);
        assert!(matcher.has_repeats());

        let mut matcher = phrase(&lists, "a a", 0);
        assert_eq!(docs(&mut matcher), vec![2]);
        assert!(matcher.has_repeats());
    }

    #[test]
    fn test_zero_frequency_posting_never_matches() {
        let mut a = PostingList::new("a");
        a.add_posting(crate::postings::Posting::with_positions(0, vec![]));
        a.add_posting(crate::postings::Posting::with_positions(1, vec![0]));
        a.add_posting(crate::postings::Posting::with_positions(2, vec![]));
        a.add_posting(crate::postings::Posting::with_positions(3, vec![2]));
        let b = PostingList::from_positions(
            "b",
            [(0, vec![1]), (1, vec![1]), (2, vec![1]), (3, vec![3])],
        );
        let mut matcher = SloppyPhraseMatcher::new(
            vec![PhraseTerm::from_list(&a, 0), PhraseTerm::from_list(&b, 1)],
            2,
            Box::new(ConstantScorer::default()),
        )
        .unwrap();

        // Doc 0 is the first candidate, so repetition detection waits for doc 1.
        assert_eq!(docs(&mut matcher), vec![1, 3]);
        assert!(!matcher.has_repeats());
    }

    #[test]
    fn test_positions_after_score() {
        let lists = index(&["the quick red fox"]);
        let mut matcher = phrase(&lists, "quick fox", 1);

        assert_eq!(matcher.next_doc().unwrap(), 0);
        assert_eq!(matcher.score().unwrap(), 1.0);
        assert_eq!(matcher.freq().unwrap(), 0.5);
        assert_eq!(matches(&mut matcher), vec![(1, 3, 1)]);
        assert!(matcher.interval().is_exhausted());
        assert_eq!(matcher.freq().unwrap(), 0.5);
    }

    #[test]
    fn test_freq_between_position_reads() {
        let lists = index(&["x a b a y", "a b"]);
        let mut matcher = phrase(&lists, "a b", 2);

        assert_eq!(matcher.next_doc().unwrap(), 0);
        assert_eq!(matcher.next_position().unwrap(), 1);
        let expected = 1.0 + 1.0 / 3.0;
        assert!((matcher.freq().unwrap() - expected).abs() < 1e-6);
        // The last handed out match is still current.
        assert_eq!((matcher.interval().begin, matcher.interval().end), (1, 2));
        assert_eq!(matcher.match_length(), 0);
        assert_eq!(matches(&mut matcher), vec![(2, 3, 2)]);

        // The buffer starts over on the next document.
        assert_eq!(matcher.next_doc().unwrap(), 1);
        assert_eq!(matcher.freq().unwrap(), 1.0);
        assert_eq!(matches(&mut matcher), vec![(0, 1, 0)]);
    }

    #[test]
    fn test_repeated_term_exact_match_counted_once() {
        let lists = index(&["a b a"]);
        let mut matcher = phrase(&lists, "a b a", 0);

        assert_eq!(matcher.next_doc().unwrap(), 0);
        assert_eq!(matches(&mut matcher), vec![(0, 2, 0)]);
    }

    #[test]
    fn test_multi_term_position() {
        let lists = index(&["quick dog", "quick cat", "quick brown fox"]);
        let terms = vec![
            PhraseTerm::from_list(&list(&lists, "quick"), 0),
            PhraseTerm::union(&[list(&lists, "fox"), list(&lists, "dog")], 1),
        ];
        let mut matcher =
            SloppyPhraseMatcher::new(terms, 1, Box::new(ConstantScorer::default())).unwrap();

        assert_eq!(docs(&mut matcher), vec![0, 2]);
    }

    #[test]
    fn test_multi_term_repeats_share_a_group() {
        let lists = index(&["b c", "b x"]);
        let terms = vec![
            PhraseTerm::union(&[list(&lists, "a"), list(&lists, "b")], 0),
            PhraseTerm::union(&[list(&lists, "b"), list(&lists, "c")], 1),
        ];
        let mut matcher =
            SloppyPhraseMatcher::new(terms, 0, Box::new(ConstantScorer::default())).unwrap();

        // One "b" token cannot satisfy both query positions.
        assert_eq!(docs(&mut matcher), vec![0]);
        assert!(matcher.has_repeats());
    }

    #[test]
    fn test_documented_approximation_is_kept() {
        let lists = index(&["a b c b a"]);
        let mut forward = phrase(&lists, "a b c", 4);
        let mut backward = phrase(&lists, "c b a", 4);

        assert_eq!(forward.next_doc().unwrap(), 0);
        assert_eq!(backward.next_doc().unwrap(), 0);
        // Equivalent queries, different frequencies.
        assert!((forward.freq().unwrap() - 1.4).abs() < 1e-6);
        assert!((backward.freq().unwrap() - 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_interval_reads_are_idempotent() {
        let lists = index(&["the quick red fox"]);
        let mut matcher = phrase(&lists, "quick fox", 1);

        matcher.next_doc().unwrap();
        matcher.next_position().unwrap();
        let first = *matcher.interval();
        assert_eq!(*matcher.interval(), first);
        assert_eq!((first.begin, first.end), (1, 3));
    }

    #[test]
    fn test_advance_agrees_with_next_doc() {
        let mut rng = StdRng::seed_from_u64(17);
        let words = ["a", "b", "c"];
        for _ in 0..20 {
            let texts: Vec<String> = (0..80)
                .map(|_| {
                    (0..rng.random_range(1..8))
                        .map(|_| words[rng.random_range(0..words.len())])
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect();
            let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
            let lists = index(&texts);
            let all = docs(&mut phrase(&lists, "a b a", 2));

            let mut matcher = phrase(&lists, "a b a", 2);
            let mut target = 0;
            while target < 80 {
                let expected = all
                    .iter()
                    .copied()
                    .find(|&doc| doc >= target)
                    .unwrap_or(NO_MORE_DOCS);
                assert_eq!(matcher.advance(target).unwrap(), expected);
                if expected == NO_MORE_DOCS {
                    break;
                }
                target = expected + rng.random_range(1..10);
            }
        }
    }

    #[test]
    fn test_rejects_single_term() {
        let lists = index(&["a"]);
        let result = SloppyPhraseMatcher::new(
            vec![PhraseTerm::from_list(&list(&lists, "a"), 0)],
            0,
            Box::new(ConstantScorer::default()),
        );
        assert!(matches!(result, Err(HalberdError::InvalidArgument(_))));
    }

    #[test]
    fn test_with_config_uses_default_slop() {
        let lists = index(&["a x b"]);
        let config = MatcherConfig::builder().default_slop(1).build();
        let terms = vec![
            PhraseTerm::from_list(&list(&lists, "a"), 0),
            PhraseTerm::from_list(&list(&lists, "b"), 1),
        ];
        let mut matcher =
            SloppyPhraseMatcher::with_config(terms, Box::new(ConstantScorer::default()), &config)
                .unwrap();

        assert_eq!(matcher.slop(), 1);
        assert_eq!(matcher.next_doc().unwrap(), 0);
    }

    #[test]
    fn test_phrase_poisoned_after_error() {
        let lists = index(&["a b"]);
        let terms = vec![
            PhraseTerm::from_list(&list(&lists, "a"), 0),
            PhraseTerm::new("b", Box::new(FailingPostings::new(vec![0], 0)), 1),
        ];
        let mut matcher =
            SloppyPhraseMatcher::new(terms, 0, Box::new(ConstantScorer::default())).unwrap();

        assert!(matches!(matcher.next_doc(), Err(HalberdError::Storage(_))));
        assert!(matches!(matcher.next_doc(), Err(HalberdError::Poisoned(_))));
        assert!(matches!(matcher.next_position(), Err(HalberdError::Poisoned(_))));
    }
}
