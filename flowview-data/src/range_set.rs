use std::collections::BTreeMap;

use flowview::IndexRange;

/// A set of indexes stored as merged, non-touching half-open intervals.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RangeSet {
    // start -> end
    ranges: BTreeMap<usize, usize>,
}

impl RangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of disjoint intervals.
    pub fn interval_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = IndexRange> + '_ {
        self.ranges.iter().map(|(&s, &e)| IndexRange::new(s, e))
    }

    pub fn insert(&mut self, range: IndexRange) {
        if range.is_empty() {
            return;
        }
        let mut start = range.start;
        let mut end = range.end;
        if let Some((&s, &e)) = self.ranges.range(..=start).next_back() {
            if e >= start {
                start = s;
                end = end.max(e);
            }
        }
        let absorbed: Vec<usize> = self.ranges.range(start..=end).map(|(&s, _)| s).collect();
        for s in absorbed {
            if let Some(e) = self.ranges.remove(&s) {
                end = end.max(e);
            }
        }
        self.ranges.insert(start, end);
    }

    pub fn remove(&mut self, range: IndexRange) {
        if range.is_empty() {
            return;
        }
        let hits: Vec<(usize, usize)> = self.overlapping(range).collect();
        for (s, e) in hits {
            self.ranges.remove(&s);
            if s < range.start {
                self.ranges.insert(s, range.start);
            }
            if e > range.end {
                self.ranges.insert(range.end, e);
            }
        }
    }

    /// Whether every index of `range` is in the set. Empty ranges are always contained.
    pub fn contains(&self, range: IndexRange) -> bool {
        if range.is_empty() {
            return true;
        }
        self.ranges
            .range(..=range.start)
            .next_back()
            .is_some_and(|(_, &e)| e >= range.end)
    }

    /// The parts of `range` not in the set, ascending.
    pub fn missing(&self, range: IndexRange) -> Vec<IndexRange> {
        let mut gaps = Vec::new();
        if range.is_empty() {
            return gaps;
        }
        let mut cursor = range.start;
        for (s, e) in self.overlapping(range) {
            if s > cursor {
                gaps.push(IndexRange::new(cursor, s));
            }
            cursor = cursor.max(e);
        }
        if cursor < range.end {
            gaps.push(IndexRange::new(cursor, range.end));
        }
        gaps
    }

    /// The smallest range covering every missing part of `range`.
    pub fn missing_span(&self, range: IndexRange) -> Option<IndexRange> {
        let gaps = self.missing(range);
        let first = gaps.first()?;
        let last = gaps.last()?;
        Some(IndexRange::new(first.start, last.end))
    }

    fn overlapping(&self, range: IndexRange) -> impl Iterator<Item = (usize, usize)> + '_ {
        let from = self
            .ranges
            .range(..=range.start)
            .next_back()
            .map_or(range.start, |(&s, _)| s);
        self.ranges
            .range(from..range.end)
            .map(|(&s, &e)| (s, e))
            .filter(move |&(_, e)| e > range.start)
    }
}
