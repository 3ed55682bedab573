use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Align {
    Start,
    Center,
    End,
    Auto,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScrollDirection {
    Forward,
    Backward,
}

/// A half-open range of global item indices, `[start, end)`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexRange {
    pub start: usize,
    pub end: usize,
}

/// The unit of work requested by the infinite loader.
pub type LoadRange = IndexRange;

impl IndexRange {
    pub const EMPTY: Self = Self { start: 0, end: 0 };

    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }

    pub fn covers(&self, other: &IndexRange) -> bool {
        other.is_empty() || (self.start <= other.start && other.end <= self.end)
    }

    pub fn overlaps(&self, other: &IndexRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn intersect(&self, other: &IndexRange) -> IndexRange {
        IndexRange::new(self.start.max(other.start), self.end.min(other.end))
    }

    pub fn clamp_to(&self, count: usize) -> IndexRange {
        IndexRange::new(self.start.min(count), self.end.min(count))
    }

    pub fn iter(&self) -> core::ops::Range<usize> {
        self.start..self.end
    }
}

impl fmt::Debug for IndexRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

impl From<core::ops::Range<usize>> for IndexRange {
    fn from(r: core::ops::Range<usize>) -> Self {
        IndexRange::new(r.start, r.end)
    }
}

/// One materialized slot of the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VirtualItem {
    pub index: usize,
    /// Start offset in the scroll axis (includes `padding_start`).
    pub start: u64,
    pub size: u32,
    /// `true` for loading placeholder slots appended after `count`.
    pub placeholder: bool,
}

impl VirtualItem {
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.size as u64)
    }
}

pub type ItemKey = u64;
