//! Memoized summary statistics over a growing collection.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A numeric projection of a row.
///
/// Memoization is keyed by the identity of the underlying `Arc`: clones of the same selector
/// share cached results, while a freshly built selector is always a cache miss. Build
/// selectors once and keep them around.
pub struct Selector<T>(Arc<dyn Fn(&T) -> f64 + Send + Sync>);

impl<T> Selector<T> {
    pub fn new(f: impl Fn(&T) -> f64 + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn apply(&self, row: &T) -> f64 {
        (self.0)(row)
    }
}

impl<T> Clone for Selector<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

/// A grouping key projection of a row. Identity rules match [`Selector`].
pub struct KeySelector<T>(Arc<dyn Fn(&T) -> String + Send + Sync>);

impl<T> KeySelector<T> {
    pub fn new(f: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn apply(&self, row: &T) -> String {
        (self.0)(row)
    }
}

impl<T> Clone for KeySelector<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    Sum,
    Average,
    Min,
    Max,
    /// Percentile rank, stored as the bit pattern of `p`.
    Percentile(u64),
    GroupBy,
}

pub type Groups<T> = Arc<BTreeMap<String, Vec<T>>>;

enum Memo<T> {
    Scalar(Option<f64>),
    Groups(Groups<T>),
}

// Never read; only owned.
#[allow(dead_code)]
enum SelectorHandle<T> {
    Value(Selector<T>),
    Key(KeySelector<T>),
}

struct MemoEntry<T> {
    // Holding the selector keeps its allocation alive, so its address cannot be reused by a
    // different selector while this entry exists.
    _selector: SelectorHandle<T>,
    value: Memo<T>,
}

/// Computes and memoizes aggregates over a collection.
///
/// Any mutation (`add`, `reset`) clears the whole memo before it returns; results are never
/// patched incrementally.
pub struct DataAggregator<T> {
    items: Vec<T>,
    memo: RefCell<HashMap<(AggregateOp, usize), MemoEntry<T>>>,
}

impl<T> Default for DataAggregator<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T> DataAggregator<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            memo: RefCell::new(HashMap::new()),
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of memoized results currently held.
    pub fn memo_len(&self) -> usize {
        self.memo.borrow().len()
    }

    /// Appends rows and invalidates every memoized result.
    pub fn add(&mut self, items: impl IntoIterator<Item = T>) {
        self.memo.get_mut().clear();
        self.items.extend(items);
        vtrace!(total = self.items.len(), "aggregator add");
    }

    /// Replaces the collection and invalidates every memoized result.
    pub fn reset(&mut self, items: Vec<T>) {
        self.memo.get_mut().clear();
        self.items = items;
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn sum(&self, selector: &Selector<T>) -> f64 {
        self.scalar(AggregateOp::Sum, selector, |values| {
            Some(values.iter().sum())
        })
        .unwrap_or(0.0)
    }

    pub fn average(&self, selector: &Selector<T>) -> Option<f64> {
        self.scalar(AggregateOp::Average, selector, |values| {
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        })
    }

    pub fn min(&self, selector: &Selector<T>) -> Option<f64> {
        self.scalar(AggregateOp::Min, selector, |values| {
            values.iter().copied().reduce(f64::min)
        })
    }

    pub fn max(&self, selector: &Selector<T>) -> Option<f64> {
        self.scalar(AggregateOp::Max, selector, |values| {
            values.iter().copied().reduce(f64::max)
        })
    }

    /// Nearest-rank percentile: the projected values are sorted ascending and the value at
    /// index `ceil(p / 100 * n) - 1` (clamped to `[0, n - 1]`) is returned. No interpolation.
    pub fn percentile(&self, selector: &Selector<T>, p: f64) -> Option<f64> {
        self.scalar(AggregateOp::Percentile(p.to_bits()), selector, |values| {
            nearest_rank(values, p)
        })
    }

    /// Groups rows by key. Groups are ordered by key.
    pub fn group_by(&self, selector: &KeySelector<T>) -> Groups<T>
    where
        T: Clone,
    {
        let key = (AggregateOp::GroupBy, selector.id());
        if let Some(entry) = self.memo.borrow().get(&key) {
            if let Memo::Groups(groups) = &entry.value {
                return Arc::clone(groups);
            }
        }

        let mut groups: BTreeMap<String, Vec<T>> = BTreeMap::new();
        for row in &self.items {
            groups.entry(selector.apply(row)).or_default().push(row.clone());
        }
        let groups = Arc::new(groups);
        vtrace!(groups = groups.len(), "group_by computed");
        self.memo.borrow_mut().insert(
            key,
            MemoEntry {
                _selector: SelectorHandle::Key(selector.clone()),
                value: Memo::Groups(Arc::clone(&groups)),
            },
        );
        groups
    }

    fn scalar(
        &self,
        op: AggregateOp,
        selector: &Selector<T>,
        compute: impl FnOnce(&mut Vec<f64>) -> Option<f64>,
    ) -> Option<f64> {
        let key = (op, selector.id());
        if let Some(entry) = self.memo.borrow().get(&key) {
            if let Memo::Scalar(value) = entry.value {
                return value;
            }
        }

        let mut values: Vec<f64> = self.items.iter().map(|row| selector.apply(row)).collect();
        let value = compute(&mut values);
        vtrace!(?op, rows = values.len(), "aggregate computed");
        self.memo.borrow_mut().insert(
            key,
            MemoEntry {
                _selector: SelectorHandle::Value(selector.clone()),
                value: Memo::Scalar(value),
            },
        );
        value
    }
}

fn nearest_rank(values: &mut [f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let n = values.len();
    let rank = (p * n as f64 / 100.0).ceil() as i64 - 1;
    let index = rank.clamp(0, n as i64 - 1) as usize;
    Some(values[index])
}

impl<T: core::fmt::Debug> core::fmt::Debug for DataAggregator<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DataAggregator")
            .field("len", &self.items.len())
            .field("memo_len", &self.memo.borrow().len())
            .finish()
    }
}
