use std::cmp;

/// Prefix sums over slot sizes, used by windows with measured (variable) row heights.
///
/// The tree is 1-indexed: `tree[i]` stores the sum of the `lsb(i)` sizes ending at slot `i`.
/// Raw sizes are kept alongside so callers can overwrite a slot without tracking deltas.
#[derive(Clone, Debug)]
pub(crate) struct Fenwick {
    tree: Vec<u64>,
    sizes: Vec<u32>,
    total: u64,
    max_bit: usize,
}

impl Fenwick {
    /// Builds the tree in `O(n)`.
    pub(crate) fn from_sizes(sizes: impl IntoIterator<Item = u32>) -> Self {
        let sizes: Vec<u32> = sizes.into_iter().collect();
        let n = sizes.len();
        let mut tree = vec![0u64; n + 1];
        let mut total = 0u64;
        for i in 1..=n {
            let size = sizes[i - 1] as u64;
            total = total.saturating_add(size);
            tree[i] = tree[i].saturating_add(size);
            let parent = i + lsb(i);
            if parent <= n {
                tree[parent] = tree[parent].saturating_add(tree[i]);
            }
        }
        Self {
            tree,
            sizes,
            total,
            max_bit: highest_power_of_two_leq(n),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.sizes.len()
    }

    pub(crate) fn size(&self, index: usize) -> Option<u32> {
        self.sizes.get(index).copied()
    }

    pub(crate) fn total(&self) -> u64 {
        self.total
    }

    /// Overwrites the size of one slot and returns the signed change.
    pub(crate) fn set(&mut self, index: usize, size: u32) -> i64 {
        let Some(cur) = self.sizes.get(index).copied() else {
            return 0;
        };
        let delta = size as i64 - cur as i64;
        if delta == 0 {
            return 0;
        }
        self.sizes[index] = size;
        self.total = apply_delta(self.total, delta);
        let n = self.len();
        let mut i = index + 1;
        while i <= n {
            self.tree[i] = apply_delta(self.tree[i], delta);
            i += lsb(i);
        }
        delta
    }

    /// Appends a slot in `O(log n)`, so a list growing during infinite loading keeps its
    /// measured prefix intact.
    pub(crate) fn push(&mut self, size: u32) {
        let new_len = self.len() + 1;
        // The new node covers slots (new_len - lsb(new_len), new_len]; everything but the new
        // slot is already summed by the existing prefix.
        let covered_before = self
            .prefix_sum(new_len - 1)
            .saturating_sub(self.prefix_sum(new_len - lsb(new_len)));
        self.tree.push(covered_before.saturating_add(size as u64));
        self.sizes.push(size);
        self.total = self.total.saturating_add(size as u64);
        self.max_bit = highest_power_of_two_leq(new_len);
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        if len >= self.len() {
            return;
        }
        self.tree.truncate(len + 1);
        self.sizes.truncate(len);
        self.total = self.prefix_sum(len);
        self.max_bit = highest_power_of_two_leq(len);
    }

    /// Sum of the first `count` slot sizes.
    pub(crate) fn prefix_sum(&self, count: usize) -> u64 {
        let mut i = cmp::min(count, self.len());
        let mut sum = 0u64;
        while i > 0 {
            sum = sum.saturating_add(self.tree[i]);
            i &= i - 1;
        }
        sum
    }

    /// Returns the number of leading slots whose cumulative size is `<= target`.
    ///
    /// For an offset inside the list this is the index of the slot containing it.
    pub(crate) fn lower_bound(&self, mut target: u64) -> usize {
        let n = self.len();
        let mut idx = 0usize;
        let mut bit = self.max_bit;
        while bit != 0 {
            let next = idx + bit;
            if next <= n && self.tree[next] <= target {
                target -= self.tree[next];
                idx = next;
            }
            bit >>= 1;
        }
        idx
    }
}

fn apply_delta(value: u64, delta: i64) -> u64 {
    if delta >= 0 {
        value.saturating_add(delta as u64)
    } else {
        value.saturating_sub(delta.unsigned_abs())
    }
}

fn lsb(i: usize) -> usize {
    i & i.wrapping_neg()
}

fn highest_power_of_two_leq(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    1usize << (usize::BITS - 1 - n.leading_zeros())
}
