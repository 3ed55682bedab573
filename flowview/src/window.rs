use std::cell::Cell;
use std::cmp;

use crate::fenwick::Fenwick;
use crate::key::{KeyCacheKey, KeySizeMap};
use crate::{Align, IndexRange, ItemKey, ItemSize, ScrollDirection, VirtualItem, WindowOptions};

#[derive(Clone, Debug)]
enum Layout {
    Fixed(u32),
    Measured { sums: Fenwick, measured: Vec<bool> },
}

/// A headless windowed list.
///
/// The window never owns rows. Adapters feed it viewport geometry and scroll offsets; it
/// answers which slots must be materialized and where they sit. The scrollable extent
/// (`total_size`) covers every item plus the loading placeholders, independent of what is
/// materialized, so a growing list does not jump while more data arrives.
#[derive(Clone, Debug)]
pub struct Window<K = ItemKey> {
    options: WindowOptions<K>,
    layout: Layout,
    key_sizes: KeySizeMap<K>,
    viewport_size: u32,
    scroll_offset: u64,
    scroll_direction: Option<ScrollDirection>,
    has_more: bool,
    selected: Option<usize>,

    last_range: Cell<IndexRange>,
    notify_depth: Cell<usize>,
    notify_pending: Cell<bool>,
}

impl<K: KeyCacheKey> Window<K> {
    pub fn new(options: WindowOptions<K>) -> Self {
        vdebug!(
            count = options.count,
            overscan = options.overscan,
            placeholders = options.loading_placeholders,
            "Window::new"
        );
        let mut w = Self {
            viewport_size: options.initial_viewport,
            scroll_offset: options.initial_offset,
            scroll_direction: None,
            has_more: false,
            selected: None,
            layout: Layout::Fixed(1),
            key_sizes: KeySizeMap::<K>::new(),
            options,
            last_range: Cell::new(IndexRange::EMPTY),
            notify_depth: Cell::new(0),
            notify_pending: Cell::new(false),
        };
        w.rebuild_layout();
        w.last_range.set(w.virtual_range());
        w
    }

    pub fn options(&self) -> &WindowOptions<K> {
        &self.options
    }

    /// Replaces the options and rebuilds the size layout.
    pub fn set_options(&mut self, options: WindowOptions<K>) {
        self.options = options;
        vtrace!(count = self.options.count, "Window::set_options");
        self.rebuild_layout();
        self.clamp_selection();
        self.notify();
    }

    fn notify_now(&self) {
        let range = self.virtual_range();
        if range == self.last_range.get() {
            return;
        }
        vtrace!(start = range.start, end = range.end, "range changed");
        self.last_range.set(range);
        if let Some(cb) = &self.options.on_range_change {
            cb(self, range);
        }
    }

    fn notify(&self) {
        if self.notify_depth.get() > 0 {
            self.notify_pending.set(true);
            return;
        }
        self.notify_now();
    }

    /// Batches several updates into at most one `on_range_change` notification.
    pub fn batch_update(&mut self, f: impl FnOnce(&mut Self)) {
        let depth = self.notify_depth.get();
        self.notify_depth.set(depth.saturating_add(1));

        f(self);

        let next = self.notify_depth.get().saturating_sub(1);
        self.notify_depth.set(next);
        if next == 0 && self.notify_pending.replace(false) {
            self.notify_now();
        }
    }

    /// The range last reported through `on_range_change` (or computed at construction).
    pub fn last_notified_range(&self) -> IndexRange {
        self.last_range.get()
    }

    pub fn count(&self) -> usize {
        self.options.count
    }

    /// Number of laid-out slots: items plus active loading placeholders.
    pub fn slot_count(&self) -> usize {
        self.options.count + self.placeholder_count()
    }

    pub fn placeholder_count(&self) -> usize {
        if self.has_more {
            self.options.loading_placeholders
        } else {
            0
        }
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Shows or hides the trailing loading placeholders.
    pub fn set_has_more(&mut self, has_more: bool) {
        if self.has_more == has_more {
            return;
        }
        let old_count = self.options.count;
        self.has_more = has_more;
        self.sync_slots(old_count);
        self.notify();
    }

    pub fn set_count(&mut self, count: usize) {
        if self.options.count == count {
            return;
        }
        let old_count = self.options.count;
        self.options.count = count;
        self.sync_slots(old_count);
        self.clamp_selection();
        self.notify();
    }

    pub fn set_overscan(&mut self, overscan: usize) {
        self.options.overscan = overscan;
        self.notify();
    }

    pub fn set_padding(&mut self, padding_start: u32, padding_end: u32) {
        self.options.padding_start = padding_start;
        self.options.padding_end = padding_end;
        self.notify();
    }

    pub fn viewport_size(&self) -> u32 {
        self.viewport_size
    }

    pub fn set_viewport_size(&mut self, size: u32) {
        if self.viewport_size == size {
            return;
        }
        self.viewport_size = size;
        self.notify();
    }

    pub fn scroll_offset(&self) -> u64 {
        self.scroll_offset
    }

    pub fn scroll_direction(&self) -> Option<ScrollDirection> {
        self.scroll_direction
    }

    pub fn set_scroll_offset(&mut self, offset: u64) {
        if self.scroll_offset == offset {
            return;
        }
        let prev = self.scroll_offset;
        self.scroll_offset = offset;
        self.scroll_direction = match offset.cmp(&prev) {
            cmp::Ordering::Greater => Some(ScrollDirection::Forward),
            cmp::Ordering::Less => Some(ScrollDirection::Backward),
            cmp::Ordering::Equal => self.scroll_direction,
        };
        self.notify();
    }

    pub fn set_scroll_offset_clamped(&mut self, offset: u64) {
        let clamped = self.clamp_scroll_offset(offset);
        self.set_scroll_offset(clamped);
    }

    /// Applies viewport size and scroll offset as one update (one notification at most).
    pub fn apply_scroll(&mut self, viewport_size: u32, scroll_offset: u64) {
        vtrace!(viewport_size, scroll_offset, "apply_scroll");
        self.batch_update(|w| {
            w.set_viewport_size(viewport_size);
            w.set_scroll_offset(scroll_offset);
        });
    }

    pub fn key_for(&self, index: usize) -> K {
        (self.options.get_item_key)(index)
    }

    /// Records the rendered size of an item.
    ///
    /// Only meaningful with [`ItemSize::Estimated`]. When the item starts above the current
    /// scroll offset the offset is shifted by the size change so visible content stays put;
    /// the applied shift is returned.
    pub fn measure(&mut self, index: usize, size: u32) -> i64 {
        if index >= self.options.count {
            return 0;
        }
        let size = size.max(1);
        let start = self.start_of(index);
        let key = self.key_for(index);
        let Layout::Measured { sums, measured } = &mut self.layout else {
            vtrace!(index, size, "measure ignored for fixed-size window");
            return 0;
        };
        self.key_sizes.insert(key, size);
        measured[index] = true;
        let delta = sums.set(index, size);

        let applied = if delta != 0 && start < self.scroll_offset {
            if delta > 0 {
                self.scroll_offset = self.scroll_offset.saturating_add(delta as u64);
            } else {
                self.scroll_offset = self.scroll_offset.saturating_sub(delta.unsigned_abs());
            }
            delta
        } else {
            0
        };
        self.notify();
        applied
    }

    pub fn is_measured(&self, index: usize) -> bool {
        match &self.layout {
            Layout::Fixed(_) => false,
            Layout::Measured { measured, .. } => measured.get(index).copied().unwrap_or(false),
        }
    }

    /// Forgets every measured size and falls back to estimates.
    pub fn reset_measurements(&mut self) {
        self.key_sizes.clear();
        self.rebuild_layout();
        self.notify();
    }

    pub fn measurement_cache_len(&self) -> usize {
        self.key_sizes.len()
    }

    pub fn total_size(&self) -> u64 {
        let content = match &self.layout {
            Layout::Fixed(size) => (self.slot_count() as u64).saturating_mul(*size as u64),
            Layout::Measured { sums, .. } => sums.total(),
        };
        (self.options.padding_start as u64)
            .saturating_add(content)
            .saturating_add(self.options.padding_end as u64)
    }

    pub fn max_scroll_offset(&self) -> u64 {
        self.total_size()
            .saturating_sub(self.viewport_size as u64)
    }

    pub fn clamp_scroll_offset(&self, offset: u64) -> u64 {
        offset.min(self.max_scroll_offset())
    }

    /// Slots intersecting the viewport, without overscan.
    pub fn visible_range(&self) -> IndexRange {
        self.compute_visible_range(self.scroll_offset, self.viewport_size)
    }

    pub fn visible_range_for(&self, scroll_offset: u64, viewport_size: u32) -> IndexRange {
        self.compute_visible_range(scroll_offset, viewport_size)
    }

    /// Slots to materialize: the visible range widened by `overscan` on both sides and
    /// clamped to the slot count.
    pub fn virtual_range(&self) -> IndexRange {
        self.compute_range(self.scroll_offset, self.viewport_size)
    }

    pub fn virtual_range_for(&self, scroll_offset: u64, viewport_size: u32) -> IndexRange {
        self.compute_range(scroll_offset, viewport_size)
    }

    /// The materialized range restricted to real items (placeholders excluded).
    pub fn item_range(&self) -> IndexRange {
        self.virtual_range().clamp_to(self.options.count)
    }

    pub fn for_each_virtual_item(&self, mut f: impl FnMut(VirtualItem)) {
        let range = self.virtual_range();
        if range.is_empty() {
            return;
        }
        let mut start = self.start_of(range.start);
        for index in range.iter() {
            let size = self.size_of(index);
            f(VirtualItem {
                index,
                start,
                size,
                placeholder: index >= self.options.count,
            });
            start = start.saturating_add(size as u64);
        }
    }

    /// Collects the materialized slots into `out` (clears `out` first).
    pub fn collect_virtual_items(&self, out: &mut Vec<VirtualItem>) {
        out.clear();
        self.for_each_virtual_item(|it| out.push(it));
    }

    pub fn item(&self, index: usize) -> Option<VirtualItem> {
        if index >= self.slot_count() {
            return None;
        }
        Some(VirtualItem {
            index,
            start: self.start_of(index),
            size: self.size_of(index),
            placeholder: index >= self.options.count,
        })
    }

    /// The slot containing `offset`, clamped to the last slot.
    pub fn index_at_offset(&self, offset: u64) -> Option<usize> {
        let slots = self.slot_count();
        if slots == 0 {
            return None;
        }
        let in_list = offset.saturating_sub(self.options.padding_start as u64);
        let index = match &self.layout {
            Layout::Fixed(size) => (in_list / *size as u64) as usize,
            Layout::Measured { sums, .. } => sums.lower_bound(in_list),
        };
        Some(index.min(slots - 1))
    }

    /// Computes the scroll offset that brings `index` into view with the given alignment.
    pub fn scroll_to_index_offset(&self, index: usize, align: Align) -> u64 {
        let slots = self.slot_count();
        if slots == 0 {
            return 0;
        }
        let index = index.min(slots - 1);
        let start = self.start_of(index);
        let end = start.saturating_add(self.size_of(index) as u64);
        let view = self.viewport_size as u64;

        let target = match align {
            Align::Start => start,
            Align::End => end.saturating_sub(view),
            Align::Center => {
                let center = start.saturating_add(self.size_of(index) as u64 / 2);
                center.saturating_sub(view / 2)
            }
            Align::Auto => {
                let cur = self.scroll_offset;
                let cur_end = cur.saturating_add(view);
                if start >= cur && end <= cur_end {
                    cur
                } else if start < cur {
                    start
                } else {
                    end.saturating_sub(view)
                }
            }
        };
        self.clamp_scroll_offset(target)
    }

    /// Scrolls so that `index` is in view; returns the applied offset.
    pub fn scroll_to_index(&mut self, index: usize, align: Align) -> u64 {
        let offset = self.scroll_to_index_offset(index, align);
        self.set_scroll_offset(offset);
        offset
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Selects an item. Out-of-range indexes clear the selection.
    pub fn select(&mut self, index: Option<usize>) {
        self.selected = index.filter(|&i| i < self.options.count);
    }

    /// Selects and activates an item. Mouse clicks and keyboard activation both end here.
    ///
    /// Returns the activated index, or `None` for placeholder/out-of-range slots.
    pub fn activate(&mut self, index: usize) -> Option<usize> {
        if index >= self.options.count {
            return None;
        }
        self.selected = Some(index);
        vtrace!(index, "activate");
        if let Some(cb) = &self.options.on_activate {
            cb(index);
        }
        Some(index)
    }

    /// Pointer activation of a materialized row.
    pub fn click(&mut self, index: usize) -> Option<usize> {
        self.activate(index)
    }

    fn clamp_selection(&mut self) {
        if self.selected.is_some_and(|i| i >= self.options.count) {
            self.selected = None;
        }
    }

    fn size_of(&self, index: usize) -> u32 {
        match &self.layout {
            Layout::Fixed(size) => *size,
            Layout::Measured { sums, .. } => sums
                .size(index)
                .unwrap_or_else(|| self.options.item_size.estimate(index)),
        }
    }

    fn start_of(&self, index: usize) -> u64 {
        let before = match &self.layout {
            Layout::Fixed(size) => (index as u64).saturating_mul(*size as u64),
            Layout::Measured { sums, .. } => sums.prefix_sum(index),
        };
        (self.options.padding_start as u64).saturating_add(before)
    }

    fn rebuild_layout(&mut self) {
        let slots = self.slot_count();
        vdebug!(slots, cached = self.key_sizes.len(), "rebuild_layout");
        self.layout = match &self.options.item_size {
            ItemSize::Fixed(size) => Layout::Fixed((*size).max(1)),
            ItemSize::Estimated(_) => {
                let mut sizes = Vec::with_capacity(slots);
                let mut measured = Vec::with_capacity(slots);
                for i in 0..slots {
                    let (size, is_measured) = slot_size(&self.options, &self.key_sizes, i);
                    sizes.push(size);
                    measured.push(is_measured);
                }
                Layout::Measured {
                    sums: Fenwick::from_sizes(sizes),
                    measured,
                }
            }
        };
    }

    /// Brings a measured layout in line with the current slot count without a full rebuild.
    fn sync_slots(&mut self, old_count: usize) {
        let slots = self.slot_count();
        let Self {
            options,
            layout,
            key_sizes,
            ..
        } = self;
        let Layout::Measured { sums, measured } = layout else {
            return;
        };
        sums.truncate(slots);
        measured.truncate(slots);
        // Slots at or past the smaller count may have switched between item and placeholder.
        let changed_from = old_count.min(options.count);
        for i in changed_from..sums.len() {
            let (size, is_measured) = slot_size(options, key_sizes, i);
            sums.set(i, size);
            measured[i] = is_measured;
        }
        while sums.len() < slots {
            let (size, is_measured) = slot_size(options, key_sizes, sums.len());
            sums.push(size);
            measured.push(is_measured);
        }
    }

    fn compute_range(&self, scroll_offset: u64, viewport_size: u32) -> IndexRange {
        let visible = self.compute_visible_range(scroll_offset, viewport_size);
        if visible.is_empty() {
            return visible;
        }
        let overscan = self.options.overscan;
        IndexRange {
            start: visible.start.saturating_sub(overscan),
            end: cmp::min(self.slot_count(), visible.end.saturating_add(overscan)),
        }
    }

    fn compute_visible_range(&self, scroll_offset: u64, viewport_size: u32) -> IndexRange {
        let slots = self.slot_count();
        if slots == 0 || viewport_size == 0 {
            return IndexRange::EMPTY;
        }

        let view = viewport_size as u64;
        let total = self.total_size();
        let offset = scroll_offset.min(total.saturating_sub(view));

        let padding_start = self.options.padding_start as u64;
        let content = total
            .saturating_sub(padding_start)
            .saturating_sub(self.options.padding_end as u64);
        let start_in_list = offset.saturating_sub(padding_start);
        let end_in_list = offset.saturating_add(view).saturating_sub(padding_start);
        if end_in_list == 0 {
            return IndexRange::EMPTY;
        }
        if start_in_list >= content {
            return IndexRange {
                start: slots,
                end: slots,
            };
        }

        let (start, end) = match &self.layout {
            Layout::Fixed(size) => {
                let size = *size as u64;
                (
                    (start_in_list / size) as usize,
                    end_in_list.div_ceil(size) as usize,
                )
            }
            Layout::Measured { sums, .. } => {
                let last = slots - 1;
                let start = sums.lower_bound(start_in_list).min(last);
                let end = sums
                    .lower_bound(cmp::max(end_in_list - 1, start_in_list))
                    .min(last)
                    + 1;
                (start, end)
            }
        };

        IndexRange {
            start: start.min(slots),
            end: end.min(slots),
        }
    }
}

fn slot_size<K: KeyCacheKey>(
    options: &WindowOptions<K>,
    key_sizes: &KeySizeMap<K>,
    index: usize,
) -> (u32, bool) {
    if index < options.count {
        let key = (options.get_item_key)(index);
        if let Some(&size) = key_sizes.get(&key) {
            return (size, true);
        }
    }
    (options.item_size.estimate(index), false)
}
