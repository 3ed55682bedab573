use std::sync::Arc;

use crate::window::Window;
use crate::{IndexRange, ItemKey};

/// Fired when the overscanned range of a [`Window`] changes.
///
/// Scrolling inside the current range (pixel-level movement) does not fire it.
pub type OnRangeChange<K> = Arc<dyn Fn(&Window<K>, IndexRange) + Send + Sync>;

/// Fired when a row is activated by a click or by `Enter`/`Space`.
pub type OnActivate = Arc<dyn Fn(usize) + Send + Sync>;

/// How rows are sized along the scroll axis.
#[derive(Clone)]
pub enum ItemSize {
    /// Every row has the same size. Ranges are computed in closed form.
    Fixed(u32),
    /// Rows start at an estimate and may be measured later.
    Estimated(Arc<dyn Fn(usize) -> u32 + Send + Sync>),
}

impl ItemSize {
    pub fn estimated(f: impl Fn(usize) -> u32 + Send + Sync + 'static) -> Self {
        Self::Estimated(Arc::new(f))
    }

    pub(crate) fn estimate(&self, index: usize) -> u32 {
        match self {
            Self::Fixed(size) => *size,
            Self::Estimated(f) => f(index),
        }
        .max(1)
    }
}

impl core::fmt::Debug for ItemSize {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Fixed(size) => f.debug_tuple("Fixed").field(size).finish(),
            Self::Estimated(_) => f.write_str("Estimated(..)"),
        }
    }
}

/// Configuration for [`Window`].
///
/// Cheap to clone: closures live in `Arc`s.
pub struct WindowOptions<K = ItemKey> {
    /// Number of real items (loading placeholders excluded).
    pub count: usize,
    pub item_size: ItemSize,
    pub get_item_key: Arc<dyn Fn(usize) -> K + Send + Sync>,
    /// Extra rows materialized on each side of the visible range.
    pub overscan: usize,
    /// Skeleton rows appended after `count` while more data may exist.
    pub loading_placeholders: usize,
    pub padding_start: u32,
    pub padding_end: u32,
    /// Viewport size along the scroll axis before the adapter reports one.
    pub initial_viewport: u32,
    pub initial_offset: u64,
    pub on_range_change: Option<OnRangeChange<K>>,
    pub on_activate: Option<OnActivate>,
}

impl<K> Clone for WindowOptions<K> {
    fn clone(&self) -> Self {
        Self {
            count: self.count,
            item_size: self.item_size.clone(),
            get_item_key: Arc::clone(&self.get_item_key),
            overscan: self.overscan,
            loading_placeholders: self.loading_placeholders,
            padding_start: self.padding_start,
            padding_end: self.padding_end,
            initial_viewport: self.initial_viewport,
            initial_offset: self.initial_offset,
            on_range_change: self.on_range_change.clone(),
            on_activate: self.on_activate.clone(),
        }
    }
}

impl WindowOptions<ItemKey> {
    /// Options for a fixed-size list keyed by index.
    pub fn new(count: usize, item_size: u32) -> Self {
        Self::with_item_size(count, ItemSize::Fixed(item_size))
    }

    /// Options for a list keyed by index with an arbitrary sizing strategy.
    pub fn with_item_size(count: usize, item_size: ItemSize) -> Self {
        Self::new_with_key(count, item_size, |i| i as u64)
    }
}

impl<K> WindowOptions<K> {
    /// Creates options with a custom key mapping.
    ///
    /// `get_item_key(i)` should return a stable identity (e.g. a flow-log record id) so
    /// measured sizes survive reloads.
    pub fn new_with_key(
        count: usize,
        item_size: ItemSize,
        get_item_key: impl Fn(usize) -> K + Send + Sync + 'static,
    ) -> Self {
        Self {
            count,
            item_size,
            get_item_key: Arc::new(get_item_key),
            overscan: 5,
            loading_placeholders: 0,
            padding_start: 0,
            padding_end: 0,
            initial_viewport: 0,
            initial_offset: 0,
            on_range_change: None,
            on_activate: None,
        }
    }

    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = overscan;
        self
    }

    pub fn with_loading_placeholders(mut self, loading_placeholders: usize) -> Self {
        self.loading_placeholders = loading_placeholders;
        self
    }

    pub fn with_padding(mut self, padding_start: u32, padding_end: u32) -> Self {
        self.padding_start = padding_start;
        self.padding_end = padding_end;
        self
    }

    pub fn with_initial_viewport(mut self, viewport: u32) -> Self {
        self.initial_viewport = viewport;
        self
    }

    pub fn with_initial_offset(mut self, offset: u64) -> Self {
        self.initial_offset = offset;
        self
    }

    pub fn with_on_range_change(
        mut self,
        f: impl Fn(&Window<K>, IndexRange) + Send + Sync + 'static,
    ) -> Self {
        self.on_range_change = Some(Arc::new(f));
        self
    }

    pub fn with_on_activate(mut self, f: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_activate = Some(Arc::new(f));
        self
    }
}

impl<K> core::fmt::Debug for WindowOptions<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WindowOptions")
            .field("count", &self.count)
            .field("item_size", &self.item_size)
            .field("overscan", &self.overscan)
            .field("loading_placeholders", &self.loading_placeholders)
            .field("padding_start", &self.padding_start)
            .field("padding_end", &self.padding_end)
            .field("initial_viewport", &self.initial_viewport)
            .field("initial_offset", &self.initial_offset)
            .finish_non_exhaustive()
    }
}
