use flowview::{
    BodyState, ColumnDef, Frame, Key, TableFrame, Window, WindowOptions, render_list,
    render_skeleton, render_table,
};

use crate::{FetchError, InfiniteLoader, PageSource, ViewConfig, VirtualDataStore};

/// A framework-neutral controller that connects a [`Window`] to a chunked
/// [`VirtualDataStore`] through an [`InfiniteLoader`].
///
/// This type does not hold any UI objects. Adapters drive it by calling:
/// - `on_viewport` / `on_scroll` when UI events occur
/// - `tick(now_ms)` each frame/timer tick, which issues the debounced load for the current
///   range once scrolling settles
/// - `frame(..)` / `table(..)` to get the rows to draw
///
/// Before the first chunk arrives the dataset size is unknown: the window has no items and
/// shows its loading placeholders. Once the store learns the total, the window is sized to it
/// and rows that are not cached render as skeletons until their chunk loads.
pub struct ListController<T, S> {
    window: Window,
    loader: InfiniteLoader<T, S>,
    empty_message: String,
    skeleton_rows: usize,
}

impl<T, S> ListController<T, S> {
    pub fn new(config: &ViewConfig, source: S) -> Self {
        let store = VirtualDataStore::new(source, config.store_options());
        let mut c = Self::from_store(config.window_options(), store, config.debounce_ms);
        c.empty_message = config.empty_message.clone();
        c
    }

    /// Wraps an existing store, e.g. one handed out by a
    /// [`DatasetRegistry`](crate::DatasetRegistry).
    pub fn from_store(
        options: WindowOptions,
        store: VirtualDataStore<T, S>,
        debounce_ms: u64,
    ) -> Self {
        let skeleton_rows = options.loading_placeholders;
        let mut window = Window::new(options);
        match store.total() {
            Some(total) => window.set_count(total),
            None => window.set_has_more(true),
        }
        Self {
            window,
            loader: InfiniteLoader::new(store, debounce_ms),
            empty_message: ViewConfig::default().empty_message,
            skeleton_rows,
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }

    pub fn store(&self) -> &VirtualDataStore<T, S> {
        self.loader.store()
    }

    pub fn loader(&self) -> &InfiniteLoader<T, S> {
        &self.loader
    }

    pub fn empty_message(&self) -> &str {
        &self.empty_message
    }

    pub fn on_viewport(&mut self, viewport_size: u32, now_ms: u64) {
        self.window.set_viewport_size(viewport_size);
        self.schedule_visible(now_ms);
    }

    /// Call this when the UI reports a scroll offset change (e.g. user wheel/drag).
    pub fn on_scroll(&mut self, scroll_offset: u64, now_ms: u64) {
        self.window.set_scroll_offset(scroll_offset);
        self.schedule_visible(now_ms);
    }

    /// Activates a row by pointer. Returns the activated index.
    pub fn click(&mut self, index: usize) -> Option<usize> {
        self.window.click(index)
    }

    /// Keyboard input. `Enter`/`Space` activate exactly like [`Self::click`].
    pub fn handle_key(&mut self, key: Key, now_ms: u64) -> Option<usize> {
        let activated = self.window.handle_key(key);
        self.schedule_visible(now_ms);
        activated
    }

    /// Which body to show: loading until the dataset size is known, an error if the first
    /// load failed, empty for a zero-row dataset, otherwise rows.
    pub fn body_state(&self) -> BodyState {
        let total = self.store().total();
        let error = if total.is_none() {
            self.loader.last_error()
        } else {
            None
        };
        BodyState::resolve(
            total.is_none() && (error.is_none() || self.loader.is_loading()),
            error.as_ref(),
            total == Some(0),
        )
    }

    /// Row-sized skeletons for the loading body.
    pub fn skeleton_frame<D>(&self) -> Frame<D> {
        render_skeleton(&self.window, self.skeleton_rows)
    }

    /// Forgets all data and scroll state. Loads in flight are discarded when they complete.
    pub fn reset(&mut self) {
        self.store().reset();
        self.loader.reset();
        self.window.batch_update(|w| {
            w.select(None);
            w.set_count(0);
            w.set_has_more(true);
            w.reset_measurements();
            w.set_scroll_offset(0);
        });
    }

    fn schedule_visible(&self, now_ms: u64) {
        let range = self.window.virtual_range();
        if range.is_empty() || self.loader.is_range_loaded(range) {
            return;
        }
        vtrace!(start = range.start, end = range.end, "scheduling visible range");
        self.loader.on_visible_range(range, now_ms);
    }

    fn sync_count(&mut self, now_ms: u64) {
        let Some(total) = self.store().total() else {
            return;
        };
        if self.window.count() != total || self.window.has_more() {
            vdebug!(total, "dataset size known");
            self.window.batch_update(|w| {
                w.set_count(total);
                w.set_has_more(false);
            });
        }
        self.schedule_visible(now_ms);
    }
}

impl<T, S> ListController<T, S>
where
    T: Clone + 'static,
    S: PageSource<T> + 'static,
{
    /// Advances the controller.
    ///
    /// If a debounced range load is due, awaits it and returns `Ok(true)`; otherwise returns
    /// `Ok(false)` without waiting. Failures are reported but never retried here.
    pub async fn tick(&mut self, now_ms: u64) -> Result<bool, FetchError> {
        let Some(load) = self.loader.poll_due(now_ms) else {
            return Ok(false);
        };
        let result = load.await;
        self.sync_count(now_ms);
        result.map(|()| true)
    }

    /// Loads the current range immediately, bypassing the debounce.
    pub async fn load_visible(&mut self, now_ms: u64) -> Result<(), FetchError> {
        let range = self.window.virtual_range();
        let result = self.loader.request_range(range).await;
        self.sync_count(now_ms);
        result
    }

    /// Re-requests ranges that failed earlier. Intended for a retry button.
    pub async fn retry(&mut self, now_ms: u64) -> Result<(), FetchError> {
        let result = self.loader.retry_failed().await;
        self.sync_count(now_ms);
        result
    }

    /// Renders the materialized rows; rows that are not cached become skeletons.
    pub fn frame<D>(&self, render_item: impl FnMut(&T, usize) -> D) -> Frame<D> {
        let store = self.store();
        render_list(&self.window, |i| store.peek(i), render_item)
    }

    /// Renders the materialized rows as table cells.
    pub fn table<D>(&self, columns: &[ColumnDef<T, D>]) -> TableFrame<D>
    where
        D: From<flowview::CellValue>,
    {
        let store = self.store();
        render_table(&self.window, columns, |i| store.peek(i))
    }

    /// The row behind the current selection, when it is cached.
    pub fn selected_item(&self) -> Option<T> {
        self.window.selected().and_then(|i| self.store().peek(i))
    }
}
