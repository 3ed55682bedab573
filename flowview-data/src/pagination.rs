//! Page-at-a-time and append-on-demand loading over a [`PageSource`].

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use flowview::DataAggregator;
use futures::future::{self, FutureExt, LocalBoxFuture, Shared};
use serde::{Deserialize, Serialize};

use crate::{FetchError, Page, PageSource, PaginationState};

/// How pages are presented. Fixed for the lifetime of a [`PaginationManager`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// One page at a time; `set_page` swaps the data.
    #[default]
    Discrete,
    /// Pages accumulate; `load_more` appends.
    Infinite,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    Error,
}

/// Snapshot of a [`PaginationManager`].
#[derive(Clone, Debug)]
pub struct PaginationView<T> {
    pub data: Rc<Vec<T>>,
    pub pagination: Option<PaginationState>,
    pub status: LoadStatus,
    /// Loading with nothing to show yet.
    pub is_loading: bool,
    /// Any fetch in flight, including background ones behind existing data.
    pub is_fetching: bool,
    pub error: Option<FetchError>,
    /// No data and not loading.
    pub is_empty: bool,
    pub has_next_page: bool,
}

type LoadResult = Result<(), FetchError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Apply {
    Replace,
    Append,
}

struct PagerState<T> {
    mode: FetchMode,
    page_size: usize,
    status: LoadStatus,
    data: Rc<Vec<T>>,
    pagination: Option<PaginationState>,
    error: Option<FetchError>,
    // Current page in discrete mode, last appended page in infinite mode.
    page: usize,
    exhausted: bool,
    seq: u64,
    in_flight: Option<((usize, Apply), Shared<LocalBoxFuture<'static, LoadResult>>)>,
    aggregator: Option<Rc<RefCell<DataAggregator<T>>>>,
}

impl<T: Clone> PagerState<T> {
    fn apply(&mut self, page: Page<T>, apply: Apply) {
        let number = page.pagination.page;
        self.exhausted = page.is_last();
        self.pagination = Some(page.pagination);
        match apply {
            Apply::Replace => {
                if let Some(agg) = &self.aggregator {
                    agg.borrow_mut().reset(page.data.clone());
                }
                self.data = Rc::new(page.data);
            }
            Apply::Append => {
                if let Some(agg) = &self.aggregator {
                    agg.borrow_mut().add(page.data.iter().cloned());
                }
                Rc::make_mut(&mut self.data).extend(page.data);
            }
        }
        self.page = number;
        self.status = LoadStatus::Loaded;
        self.error = None;
    }
}

/// Loads pages from a [`PageSource`] in discrete or infinite mode.
///
/// State machine: `Idle -> Loading -> {Loaded, Error}`, and back to `Loading` on any new
/// request. Data is stale-while-revalidate: a request never clears what is shown; results
/// replace (discrete, refresh) or extend (infinite) it atomically when they arrive. A failure
/// keeps the data and sets `error`.
///
/// Only the latest request may change state. An identical request while one is in flight
/// attaches to it; a different one supersedes it and the older response is dropped.
pub struct PaginationManager<T, S> {
    source: Rc<S>,
    state: Rc<RefCell<PagerState<T>>>,
}

impl<T, S> Clone for PaginationManager<T, S> {
    fn clone(&self) -> Self {
        Self {
            source: Rc::clone(&self.source),
            state: Rc::clone(&self.state),
        }
    }
}

impl<T, S> PaginationManager<T, S> {
    pub fn new(source: S, mode: FetchMode, page_size: usize) -> Self {
        Self {
            source: Rc::new(source),
            state: Rc::new(RefCell::new(PagerState {
                mode,
                page_size: page_size.max(1),
                status: LoadStatus::Idle,
                data: Rc::new(Vec::new()),
                pagination: None,
                error: None,
                page: 0,
                exhausted: false,
                seq: 0,
                in_flight: None,
                aggregator: None,
            })),
        }
    }

    /// Keeps `aggregator` in sync with the accumulated data: replaced on swaps and refreshes,
    /// extended on appends.
    pub fn with_aggregator(self, aggregator: Rc<RefCell<DataAggregator<T>>>) -> Self {
        self.state.borrow_mut().aggregator = Some(aggregator);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn mode(&self) -> FetchMode {
        self.state.borrow().mode
    }

    pub fn page_size(&self) -> usize {
        self.state.borrow().page_size
    }

    /// Current page (discrete) or last appended page (infinite); 0 before the first load.
    pub fn page(&self) -> usize {
        self.state.borrow().page
    }

    pub fn status(&self) -> LoadStatus {
        self.state.borrow().status
    }

    pub fn data(&self) -> Rc<Vec<T>> {
        Rc::clone(&self.state.borrow().data)
    }

    pub fn pagination(&self) -> Option<PaginationState> {
        self.state.borrow().pagination
    }

    pub fn error(&self) -> Option<FetchError> {
        self.state.borrow().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        let st = self.state.borrow();
        st.status == LoadStatus::Loading && st.data.is_empty()
    }

    pub fn is_fetching(&self) -> bool {
        self.state.borrow().status == LoadStatus::Loading
    }

    pub fn is_empty(&self) -> bool {
        let st = self.state.borrow();
        st.data.is_empty() && matches!(st.status, LoadStatus::Loaded | LoadStatus::Error)
    }

    /// `false` once a page reported no next page (or came back empty).
    pub fn has_next_page(&self) -> bool {
        !self.state.borrow().exhausted
    }

    pub fn view(&self) -> PaginationView<T> {
        let st = self.state.borrow();
        let is_loading = st.status == LoadStatus::Loading && st.data.is_empty();
        PaginationView {
            data: Rc::clone(&st.data),
            pagination: st.pagination,
            status: st.status,
            is_loading,
            is_fetching: st.status == LoadStatus::Loading,
            error: st.error.clone(),
            is_empty: st.data.is_empty()
                && matches!(st.status, LoadStatus::Loaded | LoadStatus::Error),
            has_next_page: !st.exhausted,
        }
    }

    /// Back to `Idle` with no data. Responses to earlier requests are ignored.
    pub fn reset(&self) {
        let mut st = self.state.borrow_mut();
        st.seq += 1;
        st.status = LoadStatus::Idle;
        st.data = Rc::new(Vec::new());
        st.pagination = None;
        st.error = None;
        st.page = 0;
        st.exhausted = false;
        st.in_flight = None;
        if let Some(agg) = &st.aggregator {
            agg.borrow_mut().reset(Vec::new());
        }
        vdebug!(seq = st.seq, "pagination reset");
    }
}

impl<T, S> PaginationManager<T, S>
where
    T: Clone + 'static,
    S: PageSource<T> + 'static,
{
    /// Loads the first page.
    pub fn load(&self) -> LocalBoxFuture<'static, LoadResult> {
        self.request(1, Apply::Replace)
    }

    /// Discrete mode: shows page `page` (1-based, clamped to the known page count) once it
    /// has loaded; the current data stays visible meanwhile.
    pub fn set_page(&self, page: usize) -> LocalBoxFuture<'static, LoadResult> {
        let target = {
            let st = self.state.borrow();
            if st.mode != FetchMode::Discrete {
                vwarn!(page, "set_page ignored in infinite mode");
                return future::ready(Ok(())).boxed_local();
            }
            let mut target = page.max(1);
            if let Some(p) = st.pagination {
                target = target.min(p.total_pages.max(1));
            }
            if target == st.page && st.status == LoadStatus::Loaded {
                return future::ready(Ok(())).boxed_local();
            }
            target
        };
        self.request(target, Apply::Replace)
    }

    /// Discrete mode: the next page; infinite mode: same as [`Self::load_more`].
    pub fn next_page(&self) -> LocalBoxFuture<'static, LoadResult> {
        let (mode, page, has_next) = {
            let st = self.state.borrow();
            (st.mode, st.page, !st.exhausted)
        };
        match mode {
            FetchMode::Infinite => self.load_more(),
            FetchMode::Discrete if has_next => self.set_page(page + 1),
            FetchMode::Discrete => future::ready(Ok(())).boxed_local(),
        }
    }

    /// Discrete mode: the previous page. No-op on page 1 and in infinite mode.
    pub fn previous_page(&self) -> LocalBoxFuture<'static, LoadResult> {
        let (mode, page) = {
            let st = self.state.borrow();
            (st.mode, st.page)
        };
        if mode != FetchMode::Discrete || page <= 1 {
            return future::ready(Ok(())).boxed_local();
        }
        self.set_page(page - 1)
    }

    /// Infinite mode: appends the next page. A no-op once the last page has been seen.
    ///
    /// After a failure, calling this again retries the same page.
    pub fn load_more(&self) -> LocalBoxFuture<'static, LoadResult> {
        let next = {
            let st = self.state.borrow();
            if st.mode != FetchMode::Infinite {
                vwarn!("load_more ignored in discrete mode");
                return future::ready(Ok(())).boxed_local();
            }
            if st.exhausted {
                vtrace!(page = st.page, "load_more: no more pages");
                return future::ready(Ok(())).boxed_local();
            }
            st.page + 1
        };
        let apply = if next == 1 {
            Apply::Replace
        } else {
            Apply::Append
        };
        self.request(next, apply)
    }

    /// Reloads in place. Discrete mode refetches the current page; infinite mode refetches
    /// page 1 and, on success, replaces the accumulated list with it.
    pub fn refresh(&self) -> LocalBoxFuture<'static, LoadResult> {
        let (mode, page) = {
            let st = self.state.borrow();
            (st.mode, st.page)
        };
        let page = match mode {
            FetchMode::Discrete => page.max(1),
            FetchMode::Infinite => 1,
        };
        self.request(page, Apply::Replace)
    }

    fn request(&self, page: usize, apply: Apply) -> LocalBoxFuture<'static, LoadResult> {
        let mut st = self.state.borrow_mut();
        if let Some((key, fut)) = &st.in_flight {
            if *key == (page, apply) {
                vtrace!(page, "attaching to in-flight page request");
                return fut.clone().boxed_local();
            }
        }

        st.seq += 1;
        let seq = st.seq;
        st.status = LoadStatus::Loading;
        let page_size = st.page_size;
        let source = Rc::clone(&self.source);
        let weak = Rc::downgrade(&self.state);
        vdebug!(page, page_size, ?apply, "requesting page");

        let fut = async move {
            let result = source.fetch_page(page, page_size).await;
            finish_request(&weak, seq, apply, result)
        }
        .boxed_local()
        .shared();
        st.in_flight = Some(((page, apply), fut.clone()));
        fut.boxed_local()
    }
}

fn finish_request<T: Clone>(
    weak: &Weak<RefCell<PagerState<T>>>,
    seq: u64,
    apply: Apply,
    result: Result<Page<T>, FetchError>,
) -> LoadResult {
    let Some(state) = weak.upgrade() else {
        return result.map(|_| ());
    };
    let mut st = state.borrow_mut();
    if st.seq != seq {
        vdebug!(seq, latest = st.seq, "dropping superseded page response");
        return result.map(|_| ());
    }
    st.in_flight = None;
    match result {
        Ok(page) => {
            vtrace!(page = page.pagination.page, rows = page.data.len(), "page loaded");
            st.apply(page, apply);
            Ok(())
        }
        Err(error) => {
            vwarn!(%error, "page request failed");
            st.status = LoadStatus::Error;
            st.error = Some(error.clone());
            Err(error)
        }
    }
}
