//! The page-fetch contract between the data layer and whatever serves flow logs.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::FetchError;

/// Server-reported paging metadata. `total` is authoritative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationState {
    /// 1-based page number.
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl PaginationState {
    /// Derives page counts and flags so that `has_next_page == page < total_pages` holds.
    pub fn new(page: usize, page_size: usize, total: usize) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(page_size)
        };
        Self {
            page,
            page_size,
            total,
            total_pages,
            has_next_page: page < total_pages,
            has_previous_page: page > 1,
        }
    }
}

/// One page of results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: PaginationState,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, page: usize, page_size: usize, total: usize) -> Self {
        Self {
            data,
            pagination: PaginationState::new(page, page_size, total),
        }
    }

    /// No more data after this page: either the server says so or the page came back empty.
    pub fn is_last(&self) -> bool {
        !self.pagination.has_next_page || self.data.is_empty()
    }
}

/// Serves pages of `T`. Pages are 1-based.
///
/// Implementations are driven on a single thread; the returned future does not need to be
/// `Send`.
pub trait PageSource<T> {
    fn fetch_page(
        &self,
        page: usize,
        page_size: usize,
    ) -> impl Future<Output = Result<Page<T>, FetchError>>;
}

/// Adapts an async closure `Fn(page, page_size) -> Future<Output = Result<Page<T>, FetchError>>`
/// into a [`PageSource`].
#[derive(Clone, Copy, Debug)]
pub struct FnSource<F>(pub F);

impl<T, F, Fut> PageSource<T> for FnSource<F>
where
    F: Fn(usize, usize) -> Fut,
    Fut: Future<Output = Result<Page<T>, FetchError>>,
{
    fn fetch_page(
        &self,
        page: usize,
        page_size: usize,
    ) -> impl Future<Output = Result<Page<T>, FetchError>> {
        (self.0)(page, page_size)
    }
}

/// Serves pages from an in-memory collection.
///
/// Useful for datasets that were uploaded as a whole and only need windowed access.
#[derive(Clone, Debug, Default)]
pub struct VecSource<T> {
    rows: Vec<T>,
}

impl<T> VecSource<T> {
    pub fn new(rows: Vec<T>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<T: Clone> PageSource<T> for VecSource<T> {
    async fn fetch_page(&self, page: usize, page_size: usize) -> Result<Page<T>, FetchError> {
        let total = self.rows.len();
        let start = page.saturating_sub(1).saturating_mul(page_size).min(total);
        let end = start.saturating_add(page_size).min(total);
        Ok(Page::new(self.rows[start..end].to_vec(), page, page_size, total))
    }
}
