//! Turning a window into materialized rows.

use core::borrow::Borrow;
use core::fmt;

use crate::key::KeyCacheKey;
use crate::{CellValue, ColumnDef, ColumnWidth, IndexRange, TextAlign, Window};

#[derive(Clone, Debug, PartialEq)]
pub enum RowContent<D> {
    Item(D),
    /// Row-sized stand-in for data that is not loaded yet, or for a loading placeholder slot.
    Skeleton,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderedRow<D> {
    pub index: usize,
    pub start: u64,
    pub size: u32,
    pub selected: bool,
    pub content: RowContent<D>,
}

impl<D> RenderedRow<D> {
    pub fn is_skeleton(&self) -> bool {
        matches!(self.content, RowContent::Skeleton)
    }
}

/// The output of one render pass.
///
/// `total_size` is the height to give the scroll container; only `rows` are materialized.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame<D> {
    pub total_size: u64,
    pub range: IndexRange,
    pub rows: Vec<RenderedRow<D>>,
}

impl<D> Frame<D> {
    pub fn skeleton_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_skeleton()).count()
    }
}

/// Renders the materialized slots of `window`.
///
/// `lookup` returns the row at a global index when it is available; missing rows and
/// loading placeholders render as [`RowContent::Skeleton`].
pub fn render_list<K, T, B, D>(
    window: &Window<K>,
    mut lookup: impl FnMut(usize) -> Option<B>,
    mut render_item: impl FnMut(&T, usize) -> D,
) -> Frame<D>
where
    K: KeyCacheKey,
    T: ?Sized,
    B: Borrow<T>,
{
    let selected = window.selected();
    let mut rows = Vec::with_capacity(window.virtual_range().len());
    window.for_each_virtual_item(|it| {
        let content = if it.placeholder {
            RowContent::Skeleton
        } else {
            match lookup(it.index) {
                Some(row) => RowContent::Item(render_item(row.borrow(), it.index)),
                None => RowContent::Skeleton,
            }
        };
        rows.push(RenderedRow {
            index: it.index,
            start: it.start,
            size: it.size,
            selected: selected == Some(it.index),
            content,
        });
    });
    Frame {
        total_size: window.total_size(),
        range: window.virtual_range(),
        rows,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HeaderCell {
    pub key: String,
    pub header: String,
    pub width: ColumnWidth,
    pub align: TextAlign,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TableBody<D> {
    /// Rendered instead of panicking when a table has no columns.
    NoColumns,
    Rows(Frame<Vec<D>>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableFrame<D> {
    pub header: Vec<HeaderCell>,
    pub body: TableBody<D>,
}

/// Renders the materialized slots of `window` as table rows, one cell per column.
pub fn render_table<K, T, B, D>(
    window: &Window<K>,
    columns: &[ColumnDef<T, D>],
    lookup: impl FnMut(usize) -> Option<B>,
) -> TableFrame<D>
where
    K: KeyCacheKey,
    B: Borrow<T>,
    D: From<CellValue>,
{
    if columns.is_empty() {
        vdebug!("render_table: no columns configured");
        return TableFrame {
            header: Vec::new(),
            body: TableBody::NoColumns,
        };
    }
    let header = columns
        .iter()
        .map(|c| HeaderCell {
            key: c.key.clone(),
            header: c.header.clone(),
            width: c.width,
            align: c.align,
        })
        .collect();
    let frame = render_list(window, lookup, |row: &T, index| {
        columns
            .iter()
            .map(|c| c.render_cell(row, index))
            .collect::<Vec<D>>()
    });
    TableFrame {
        header,
        body: TableBody::Rows(frame),
    }
}

/// Renders `rows` skeleton rows laid out like the first real rows would be.
///
/// Used for the initial loading state so the layout does not jump when data arrives.
pub fn render_skeleton<K: KeyCacheKey, D>(window: &Window<K>, rows: usize) -> Frame<D> {
    let mut start = window.options().padding_start as u64;
    let mut out = Vec::with_capacity(rows);
    for index in 0..rows {
        let size = window
            .item(index)
            .map(|it| it.size)
            .unwrap_or_else(|| window.options().item_size.estimate(index));
        out.push(RenderedRow {
            index,
            start,
            size,
            selected: false,
            content: RowContent::Skeleton,
        });
        start = start.saturating_add(size as u64);
    }
    Frame {
        total_size: start.saturating_add(window.options().padding_end as u64),
        range: IndexRange::new(0, rows),
        rows: out,
    }
}

/// Which of the mutually exclusive body states to show.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BodyState {
    Loading,
    /// Shown with a retry affordance.
    Error { message: String },
    Empty,
    Rows,
}

impl BodyState {
    /// Picks exactly one state, by priority: loading, then error, then empty.
    pub fn resolve<E: fmt::Display + ?Sized>(
        is_loading: bool,
        error: Option<&E>,
        is_empty: bool,
    ) -> Self {
        if is_loading {
            Self::Loading
        } else if let Some(error) = error {
            Self::Error {
                message: error.to_string(),
            }
        } else if is_empty {
            Self::Empty
        } else {
            Self::Rows
        }
    }
}
