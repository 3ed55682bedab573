//! Column definitions for table rendering.

use core::fmt;
use std::sync::Arc;

/// A projected cell value.
///
/// Columns project rows into this small set of scalar shapes instead of untyped values; the
/// renderer falls back to `D::from(value)` when a column has no custom render function.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl CellValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for CellValue {
    fn from(v: u32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for CellValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl<V: Into<CellValue>> From<Option<V>> for CellValue {
    fn from(v: Option<V>) -> Self {
        v.map_or(Self::Empty, Into::into)
    }
}

impl From<CellValue> for String {
    fn from(v: CellValue) -> Self {
        v.to_string()
    }
}

/// Column width specification
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColumnWidth {
    /// Fixed width in pixels
    Fixed(f32),
    /// Flexible width with optional min/max
    Flex { min: Option<f32>, max: Option<f32> },
    /// Percentage of available space
    Percent(f32),
}

impl Default for ColumnWidth {
    fn default() -> Self {
        ColumnWidth::Flex {
            min: None,
            max: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

pub type CellRenderer<T, D> = Arc<dyn Fn(&CellValue, &T, usize) -> D + Send + Sync>;

/// Describes how to project a row of type `T` into one cell of display type `D`.
pub struct ColumnDef<T, D = String> {
    pub key: String,
    pub header: String,
    pub width: ColumnWidth,
    pub align: TextAlign,
    value: Arc<dyn Fn(&T) -> CellValue + Send + Sync>,
    render: Option<CellRenderer<T, D>>,
}

impl<T, D> Clone for ColumnDef<T, D> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            header: self.header.clone(),
            width: self.width,
            align: self.align,
            value: Arc::clone(&self.value),
            render: self.render.clone(),
        }
    }
}

impl<T, D> ColumnDef<T, D> {
    pub fn new(
        key: impl Into<String>,
        header: impl Into<String>,
        value: impl Fn(&T) -> CellValue + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            header: header.into(),
            width: ColumnWidth::default(),
            align: TextAlign::default(),
            value: Arc::new(value),
            render: None,
        }
    }

    pub fn fixed_width(mut self, width: f32) -> Self {
        self.width = ColumnWidth::Fixed(width);
        self
    }

    pub fn flex_width(mut self, min: Option<f32>, max: Option<f32>) -> Self {
        self.width = ColumnWidth::Flex { min, max };
        self
    }

    pub fn percent_width(mut self, percent: f32) -> Self {
        self.width = ColumnWidth::Percent(percent);
        self
    }

    pub fn align(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }

    /// Sets a custom cell renderer. It must be a pure function of its arguments.
    pub fn with_render(
        mut self,
        render: impl Fn(&CellValue, &T, usize) -> D + Send + Sync + 'static,
    ) -> Self {
        self.render = Some(Arc::new(render));
        self
    }

    pub fn has_render(&self) -> bool {
        self.render.is_some()
    }

    pub fn value(&self, row: &T) -> CellValue {
        (self.value)(row)
    }

    /// Renders a cell, falling back to the raw value when no renderer is set.
    pub fn render_cell(&self, row: &T, index: usize) -> D
    where
        D: From<CellValue>,
    {
        let value = self.value(row);
        match &self.render {
            Some(render) => render(&value, row, index),
            None => D::from(value),
        }
    }
}

impl<T, D> fmt::Debug for ColumnDef<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDef")
            .field("key", &self.key)
            .field("header", &self.header)
            .field("width", &self.width)
            .field("align", &self.align)
            .field("render", &self.render.is_some())
            .finish_non_exhaustive()
    }
}
