//! Row-wise table assembly.
//!
//! GeoJSON properties, dBase records and SQL rows all arrive one row at a
//! time with loosely typed values. `TableBuilder` collects them per column
//! and picks a single polars dtype for each column when finished.

use std::collections::{HashMap, HashSet};

use polars::prelude::{Column, DataFrame, IntoColumn, NamedFrom, PlSmallStr, PolarsResult, Series};
use tracing::debug;

/// A single loosely typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    fn render(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Bool(b) => Some(b.to_string()),
            CellValue::Int(i) => Some(i.to_string()),
            CellValue::Float(f) => Some(f.to_string()),
            CellValue::Text(s) => Some(s.clone()),
        }
    }
}

/// `name` with the first pandas-style `.N` suffix not in `taken`.
pub fn unique_name(name: &str, taken: &HashSet<String>) -> String {
    let mut n = 1;
    loop {
        let candidate = format!("{}.{}", name, n);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Dtype chosen for a finished column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Null,
    Bool,
    Int,
    Float,
    Text,
}

impl ColumnKind {
    fn widen(self, value: &CellValue) -> Self {
        use ColumnKind::*;
        let other = match value {
            CellValue::Null => return self,
            CellValue::Bool(_) => Bool,
            CellValue::Int(_) => Int,
            CellValue::Float(_) => Float,
            CellValue::Text(_) => Text,
        };
        match (self, other) {
            (Null, k) => k,
            (a, b) if a == b => a,
            (Int, Float) | (Float, Int) => Float,
            _ => Text,
        }
    }
}

#[derive(Debug)]
struct ColumnValues {
    name: String,
    values: Vec<CellValue>,
}

impl ColumnValues {
    fn finish(self) -> Series {
        let kind = self
            .values
            .iter()
            .fold(ColumnKind::Null, |kind, v| kind.widen(v));
        let name = PlSmallStr::from(self.name.as_str());

        match kind {
            ColumnKind::Bool => {
                let values: Vec<Option<bool>> = self
                    .values
                    .iter()
                    .map(|v| match v {
                        CellValue::Bool(b) => Some(*b),
                        _ => None,
                    })
                    .collect();
                Series::new(name, values)
            }
            ColumnKind::Int => {
                let values: Vec<Option<i64>> = self
                    .values
                    .iter()
                    .map(|v| match v {
                        CellValue::Int(i) => Some(*i),
                        _ => None,
                    })
                    .collect();
                Series::new(name, values)
            }
            ColumnKind::Float => {
                let values: Vec<Option<f64>> = self
                    .values
                    .iter()
                    .map(|v| match v {
                        CellValue::Int(i) => Some(*i as f64),
                        CellValue::Float(f) => Some(*f),
                        _ => None,
                    })
                    .collect();
                Series::new(name, values)
            }
            // Mixed and all-null columns become strings
            ColumnKind::Text | ColumnKind::Null => {
                let values: Vec<Option<String>> =
                    self.values.iter().map(CellValue::render).collect();
                Series::new(name, values)
            }
        }
    }
}

/// Accumulates rows whose set of columns may vary.
///
/// Columns keep first-seen order. A column first seen at row `n` is
/// back-filled with nulls, and a column missing from a row gets a null.
#[derive(Debug, Default)]
pub struct TableBuilder {
    columns: Vec<ColumnValues>,
    index: HashMap<String, usize>,
    rows: usize,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a column up front so it exists even when no row sets it.
    pub fn declare(&mut self, name: &str) {
        self.column_index(name);
    }

    fn column_index(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.columns.len();
        self.columns.push(ColumnValues {
            name: name.to_string(),
            values: vec![CellValue::Null; self.rows],
        });
        self.index.insert(name.to_string(), idx);
        idx
    }

    /// Append one row.
    pub fn push_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = (S, CellValue)>,
        S: AsRef<str>,
    {
        for (name, value) in cells {
            let idx = self.column_index(name.as_ref());
            let column = &mut self.columns[idx];
            if column.values.len() > self.rows {
                // Duplicate key in the same row: last value wins
                column.values[self.rows] = value;
            } else {
                column.values.push(value);
            }
        }
        self.rows += 1;
        for column in &mut self.columns {
            if column.values.len() < self.rows {
                column.values.push(CellValue::Null);
            }
        }
    }

    /// Number of rows pushed so far.
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Build the DataFrame, appending `extra` columns (e.g. geometry) last.
    ///
    /// A row column named like one of `extra` is renamed with a `.N`
    /// suffix; the `extra` names are kept as given.
    pub fn finish(self, extra: Vec<Series>) -> PolarsResult<DataFrame> {
        let reserved: HashSet<&str> = extra.iter().map(|s| s.name().as_str()).collect();
        let mut taken: HashSet<String> = self
            .columns
            .iter()
            .map(|c| c.name.clone())
            .chain(reserved.iter().map(|name| name.to_string()))
            .collect();

        let mut columns: Vec<Column> = Vec::with_capacity(self.columns.len() + extra.len());
        for values in self.columns {
            let mut series = values.finish();
            if reserved.contains(series.name().as_str()) {
                let renamed = unique_name(series.name(), &taken);
                debug!(column = %series.name(), renamed = %renamed, "Renamed duplicate column");
                taken.insert(renamed.clone());
                series.rename(renamed.into());
            }
            columns.push(series.into_column());
        }
        columns.extend(extra.into_iter().map(IntoColumn::into_column));
        DataFrame::new(columns)
    }
}
