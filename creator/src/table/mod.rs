//! In-memory labeled table.
//!
//! A [`Table`] is an ordered list of column names plus rows of [`Cell`]s.
//! A cell is `None` when the spreadsheet had nothing there and `Some("")`
//! when a component deliberately blanked it; the two are never conflated.

use std::collections::HashSet;

use crate::error::{TableError, TableResult};

/// A single spreadsheet cell.
pub type Cell = Option<String>;

/// Separator used to decompose compound names into positional parts.
pub const PART_SEPARATOR: char = '_';

/// Separator used for lists stored inside a single cell.
pub const LIST_SEPARATOR: char = '|';

/// Rows × named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create an empty table with the given columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from string literals; empty strings become absent cells.
    pub fn from_literals(columns: &[&str], rows: &[&[&str]]) -> TableResult<Self> {
        let mut table = Self::new(columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            table.push_row(
                row.iter()
                    .map(|v| if v.is_empty() { None } else { Some(v.to_string()) })
                    .collect(),
            )?;
        }
        Ok(table)
    }

    /// A one-column table.
    pub fn from_column(name: impl Into<String>, values: Vec<Cell>) -> Self {
        Self {
            columns: vec![name.into()],
            rows: values.into_iter().map(|v| vec![v]).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of a column that must exist.
    pub fn require_column(&self, name: &str) -> TableResult<usize> {
        self.column_index(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    /// Cell at `row` in column `name`.
    pub fn cell(&self, row: usize, name: &str) -> Option<&Cell> {
        let idx = self.column_index(name)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Present value at `row` in column `name`.
    pub fn value(&self, row: usize, name: &str) -> Option<&str> {
        self.cell(row, name).and_then(|c| c.as_deref())
    }

    /// All cells of a column, top to bottom.
    pub fn column(&self, name: &str) -> TableResult<Vec<&Cell>> {
        let idx = self.require_column(name)?;
        Ok(self.rows.iter().map(|r| &r[idx]).collect())
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> TableResult<()> {
        if row.len() != self.columns.len() {
            return Err(TableError::ShapeMismatch {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Add a column filled with absent cells if it is not there yet.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(None);
        }
        self.columns.len() - 1
    }

    /// Replace (or add) a column with one value per row.
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) -> TableResult<()> {
        if values.len() != self.rows.len() {
            return Err(TableError::ShapeMismatch {
                expected: self.rows.len(),
                actual: values.len(),
            });
        }
        let idx = self.ensure_column(name);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = value;
        }
        Ok(())
    }

    /// Set every row of a column to the same value.
    pub fn fill_column(&mut self, name: &str, value: Cell) {
        let idx = self.ensure_column(name);
        for row in &mut self.rows {
            row[idx] = value.clone();
        }
    }

    pub fn rename_column(&mut self, from: &str, to: &str) {
        if let Some(idx) = self.column_index(from) {
            self.columns[idx] = to.to_string();
        }
    }

    /// Distinct cells of a column in order of first appearance.
    pub fn unique(&self, name: &str) -> TableResult<Vec<Cell>> {
        let cells = self.column(name)?;
        let mut seen = HashSet::new();
        Ok(cells
            .into_iter()
            .filter(|c| seen.insert(*c))
            .cloned()
            .collect())
    }

    /// A new table holding only `names`, in that order.
    pub fn select(&self, names: &[String]) -> TableResult<Table> {
        let indices = names
            .iter()
            .map(|n| self.require_column(n))
            .collect::<TableResult<Vec<_>>>()?;
        Ok(Table {
            columns: names.to_vec(),
            rows: self
                .rows
                .iter()
                .map(|r| indices.iter().map(|&i| r[i].clone()).collect())
                .collect(),
        })
    }

    /// Reshape to `names`, dropping other columns and leaving new ones absent.
    pub fn conform(&self, names: &[String]) -> Table {
        let indices: Vec<Option<usize>> = names.iter().map(|n| self.column_index(n)).collect();
        Table {
            columns: names.to_vec(),
            rows: self
                .rows
                .iter()
                .map(|r| indices.iter().map(|i| i.and_then(|i| r[i].clone())).collect())
                .collect(),
        }
    }

    /// Rows for which `keep` returns true.
    pub fn filter_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&Table, usize) -> bool,
    {
        let rows = (0..self.rows.len())
            .filter(|&i| keep(self, i))
            .map(|i| self.rows[i].clone())
            .collect();
        Table {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Rows whose value in `name` is one of `values`.
    pub fn filter_in(&self, name: &str, values: &[String]) -> TableResult<Table> {
        let idx = self.require_column(name)?;
        Ok(self.filter_rows(|t, i| {
            t.rows[i][idx]
                .as_ref()
                .is_some_and(|v| values.iter().any(|allowed| allowed == v))
        }))
    }

    /// Append another table's rows, aligning by column name.
    ///
    /// Columns only present in `other` are added; cells a side lacks stay absent.
    pub fn append(&mut self, other: &Table) {
        for name in &other.columns {
            self.ensure_column(name);
        }
        let indices: Vec<usize> = other
            .columns
            .iter()
            .filter_map(|n| self.column_index(n))
            .collect();
        for row in &other.rows {
            let mut new_row = vec![None; self.columns.len()];
            for (cell, &idx) in row.iter().zip(&indices) {
                new_row[idx] = cell.clone();
            }
            self.rows.push(new_row);
        }
    }

    /// Remove repeated rows, keeping the first occurrence.
    pub fn drop_duplicates(&mut self) {
        let mut seen = HashSet::new();
        self.rows.retain(|row| seen.insert(row.clone()));
    }

    /// Carry the last present value of a column down over absent cells.
    pub fn forward_fill(&mut self, name: &str) -> TableResult<()> {
        let idx = self.require_column(name)?;
        let mut last: Cell = None;
        for row in &mut self.rows {
            match &row[idx] {
                Some(v) => last = Some(v.clone()),
                None => row[idx] = last.clone(),
            }
        }
        Ok(())
    }

    /// Positional part of every cell of a column, see [`split_part`].
    pub fn split_column(&self, name: &str, position: i64) -> TableResult<Vec<Cell>> {
        Ok(self
            .column(name)?
            .into_iter()
            .map(|c| c.as_deref().and_then(|v| split_part(v, position)))
            .collect())
    }
}

/// Split `value` on `_` and take the part at `position`.
///
/// Negative positions count from the end. Out-of-range positions yield `None`.
pub fn split_part(value: &str, position: i64) -> Cell {
    let parts: Vec<&str> = value.split(PART_SEPARATOR).collect();
    let idx = if position < 0 {
        parts.len().checked_sub(position.unsigned_abs() as usize)?
    } else {
        position as usize
    };
    parts.get(idx).map(|p| p.to_string())
}

/// Split a pipe-delimited list, keeping empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value.split(LIST_SEPARATOR).map(str::to_string).collect()
}
