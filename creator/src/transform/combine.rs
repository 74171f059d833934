//! Combination generator.
//!
//! Every column of a candidate table is one axis; the generated names are
//! the `_`-joined tuples of the Cartesian product, first column varying
//! slowest.

use std::path::Path;

use crate::error::CreatorResult;
use crate::logs::log_info_indent;
use crate::table::{Table, PART_SEPARATOR};

use super::Context;

/// Runs `create` jobs.
pub struct CombinationGenerator<'a> {
    ctx: Context<'a>,
}

impl<'a> CombinationGenerator<'a> {
    pub fn new(ctx: Context<'a>) -> Self {
        Self { ctx }
    }

    /// Write the combinations of `candidates` into `column` of `destination`.
    ///
    /// Without `overwrite` the names are appended as new rows whose other
    /// columns stay blank. With `overwrite` the destination keeps its columns
    /// but holds only the new rows. A missing destination starts out as a
    /// table with just `column`.
    ///
    /// Returns the number of generated names.
    pub fn apply(&self, candidates: &Table, destination: &Path, column: &str, overwrite: bool) -> CreatorResult<usize> {
        let names = combine(candidates);

        let existing = if self.ctx.store.exists(destination) {
            self.ctx.store.read(destination)?
        } else {
            log_info_indent(format!("{} does not exist yet, creating it", destination.display()), 1);
            Table::new(vec![column.to_string()])
        };

        let mut columns = existing.columns().to_vec();
        if !existing.has_column(column) {
            columns.push(column.to_string());
        }
        let count = names.len();
        let new_rows = Table::from_column(column, names.into_iter().map(Some).collect()).conform(&columns);

        let table = if overwrite {
            new_rows
        } else {
            let mut table = existing;
            table.append(&new_rows);
            table
        };

        self.ctx.store.write(&table, destination)?;
        log_info_indent(format!("Generated {} value(s) for '{}'", count, column), 1);
        Ok(count)
    }
}

/// Cartesian product of the present, non-empty values of each column.
///
/// A table without columns yields nothing, as does any column without values.
pub fn combine(candidates: &Table) -> Vec<String> {
    if candidates.width() == 0 {
        return Vec::new();
    }

    let mut tuples: Vec<Vec<&str>> = vec![Vec::new()];
    for idx in 0..candidates.width() {
        let axis: Vec<&str> = candidates
            .rows()
            .iter()
            .filter_map(|row| row[idx].as_deref())
            .filter(|v| !v.is_empty())
            .collect();
        tuples = tuples
            .iter()
            .flat_map(|prefix| {
                axis.iter().map(move |value| {
                    let mut tuple = prefix.clone();
                    tuple.push(*value);
                    tuple
                })
            })
            .collect();
    }

    let separator = PART_SEPARATOR.to_string();
    tuples.into_iter().map(|t| t.join(&separator)).collect()
}
