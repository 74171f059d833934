//! Relation resolver.
//!
//! For every impacted column named in a relation-rule table:
//!
//! ```text
//! source columns ──split on '_'──▶ raw value ──relation map──▶ impacted column
//!                                      │
//!                                      └─ no match ──▶ blank cell + error report
//! ```
//!
//! Error reports live under the error directory, one file per
//! (destination, column). A report exists exactly while its most recent run
//! found undefined values.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::{CreatorResult, TableResult};
use crate::logs::{log_info_indent, log_warning_indent};
use crate::models::{PositionSpec, RelationGroup, UndefinedValueReport};
use crate::table::{Cell, Table, LIST_SEPARATOR};

use super::Context;

/// Undefined-value count per impacted column.
pub type ColumnCounts = BTreeMap<String, usize>;

/// Applies relation-rule tables to destination files.
pub struct RelationResolver<'a> {
    ctx: Context<'a>,
}

impl<'a> RelationResolver<'a> {
    pub fn new(ctx: Context<'a>) -> Self {
        Self { ctx }
    }

    /// Apply `rules` to the table stored at `destination` and write it back.
    ///
    /// Returns the number of distinct undefined values per impacted column.
    pub fn apply(&self, destination: &Path, rules: &Table) -> CreatorResult<ColumnCounts> {
        let groups = RelationGroup::from_table(rules)?;
        let mut table = self.ctx.store.read(destination)?;
        let reports = groups
            .iter()
            .map(|group| resolve_group(&mut table, group))
            .collect::<TableResult<Vec<_>>>()?;

        // Reports follow the destination, never precede it.
        self.ctx.store.write(&table, destination)?;

        let mut counts = ColumnCounts::new();
        for report in &reports {
            self.sync_report(destination, report)?;
            counts.insert(report.impacted_column.clone(), report.count());
        }
        Ok(counts)
    }

    /// Write the report when it has values, delete a stale one otherwise.
    fn sync_report(&self, destination: &Path, report: &UndefinedValueReport) -> CreatorResult<()> {
        let path = self.ctx.paths.error_report_path(destination, &report.impacted_column);

        if report.is_empty() {
            if self.ctx.store.remove(&path)? {
                log_info_indent(format!("Removed resolved error report {}", path.display()), 1);
            }
            return Ok(());
        }

        log_warning_indent(
            format!(
                "No match found for {} value(s) of '{}' in {}, they were left blank. \
                 An error report was generated at {}: {:?}",
                report.count(),
                report.impacted_column,
                destination.display(),
                path.display(),
                report.sample(5)
            ),
            1,
        );
        self.ctx.store.write(&report.to_table(), &path)?;
        Ok(())
    }
}

/// Apply one relation group to `table` in place.
///
/// Undefined rows are set to the empty string; the returned report lists
/// their distinct raw values (empty for constant fills).
pub fn resolve_group(table: &mut Table, group: &RelationGroup) -> TableResult<UndefinedValueReport> {
    let column = &group.impacted_column;

    if group.positions == PositionSpec::Constant {
        let value = group.pairs.first().and_then(|(_, new)| new.clone());
        table.fill_column(column, value);
        return Ok(UndefinedValueReport::new(column.clone(), Vec::new()));
    }

    let raw = derive_raw_values(table, &group.source_columns, &group.positions)?;

    // Later rules win over earlier ones for the same match value.
    let map: HashMap<&Cell, &Cell> = group.pairs.iter().map(|(k, v)| (k, v)).collect();

    let mut undefined = Vec::new();
    let resolved: Vec<Cell> = raw
        .into_iter()
        .map(|value| match map.get(&value) {
            Some(&new) => new.clone(),
            None => {
                undefined.push(value);
                Some(String::new())
            }
        })
        .collect();

    table.set_column(column, resolved)?;
    Ok(UndefinedValueReport::new(column.clone(), undefined))
}

/// Raw per-row values of an impacted column before mapping.
///
/// - `Verbatim` copies the first source column.
/// - `Positions` extracts one piece per entry and joins them with `|`; an
///   absent piece makes the whole value absent.
///
/// When there are more positions than source columns, the first source
/// column is repeated to make up the difference; surplus source columns are
/// ignored. Both cases are logged.
pub fn derive_raw_values(table: &Table, source_columns: &[String], positions: &PositionSpec) -> TableResult<Vec<Cell>> {
    let first = source_columns.first().map(String::as_str).unwrap_or_default();

    let positions = match positions {
        PositionSpec::Verbatim | PositionSpec::Constant => {
            return Ok(table.column(first)?.into_iter().cloned().collect());
        }
        PositionSpec::Positions(positions) => positions,
    };

    let mut columns: Vec<&str> = source_columns.iter().map(String::as_str).collect();
    if positions.len() != columns.len() {
        log_warning_indent(
            format!("Length mismatch between {:?} and {:?}", source_columns, positions),
            1,
        );
        while columns.len() < positions.len() {
            columns.push(first);
        }
    }

    let mut values: Vec<Cell> = Vec::new();
    for (idx, position) in positions.iter().enumerate() {
        let piece = match position {
            None => table.column(columns[idx])?.into_iter().cloned().collect(),
            Some(p) => table.split_column(columns[idx], *p)?,
        };
        if idx == 0 {
            values = piece;
            continue;
        }
        values = values
            .into_iter()
            .zip(piece)
            .map(|(acc, next)| match (acc, next) {
                (Some(acc), Some(next)) => Some(format!("{}{}{}", acc, LIST_SEPARATOR, next)),
                _ => None,
            })
            .collect();
    }

    Ok(values)
}
