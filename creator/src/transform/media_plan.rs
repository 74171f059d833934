//! Media plan exports.
//!
//! A media plan is a spreadsheet exported from the planning tool. Its header
//! may sit below a title block, it uses a wide range of "not available"
//! spellings, and older exports put line breaks inside two header names.

use std::path::Path;

use crate::error::{CreatorResult, TableResult};
use crate::logs::{log_info_indent, log_warning_indent};
use crate::parser::ReadOptions;
use crate::store::TabularStore;
use crate::table::{Cell, Table};

use super::Context;

/// Tokens read as absent cells in a media plan.
pub const MEDIA_PLAN_NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "null", "-nan", "1.#IND", "1.#QNAN", "N/A", "NULL",
    "NaN", "n/a", "nan",
];

pub const CAMPAIGN_NAME: &str = "Campaign Name";
pub const PLACEMENT_PHASE: &str = "Placement Phase (If Needed) ";
pub const CAMPAIGN_PHASE: &str = "Campaign Phase (If Needed) ";

const LEGACY_HEADERS: &[(&str, &str)] = &[
    ("Placement Phase\n(If Needed) ", PLACEMENT_PHASE),
    ("Campaign Phase\n(If Needed) ", CAMPAIGN_PHASE),
];

/// Campaign names the planners use as placeholders.
const CAMPAIGN_PLACEHOLDERS: &[&str] = &["_____"];

/// A loaded and cleaned media plan.
#[derive(Debug, Clone)]
pub struct MediaPlan {
    pub table: Table,
}

impl MediaPlan {
    /// Read options for a plan whose header is on record `header_row`.
    pub fn read_options(header_row: usize) -> ReadOptions {
        ReadOptions {
            header_row,
            na_values: MEDIA_PLAN_NA_VALUES.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn load(store: &dyn TabularStore, path: &Path, header_row: usize) -> TableResult<Self> {
        let table = store.read_with(path, &Self::read_options(header_row))?;
        Self::from_table(table)
    }

    /// Normalise legacy headers and blank placeholder campaign names.
    pub fn from_table(mut table: Table) -> TableResult<Self> {
        for (legacy, current) in LEGACY_HEADERS {
            table.rename_column(legacy, current);
        }
        if table.has_column(CAMPAIGN_NAME) {
            let cleaned: Vec<Cell> = table
                .column(CAMPAIGN_NAME)?
                .into_iter()
                .map(|name| match name.as_deref() {
                    Some(v) if CAMPAIGN_PLACEHOLDERS.contains(&v) => Some(String::new()),
                    _ => name.clone(),
                })
                .collect();
            table.set_column(CAMPAIGN_NAME, cleaned)?;
        }
        Ok(Self { table })
    }

    /// Unique values of each requested column, side by side.
    ///
    /// Columns missing from the plan are skipped with a warning. Shorter
    /// columns are padded with absent cells.
    pub fn plan_names(&self, columns: &[String]) -> TableResult<Table> {
        let mut found: Vec<(String, Vec<Cell>)> = Vec::new();
        for name in columns {
            match self.table.unique(name) {
                Ok(values) => found.push((name.clone(), values)),
                Err(_) => log_warning_indent(format!("{} not in media plan. Continuing.", name), 1),
            }
        }

        let height = found.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
        let mut out = Table::new(found.iter().map(|(n, _)| n.clone()).collect());
        for row in 0..height {
            let cells = found.iter().map(|(_, v)| v.get(row).cloned().flatten()).collect();
            out.push_row(cells)?;
        }
        Ok(out)
    }
}

/// Runs `derive_plan` jobs.
pub struct PlanNameExtractor<'a> {
    ctx: Context<'a>,
}

impl<'a> PlanNameExtractor<'a> {
    pub fn new(ctx: Context<'a>) -> Self {
        Self { ctx }
    }

    /// Write the unique plan values of `columns` to `destination`.
    pub fn apply(&self, plan: &MediaPlan, destination: &Path, columns: &[String]) -> CreatorResult<usize> {
        let names = plan.plan_names(columns)?;
        if names.width() == 0 {
            log_warning_indent(
                format!("None of {:?} in media plan, {} not written", columns, destination.display()),
                1,
            );
            return Ok(0);
        }
        self.ctx.store.write(&names, destination)?;
        log_info_indent(
            format!("Wrote {} plan value row(s) to {}", names.len(), destination.display()),
            1,
        );
        Ok(names.len())
    }
}
