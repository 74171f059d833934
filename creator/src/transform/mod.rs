//! Spreadsheet transformation components.
//!
//! - `relation`: Derive a column by positional decomposition, then map it through relation rules
//! - `duplicate`: Expand a template once per unique key, with an optional upload filter
//! - `combine`: Cartesian product of candidate values into composite names
//! - `match_table`: Collapse a wide ad match table into relation, name and filter files
//! - `media_plan`: Unique column values from a media plan export
//!
//! Every component reads and writes through a [`Context`], never through
//! global paths.

pub mod combine;
pub mod duplicate;
pub mod match_table;
pub mod media_plan;
pub mod relation;

use crate::config::Paths;
use crate::store::TabularStore;

pub use combine::{combine, CombinationGenerator};
pub use duplicate::{apply_upload_filter, expand, DuplicationExpander};
pub use match_table::{collapse_variants, transpile, MatchTableTranspiler, TranspileOutput, VariantFamily};
pub use media_plan::{MediaPlan, PlanNameExtractor, MEDIA_PLAN_NA_VALUES};
pub use relation::{derive_raw_values, resolve_group, ColumnCounts, RelationResolver};

/// Storage and filesystem layout handed to each component.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub store: &'a dyn TabularStore,
    pub paths: &'a Paths,
}

impl<'a> Context<'a> {
    pub fn new(store: &'a dyn TabularStore, paths: &'a Paths) -> Self {
        Self { store, paths }
    }
}
