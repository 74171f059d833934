//! Typed configuration records.
//!
//! Every spreadsheet-sourced instruction is parsed once, at load time, into
//! one of these types:
//!
//! - [`Job`] - One row of the job table
//! - [`JobKind`] - Which component a job runs
//! - [`FieldSpec`] - The operation-specific compound field (`col::a|b::file::0,1`)
//! - [`RowFilter`] - Optional `column::v1|v2` source pre-filter
//! - [`MatchOutputs`] - The three files a match-table job writes
//! - [`RelationGroup`] - Relation rules sharing one impacted column
//! - [`UndefinedValueReport`] - Values a relation map could not resolve

use std::collections::HashSet;
use std::fmt;

use crate::error::{ConfigError, ConfigResult, TableResult};
use crate::table::{split_list, Cell, Table};

// =============================================================================
// Job table columns
// =============================================================================

pub const COL_FILE_NAME: &str = "file_name";
pub const COL_NEW_FILE: &str = "new_file";
pub const COL_CREATE_TYPE: &str = "create_type";
pub const COL_COLUMN_NAME: &str = "column_name";
pub const COL_OVERWRITE: &str = "overwrite";
pub const COL_FILE_FILTER: &str = "file_filter";

// =============================================================================
// Relation rule columns
// =============================================================================

pub const REL_IMPACTED_COLUMN: &str = "impacted_column_name";
pub const REL_COLUMN_NAME: &str = "column_name";
pub const REL_POSITION: &str = "position";
pub const REL_COLUMN_VALUE: &str = "column_value";
pub const REL_NEW_VALUE: &str = "impacted_column_new_value";

/// Position token that fills the impacted column with one constant.
pub const POSITION_CONSTANT: &str = "Constant";

/// Separator inside compound field specs.
pub const SPEC_SEPARATOR: &str = "::";

// =============================================================================
// Job
// =============================================================================

/// Which component a job runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    Create,
    Duplicate,
    Relate,
    DerivePlan,
    MatchTable,
    /// Anything else; running it does nothing.
    Unknown(String),
}

impl JobKind {
    /// Parse a `create_type` cell. Both the short and the long spellings are accepted.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "create" => Self::Create,
            "duplicate" => Self::Duplicate,
            "relate" | "relation" => Self::Relate,
            "derive_plan" | "mediaplan" => Self::DerivePlan,
            "match_table" | "match" => Self::MatchTable,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "create",
            Self::Duplicate => "duplicate",
            Self::Relate => "relate",
            Self::DerivePlan => "derive_plan",
            Self::MatchTable => "match_table",
            Self::Unknown(other) => other,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation-specific parameters of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSpec {
    /// No parameters (relate, unknown kinds).
    Empty,
    /// One destination column (create).
    Simple(String),
    /// Several columns (derive_plan).
    Columns(Vec<String>),
    /// `duplicated_column::template_col1|template_col2` (duplicate).
    WithTemplate { column: String, fields: Vec<String> },
    /// `duplicated_column::fields::filter_file[::idx,idx]` (duplicate + upload filter).
    WithFilter {
        column: String,
        fields: Vec<String>,
        file: String,
        indices: Vec<i64>,
    },
    /// Output files of a match-table job, taken from the destination field.
    Outputs(MatchOutputs),
}

impl FieldSpec {
    /// Parse the `column_name` (or, for match tables, `new_file`) cell for `kind`.
    pub fn parse(kind: &JobKind, column_name: Option<&str>, destination: &str) -> ConfigResult<Self> {
        match kind {
            JobKind::Create => {
                let column = required_spec(column_name)?;
                Ok(Self::Simple(column.to_string()))
            }
            JobKind::DerivePlan => {
                let raw = required_spec(column_name)?;
                Ok(Self::Columns(split_list(raw)))
            }
            JobKind::Duplicate => Self::parse_duplicate(required_spec(column_name)?),
            JobKind::MatchTable => Ok(Self::Outputs(MatchOutputs::parse(destination)?)),
            JobKind::Relate | JobKind::Unknown(_) => Ok(Self::Empty),
        }
    }

    fn parse_duplicate(raw: &str) -> ConfigResult<Self> {
        let invalid = |message: &str| ConfigError::InvalidFieldSpec {
            spec: raw.to_string(),
            message: message.to_string(),
        };
        let parts: Vec<&str> = raw.split(SPEC_SEPARATOR).collect();
        let column = parts[0].to_string();
        if column.is_empty() {
            return Err(invalid("duplicated column is empty"));
        }
        let fields = match parts.get(1) {
            Some(f) if !f.is_empty() => split_list(f),
            _ => return Err(invalid("expected 'column::template_col1|template_col2'")),
        };
        match parts.len() {
            2 => Ok(Self::WithTemplate { column, fields }),
            3 | 4 => {
                let file = parts[2].to_string();
                if file.is_empty() {
                    return Err(invalid("filter file is empty"));
                }
                let indices = match parts.get(3) {
                    Some(raw_indices) => parse_indices(raw_indices)
                        .ok_or_else(|| invalid("filter indices must be integers separated by ','"))?,
                    None => Vec::new(),
                };
                Ok(Self::WithFilter {
                    column,
                    fields,
                    file,
                    indices,
                })
            }
            _ => Err(invalid("too many '::' sections")),
        }
    }
}

fn required_spec(column_name: Option<&str>) -> ConfigResult<&str> {
    match column_name.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::InvalidFieldSpec {
            spec: String::new(),
            message: format!("'{}' is required for this job type", COL_COLUMN_NAME),
        }),
    }
}

/// Parse `"0,2,-1"` into positions.
pub fn parse_indices(raw: &str) -> Option<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_position)
        .collect()
}

/// Parse an integer position, accepting spreadsheet float renderings like `"1.0"`.
pub fn parse_position(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|f| f.fract() == 0.0 && f.is_finite())
            .map(|f| f as i64)
    })
}

/// `column::value1|value2` - keep source rows whose column is one of the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFilter {
    pub column: String,
    pub values: Vec<String>,
}

impl RowFilter {
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        match raw.split_once(SPEC_SEPARATOR) {
            Some((column, values)) if !column.is_empty() => Ok(Self {
                column: column.to_string(),
                values: split_list(values),
            }),
            _ => Err(ConfigError::InvalidRowFilter(raw.to_string())),
        }
    }

    pub fn apply(&self, table: &Table) -> TableResult<Table> {
        table.filter_in(&self.column, &self.values)
    }
}

/// Files written by a match-table job: `creator|filter[::idx,...]|relation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutputs {
    pub creator_file: String,
    pub filter_file: String,
    /// Positions of the grouping column to expose in the filter file.
    pub filter_indices: Vec<i64>,
    pub relation_file: String,
}

impl MatchOutputs {
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        let invalid = || ConfigError::InvalidOutputs(raw.to_string());
        let parts: Vec<&str> = raw.split('|').map(str::trim).collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }
        let (filter_file, filter_indices) = match parts[1].split_once(SPEC_SEPARATOR) {
            Some((file, indices)) => (file, parse_indices(indices).ok_or_else(invalid)?),
            None => (parts[1], Vec::new()),
        };
        Ok(Self {
            creator_file: parts[0].to_string(),
            filter_file: filter_file.to_string(),
            filter_indices,
            relation_file: parts[2].to_string(),
        })
    }
}

/// One declarative instruction from the job table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub source_file: String,
    pub destination_file: String,
    pub kind: JobKind,
    pub spec: FieldSpec,
    pub overwrite: bool,
    pub row_filter: Option<RowFilter>,
}

impl Job {
    /// Build a job from row `row` of a job table.
    pub fn from_row(table: &Table, row: usize) -> ConfigResult<Self> {
        let required = |field: &str| {
            table
                .value(row, field)
                .map(str::to_string)
                .ok_or_else(|| ConfigError::MissingValue {
                    row,
                    field: field.to_string(),
                })
        };

        let source_file = required(COL_FILE_NAME)?;
        let destination_file = required(COL_NEW_FILE)?;
        let kind = JobKind::parse(&required(COL_CREATE_TYPE)?);
        let spec = FieldSpec::parse(&kind, table.value(row, COL_COLUMN_NAME), &destination_file)?;
        let overwrite = parse_bool(table.value(row, COL_OVERWRITE))?;
        let row_filter = table
            .value(row, COL_FILE_FILTER)
            .filter(|f| !f.trim().is_empty())
            .map(RowFilter::parse)
            .transpose()?;

        Ok(Self {
            source_file,
            destination_file,
            kind,
            spec,
            overwrite,
            row_filter,
        })
    }
}

/// Interpret a spreadsheet boolean; blank means false.
pub fn parse_bool(value: Option<&str>) -> ConfigResult<bool> {
    let Some(raw) = value else {
        return Ok(false);
    };
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "1.0" | "yes" | "y" => Ok(true),
        "false" | "0" | "0.0" | "no" | "n" | "" => Ok(false),
        _ => Err(ConfigError::InvalidBool(raw.to_string())),
    }
}

// =============================================================================
// Relation rules
// =============================================================================

/// How a relation derives the raw value of its impacted column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionSpec {
    /// Position cell absent: copy the first source column verbatim.
    Verbatim,
    /// `Constant`: fill every row with the replacement value.
    Constant,
    /// One entry per extraction; `None` copies the column, `Some(i)` takes part `i`.
    Positions(Vec<Option<i64>>),
}

impl PositionSpec {
    pub fn parse(impacted_column: &str, raw: &Cell) -> ConfigResult<Self> {
        let Some(raw) = raw else {
            return Ok(Self::Verbatim);
        };
        if raw == POSITION_CONSTANT {
            return Ok(Self::Constant);
        }
        split_list(raw)
            .into_iter()
            .map(|token| {
                if token.trim().is_empty() {
                    Ok(None)
                } else {
                    parse_position(&token).map(Some).ok_or_else(|| ConfigError::InvalidPosition {
                        column: impacted_column.to_string(),
                        value: token.clone(),
                    })
                }
            })
            .collect::<ConfigResult<Vec<_>>>()
            .map(Self::Positions)
    }
}

/// Relation rules sharing one impacted column.
///
/// Source columns and positions come from the first rule of the group; every
/// rule contributes one `match_value -> replacement_value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationGroup {
    pub impacted_column: String,
    pub source_columns: Vec<String>,
    pub positions: PositionSpec,
    pub pairs: Vec<(Cell, Cell)>,
}

impl RelationGroup {
    /// Group a relation-rule table by impacted column, in order of first appearance.
    pub fn from_table(table: &Table) -> ConfigResult<Vec<Self>> {
        for column in [REL_IMPACTED_COLUMN, REL_COLUMN_NAME, REL_POSITION, REL_COLUMN_VALUE, REL_NEW_VALUE] {
            if !table.has_column(column) {
                return Err(ConfigError::MissingColumn(column.to_string()));
            }
        }

        let mut groups: Vec<Self> = Vec::new();
        for row in 0..table.len() {
            let Some(impacted) = table.value(row, REL_IMPACTED_COLUMN) else {
                continue;
            };
            let pair = (
                table.cell(row, REL_COLUMN_VALUE).cloned().flatten(),
                table.cell(row, REL_NEW_VALUE).cloned().flatten(),
            );
            if let Some(group) = groups.iter_mut().find(|g| g.impacted_column == impacted) {
                group.pairs.push(pair);
                continue;
            }

            let positions = PositionSpec::parse(impacted, &table.cell(row, REL_POSITION).cloned().flatten())?;
            let source_columns = table.value(row, REL_COLUMN_NAME).map(split_list).unwrap_or_default();
            if source_columns.is_empty() && positions != PositionSpec::Constant {
                return Err(ConfigError::MissingValue {
                    row,
                    field: REL_COLUMN_NAME.to_string(),
                });
            }
            groups.push(Self {
                impacted_column: impacted.to_string(),
                source_columns,
                positions,
                pairs: vec![pair],
            });
        }
        Ok(groups)
    }
}

/// Distinct raw values with no entry in a relation map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndefinedValueReport {
    pub impacted_column: String,
    /// Distinct values in order of first appearance.
    pub values: Vec<Cell>,
}

impl UndefinedValueReport {
    pub fn new(impacted_column: impl Into<String>, undefined: impl IntoIterator<Item = Cell>) -> Self {
        let mut seen = HashSet::new();
        let values = undefined.into_iter().filter(|v| seen.insert(v.clone())).collect();
        Self {
            impacted_column: impacted_column.into(),
            values,
        }
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Up to `n` values for log messages.
    pub fn sample(&self, n: usize) -> Vec<&str> {
        self.values
            .iter()
            .take(n)
            .map(|v| v.as_deref().unwrap_or("<blank>"))
            .collect()
    }

    /// One-column table written as the report artifact.
    pub fn to_table(&self) -> Table {
        Table::from_column(self.impacted_column.clone(), self.values.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_table(rows: &[&[&str]]) -> Table {
        Table::from_literals(
            &[COL_FILE_NAME, COL_NEW_FILE, COL_CREATE_TYPE, COL_COLUMN_NAME, COL_OVERWRITE, COL_FILE_FILTER],
            rows,
        )
        .unwrap()
    }

    #[test]
    fn test_job_kind_aliases() {
        assert_eq!(JobKind::parse("relation"), JobKind::Relate);
        assert_eq!(JobKind::parse("relate"), JobKind::Relate);
        assert_eq!(JobKind::parse("mediaplan"), JobKind::DerivePlan);
        assert_eq!(JobKind::parse("match"), JobKind::MatchTable);
        assert_eq!(JobKind::parse("teleport"), JobKind::Unknown("teleport".into()));
    }

    #[test]
    fn test_job_from_row() {
        let table = job_table(&[&[
            "create/rules.csv",
            "create/ad_upload.csv",
            "relation",
            "",
            "FALSE",
            "country::US|CA",
        ]]);
        let job = Job::from_row(&table, 0).unwrap();

        assert_eq!(job.kind, JobKind::Relate);
        assert_eq!(job.spec, FieldSpec::Empty);
        assert!(!job.overwrite);
        assert_eq!(
            job.row_filter,
            Some(RowFilter {
                column: "country".into(),
                values: vec!["US".into(), "CA".into()]
            })
        );
    }

    #[test]
    fn test_job_missing_destination() {
        let table = job_table(&[&["a.csv", "", "create", "ad_name", "", ""]]);
        let err = Job::from_row(&table, 0).unwrap_err();
        assert!(matches!(err, ConfigError::MissingValue { field, .. } if field == COL_NEW_FILE));
    }

    #[test]
    fn test_duplicate_spec_variants() {
        let kind = JobKind::Duplicate;
        assert_eq!(
            FieldSpec::parse(&kind, Some("ad_name::adset_name|title"), "x").unwrap(),
            FieldSpec::WithTemplate {
                column: "ad_name".into(),
                fields: vec!["adset_name".into(), "title".into()],
            }
        );
        assert_eq!(
            FieldSpec::parse(&kind, Some("ad_name::adset_name::create/filter.csv::1,2"), "x").unwrap(),
            FieldSpec::WithFilter {
                column: "ad_name".into(),
                fields: vec!["adset_name".into()],
                file: "create/filter.csv".into(),
                indices: vec![1, 2],
            }
        );
        assert!(FieldSpec::parse(&kind, Some("ad_name"), "x").is_err());
        assert!(FieldSpec::parse(&kind, Some("ad_name::a::f.csv::one"), "x").is_err());
    }

    #[test]
    fn test_create_requires_column() {
        assert!(FieldSpec::parse(&JobKind::Create, None, "x").is_err());
        assert_eq!(
            FieldSpec::parse(&JobKind::Create, Some("campaign_name"), "x").unwrap(),
            FieldSpec::Simple("campaign_name".into())
        );
    }

    #[test]
    fn test_match_outputs() {
        let outputs = MatchOutputs::parse("create/names.csv|create/filter.csv::1,3|create/rel.csv").unwrap();
        assert_eq!(outputs.creator_file, "create/names.csv");
        assert_eq!(outputs.filter_file, "create/filter.csv");
        assert_eq!(outputs.filter_indices, vec![1, 3]);
        assert_eq!(outputs.relation_file, "create/rel.csv");

        assert!(MatchOutputs::parse("only_one.csv").is_err());
    }

    #[test]
    fn test_row_filter_parse() {
        assert!(RowFilter::parse("no_separator").is_err());
        let filter = RowFilter::parse("country::US").unwrap();
        assert_eq!(filter.values, vec!["US".to_string()]);
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool(Some("TRUE")).unwrap());
        assert!(parse_bool(Some("1")).unwrap());
        assert!(!parse_bool(None).unwrap());
        assert!(!parse_bool(Some("False")).unwrap());
        assert!(parse_bool(Some("maybe")).is_err());
    }

    #[test]
    fn test_position_spec() {
        assert_eq!(PositionSpec::parse("c", &None).unwrap(), PositionSpec::Verbatim);
        assert_eq!(PositionSpec::parse("c", &Some("Constant".into())).unwrap(), PositionSpec::Constant);
        assert_eq!(
            PositionSpec::parse("c", &Some("1|2.0".into())).unwrap(),
            PositionSpec::Positions(vec![Some(1), Some(2)])
        );
        assert_eq!(
            PositionSpec::parse("c", &Some("|".into())).unwrap(),
            PositionSpec::Positions(vec![None, None])
        );
        assert!(PositionSpec::parse("c", &Some("first".into())).is_err());
    }

    #[test]
    fn test_relation_groups() {
        let table = Table::from_literals(
            &[REL_IMPACTED_COLUMN, REL_COLUMN_NAME, REL_POSITION, REL_COLUMN_VALUE, REL_NEW_VALUE],
            &[
                &["adset_key", "campaign_name", "1", "Brand", "B1"],
                &["status", "region", "Constant", "", "ACTIVE"],
                &["adset_key", "campaign_name", "1", "Generic", "G1"],
            ],
        )
        .unwrap();
        let groups = RelationGroup::from_table(&table).unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].impacted_column, "adset_key");
        assert_eq!(groups[0].pairs.len(), 2);
        assert_eq!(groups[1].positions, PositionSpec::Constant);
    }

    #[test]
    fn test_relation_table_missing_column() {
        let table = Table::from_literals(&[REL_IMPACTED_COLUMN], &[]).unwrap();
        assert!(matches!(
            RelationGroup::from_table(&table),
            Err(ConfigError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_undefined_report_dedups() {
        let report = UndefinedValueReport::new(
            "adset_key",
            vec![Some("Unknown".into()), None, Some("Unknown".into())],
        );
        assert_eq!(report.count(), 2);
        assert_eq!(report.sample(5), vec!["Unknown", "<blank>"]);
        assert_eq!(report.to_table().len(), 2);
    }
}
