//! Duplication expander and upload filter.
//!
//! A template (selected source columns) is repeated once per unique value of
//! the duplicated column found in the destination. An optional filter table
//! then narrows the expansion: its header names `source_column::position`
//! pairs, its rows list the allowed `|`-separated parts per primary value.

use std::path::Path;

use crate::error::{ConfigError, CreatorResult};
use crate::logs::log_info_indent;
use crate::models::{parse_position, FieldSpec, SPEC_SEPARATOR};
use crate::table::{split_list, Cell, Table};

use super::Context;

/// Runs `duplicate` jobs.
pub struct DuplicationExpander<'a> {
    ctx: Context<'a>,
}

impl<'a> DuplicationExpander<'a> {
    pub fn new(ctx: Context<'a>) -> Self {
        Self { ctx }
    }

    /// Expand `source` against the keys of `destination` and overwrite it.
    ///
    /// Returns the number of rows written.
    pub fn apply(&self, source: &Table, destination: &Path, spec: &FieldSpec) -> CreatorResult<usize> {
        let (column, fields, filter) = match spec {
            FieldSpec::WithTemplate { column, fields } => (column, fields, None),
            FieldSpec::WithFilter {
                column,
                fields,
                file,
                indices,
            } => (column, fields, Some((file, indices))),
            other => {
                return Err(ConfigError::InvalidFieldSpec {
                    spec: format!("{:?}", other),
                    message: "duplicate expects 'column::template_col1|template_col2'".to_string(),
                }
                .into())
            }
        };

        let current = self.ctx.store.read(destination)?;
        let keys = current.unique(column)?;
        let template = source.select(fields)?;
        let mut expanded = expand(&template, column, &keys, current.columns());
        log_info_indent(
            format!(
                "Expanded {} template row(s) over {} value(s) of '{}'",
                template.len(),
                keys.len(),
                column
            ),
            1,
        );

        if let Some((file, indices)) = filter {
            let filter_table = self.ctx.store.read(&self.ctx.paths.resolve(file))?;
            expanded = apply_upload_filter(&expanded, column, &filter_table, indices)?;
            log_info_indent(format!("Upload filter {} kept {} row(s)", file, expanded.len()), 1);
        }

        self.ctx.store.write(&expanded, destination)?;
        Ok(expanded.len())
    }
}

/// One copy of `template` per key, with `column` set to that key.
///
/// The result has exactly `columns`, in that order.
pub fn expand(template: &Table, column: &str, keys: &[Cell], columns: &[String]) -> Table {
    let mut out = Table::new(columns.to_vec());
    for key in keys {
        let mut block = template.clone();
        block.fill_column(column, key.clone());
        out.append(&block);
    }
    out.conform(columns)
}

/// A filter column parsed from a header like `adset_name::1`.
struct FilterColumn<'h> {
    header: &'h str,
    values: Vec<Cell>,
}

/// Keep the rows of `table` allowed by at least one row of `filter`.
///
/// A filter row allows a table row when the primary values are equal and,
/// for every filter column, the row's part of the source column is one of
/// the listed values. Each filter row is matched against the full table and
/// the matches are concatenated in filter-row order. When `indices` is not
/// empty, only filter columns whose position is listed are applied.
pub fn apply_upload_filter(table: &Table, primary: &str, filter: &Table, indices: &[i64]) -> CreatorResult<Table> {
    filter.require_column(primary)?;
    let primary_values = table.column(primary)?;

    let mut columns = Vec::new();
    for header in filter.columns().iter().filter(|c| c.as_str() != primary) {
        let invalid = || ConfigError::InvalidFieldSpec {
            spec: header.clone(),
            message: "filter columns must be named 'source_column::position'".to_string(),
        };
        let (source, position) = header.split_once(SPEC_SEPARATOR).ok_or_else(invalid)?;
        let position = parse_position(position).ok_or_else(invalid)?;
        if !indices.is_empty() && !indices.contains(&position) {
            continue;
        }
        columns.push(FilterColumn {
            header: header.as_str(),
            values: table.split_column(source, position)?,
        });
    }

    let mut out = Table::new(table.columns().to_vec());
    for filter_row in 0..filter.len() {
        let Some(wanted) = filter.value(filter_row, primary) else {
            continue;
        };
        let allowed: Vec<Option<Vec<String>>> = columns
            .iter()
            .map(|c| filter.value(filter_row, c.header).map(split_list))
            .collect();

        let matched = table.filter_rows(|_, i| {
            primary_values[i].as_deref() == Some(wanted)
                && columns.iter().zip(&allowed).all(|(column, allowed)| {
                    match (&column.values[i], allowed) {
                        (Some(part), Some(allowed)) => allowed.iter().any(|a| a == part),
                        _ => false,
                    }
                })
        });
        out.append(&matched);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Paths;
    use crate::store::{CsvStore, TabularStore};
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn keys(values: &[&str]) -> Vec<Cell> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_expand_count_and_keys() {
        let template = Table::from_literals(
            &["adset_name", "title"],
            &[&["US_Brand_A", "Hello"], &["DE_Brand_B", "Hallo"], &["FR_Generic_C", "Salut"]],
        )
        .unwrap();
        let columns = names(&["ad_name", "adset_name", "title", "body"]);

        let out = expand(&template, "ad_name", &keys(&["ad1", "ad2"]), &columns);

        // T x K rows
        assert_eq!(out.len(), 6);
        assert_eq!(out.columns(), columns.as_slice());
        let distinct: HashSet<_> = out.column("ad_name").unwrap().into_iter().cloned().collect();
        assert_eq!(distinct, keys(&["ad1", "ad2"]).into_iter().collect());
        assert_eq!(out.cell(0, "body"), Some(&None));
        assert_eq!(out.value(3, "ad_name"), Some("ad2"));
        assert_eq!(out.value(3, "adset_name"), Some("US_Brand_A"));
    }

    #[test]
    fn test_expand_without_keys() {
        let template = Table::from_literals(&["title"], &[&["Hello"]]).unwrap();
        let out = expand(&template, "ad_name", &[], &names(&["ad_name", "title"]));
        assert!(out.is_empty());
    }

    fn expanded() -> Table {
        Table::from_literals(
            &["ad_name", "adset_name"],
            &[
                &["ad1", "US_Brand_Video"],
                &["ad1", "DE_Brand_Video"],
                &["ad1", "US_Generic_Image"],
                &["ad2", "US_Brand_Video"],
                &["ad2", "DE_Generic_Image"],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_upload_filter_union() {
        let filter = Table::from_literals(
            &["ad_name", "adset_name::0", "adset_name::1"],
            &[&["ad1", "US|DE", "Brand"], &["ad2", "DE", "Generic"]],
        )
        .unwrap();

        let out = apply_upload_filter(&expanded(), "ad_name", &filter, &[]).unwrap();

        assert_eq!(out.columns(), expanded().columns());
        let rows: Vec<(&str, &str)> = (0..out.len())
            .map(|i| (out.value(i, "ad_name").unwrap(), out.value(i, "adset_name").unwrap()))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("ad1", "US_Brand_Video"),
                ("ad1", "DE_Brand_Video"),
                ("ad2", "DE_Generic_Image"),
            ]
        );
    }

    #[test]
    fn test_upload_filter_indices_restrict_columns() {
        let filter = Table::from_literals(
            &["ad_name", "adset_name::0", "adset_name::1"],
            &[&["ad1", "US", "Nothing"]],
        )
        .unwrap();

        let out = apply_upload_filter(&expanded(), "ad_name", &filter, &[0]).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out.value(1, "adset_name"), Some("US_Generic_Image"));
    }

    #[test]
    fn test_upload_filter_blank_cell_matches_nothing() {
        let filter = Table::from_literals(&["ad_name", "adset_name::0"], &[&["ad1", ""]]).unwrap();
        let out = apply_upload_filter(&expanded(), "ad_name", &filter, &[]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_upload_filter_bad_header() {
        let filter = Table::from_literals(&["ad_name", "adset_name"], &[&["ad1", "US"]]).unwrap();
        assert!(apply_upload_filter(&expanded(), "ad_name", &filter, &[]).is_err());
    }

    #[test]
    fn test_apply_with_filter_file() {
        let dir = tempdir().unwrap();
        let paths = Paths::under(dir.path());
        let store = CsvStore::new();
        let destination = paths.resolve("create/ad_upload.csv");
        store
            .write(
                &Table::from_literals(
                    &["ad_name", "adset_name", "title"],
                    &[&["ad1", "", "old"], &["ad2", "", "old"], &["ad1", "", "old"]],
                )
                .unwrap(),
                &destination,
            )
            .unwrap();
        store
            .write(
                &Table::from_literals(&["ad_name", "adset_name::0"], &[&["ad2", "DE"]]).unwrap(),
                &paths.resolve("create/ad_filter.csv"),
            )
            .unwrap();
        let source = Table::from_literals(
            &["adset_name", "campaign_name"],
            &[&["US_Brand", "c1"], &["DE_Brand", "c1"]],
        )
        .unwrap();
        let spec = FieldSpec::WithFilter {
            column: "ad_name".into(),
            fields: vec!["adset_name".into()],
            file: "create/ad_filter.csv".into(),
            indices: Vec::new(),
        };

        let written = DuplicationExpander::new(Context::new(&store, &paths))
            .apply(&source, &destination, &spec)
            .unwrap();

        assert_eq!(written, 1);
        let out = store.read(&destination).unwrap();
        assert_eq!(out.columns(), names(&["ad_name", "adset_name", "title"]).as_slice());
        assert_eq!(out.value(0, "ad_name"), Some("ad2"));
        assert_eq!(out.value(0, "adset_name"), Some("DE_Brand"));
        assert_eq!(out.cell(0, "title"), Some(&None));
    }

    #[test]
    fn test_apply_missing_duplicated_column() {
        let dir = tempdir().unwrap();
        let paths = Paths::under(dir.path());
        let store = CsvStore::new();
        let destination = paths.resolve("upload.csv");
        store
            .write(&Table::from_literals(&["title"], &[&["x"]]).unwrap(), &destination)
            .unwrap();
        let spec = FieldSpec::WithTemplate {
            column: "ad_name".into(),
            fields: vec!["title".into()],
        };

        let source = Table::from_literals(&["title"], &[&["x"]]).unwrap();
        let result = DuplicationExpander::new(Context::new(&store, &paths)).apply(&source, &destination, &spec);
        assert!(result.is_err());
    }
}
