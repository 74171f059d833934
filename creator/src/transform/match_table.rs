//! Match table transpiler.
//!
//! A match table has one row per ad and, for each creative attribute, a base
//! column followed by carousel variants (`Link Headline`, `Link Headline C1`,
//! `Link Headline C2`, ...). The transpiler folds every family into a single
//! `|`-separated "fixed" column and turns the result into:
//!
//! - a name-creator file listing the ad names,
//! - a filter file telling the duplication step which ad sets get which ads,
//! - relation rules appended to the relation file, keyed by
//!   `ad group|ad name`.

use std::fs;
use std::path::Path;

use crate::error::{CreatorResult, TableResult};
use crate::logs::{log_info_indent, log_warning_indent};
use crate::models::{
    MatchOutputs, REL_COLUMN_NAME, REL_COLUMN_VALUE, REL_IMPACTED_COLUMN, REL_NEW_VALUE, REL_POSITION,
};
use crate::table::{Cell, Table, LIST_SEPARATOR};

use super::Context;

pub const AD_COLUMN: &str = "Ad Name";
pub const AD_GROUP_COLUMN: &str = "Ad Group Name";
pub const URL_COLUMN: &str = "Website URL";
pub const CREATIVE_COLUMN: &str = "Creative File Name";
pub const HEADLINE_COLUMN: &str = "Link Headline";
pub const DESCRIPTION_COLUMN: &str = "Link Description";
pub const TEXT_COLUMN: &str = "Post Text";
pub const CAROUSEL_TEXT_COLUMN: &str = "Carousel Text";

/// Base column plus numbered variants C1..C9.
pub const MAX_VARIANTS: usize = 10;

/// Extensions recognised as finished media files.
pub const MEDIA_EXTENSIONS: &[&str] = &["jpg", "png", "jpeg", "mp4", "mov", "m4v", "avi", "gif"];

/// Impacted columns owned by the match table in the relation file.
pub const RELATION_TAGS: &[&str] = &["creative_filename", "body", "description", "title"];

pub const LINK_URL_TAG: &str = "link_url";
pub const FILTER_AD_COLUMN: &str = "ad_name";
const FILTER_GROUP_PREFIX: &str = "adset_name";

/// Where the variants of a family live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variants {
    /// `"{base} C1"` .. `"{base} C9"`.
    Numbered,
    /// A single differently named column.
    Single(&'static str),
}

/// A base column, its variants and the relation tag its fixed column feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantFamily {
    pub base: &'static str,
    pub variants: Variants,
    pub tag: &'static str,
}

impl VariantFamily {
    pub fn fixed_column(&self) -> String {
        format!("{} - Fixed", self.base)
    }

    pub fn variant_columns(&self) -> Vec<String> {
        match self.variants {
            Variants::Numbered => (1..MAX_VARIANTS).map(|n| format!("{} C{}", self.base, n)).collect(),
            Variants::Single(name) => vec![name.to_string()],
        }
    }
}

/// Families in relation-file order.
pub const FAMILIES: [VariantFamily; 4] = [
    VariantFamily {
        base: CREATIVE_COLUMN,
        variants: Variants::Numbered,
        tag: "creative_filename",
    },
    VariantFamily {
        base: TEXT_COLUMN,
        variants: Variants::Single(CAROUSEL_TEXT_COLUMN),
        tag: "body",
    },
    VariantFamily {
        base: DESCRIPTION_COLUMN,
        variants: Variants::Numbered,
        tag: "description",
    },
    VariantFamily {
        base: HEADLINE_COLUMN,
        variants: Variants::Numbered,
        tag: "title",
    },
];

/// The three tables produced from one match table.
#[derive(Debug, Clone, PartialEq)]
pub struct TranspileOutput {
    pub names: Table,
    pub filter: Table,
    pub relations: Table,
}

/// Runs `match_table` jobs.
pub struct MatchTableTranspiler<'a> {
    ctx: Context<'a>,
}

impl<'a> MatchTableTranspiler<'a> {
    pub fn new(ctx: Context<'a>) -> Self {
        Self { ctx }
    }

    /// Transpile `source` and write the three output files.
    pub fn apply(&self, source: &Table, outputs: &MatchOutputs) -> CreatorResult<TranspileOutput> {
        let listing = creative_listing(&self.ctx.paths.creative_dir);
        let output = transpile(source, &outputs.filter_indices, &listing)?;

        let store = self.ctx.store;
        store.write(&output.names, &self.ctx.paths.resolve(&outputs.creator_file))?;
        store.write(&output.filter, &self.ctx.paths.resolve(&outputs.filter_file))?;
        self.merge_relations(&self.ctx.paths.resolve(&outputs.relation_file), &output.relations)?;

        log_info_indent(
            format!(
                "Match table gave {} ad name(s) and {} relation rule(s)",
                output.names.len(),
                output.relations.len()
            ),
            1,
        );
        Ok(output)
    }

    /// Replace the match-table rules of the relation file with `relations`.
    fn merge_relations(&self, path: &Path, relations: &Table) -> CreatorResult<()> {
        let existing = if self.ctx.store.exists(path) {
            self.ctx.store.read(path)?
        } else {
            Table::new(relation_columns())
        };
        let tags = existing.column(REL_IMPACTED_COLUMN)?;
        let mut merged = existing.filter_rows(|_, i| {
            !tags[i]
                .as_deref()
                .is_some_and(|tag| RELATION_TAGS.contains(&tag))
        });
        merged.append(relations);
        merged.drop_duplicates();
        self.ctx.store.write(&merged, path)?;
        Ok(())
    }
}

fn relation_columns() -> Vec<String> {
    [REL_IMPACTED_COLUMN, REL_COLUMN_NAME, REL_POSITION, REL_COLUMN_VALUE, REL_NEW_VALUE]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

/// Pure transformation of a match table.
///
/// `filter_indices` selects which `_`-separated parts of the ad group name
/// end up in the filter file; `listing` is the content of the creative
/// directory.
pub fn transpile(source: &Table, filter_indices: &[i64], listing: &[String]) -> TableResult<TranspileOutput> {
    source.require_column(AD_COLUMN)?;
    let mut table = source.clone();
    let has_group = table.has_column(AD_GROUP_COLUMN);
    if has_group {
        table.forward_fill(AD_GROUP_COLUMN)?;
    }

    for family in &FAMILIES {
        collapse_variants(&mut table, family)?;
    }
    resolve_creatives(&mut table, &FAMILIES[0].fixed_column(), listing)?;

    Ok(TranspileOutput {
        names: name_table(&table)?,
        filter: filter_table(&table, filter_indices)?,
        relations: relation_table(&table)?,
    })
}

/// Fold a family into its fixed column.
///
/// Starts from the base value (blank when absent); every present, non-empty
/// variant is then set when the fixed value is still empty, or appended
/// after a `|` otherwise.
pub fn collapse_variants(table: &mut Table, family: &VariantFamily) -> TableResult<()> {
    let mut fixed: Vec<String> = if table.has_column(family.base) {
        table
            .column(family.base)?
            .into_iter()
            .map(|c| c.clone().unwrap_or_default())
            .collect()
    } else {
        log_warning_indent(format!("{} not in match table, left blank", family.base), 1);
        vec![String::new(); table.len()]
    };

    for variant in family.variant_columns() {
        if !table.has_column(&variant) {
            continue;
        }
        for (value, cell) in fixed.iter_mut().zip(table.column(&variant)?) {
            match cell.as_deref() {
                Some(v) if !v.is_empty() => {
                    if !value.is_empty() {
                        value.push(LIST_SEPARATOR);
                    }
                    value.push_str(v);
                }
                _ => {}
            }
        }
    }

    table.set_column(&family.fixed_column(), fixed.into_iter().map(Some).collect())
}

/// Sorted file names of the creative directory; empty when it does not exist.
pub fn creative_listing(dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => {
            log_info_indent(
                format!("Creative directory {} not found, file names kept as is", dir.display()),
                1,
            );
            return Vec::new();
        }
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Resolve each creative token of `column` against the directory listing.
pub fn resolve_creatives(table: &mut Table, column: &str, listing: &[String]) -> TableResult<()> {
    let resolved: Vec<Cell> = table
        .column(column)?
        .into_iter()
        .map(|cell| {
            cell.as_deref().map(|value| {
                value
                    .split(LIST_SEPARATOR)
                    .map(|token| resolve_creative(token, listing))
                    .collect::<Vec<_>>()
                    .join("|")
            })
        })
        .collect();
    table.set_column(column, resolved)
}

/// A token with a media extension is kept; otherwise the first listed file
/// whose stem equals the token replaces it.
pub fn resolve_creative(token: &str, listing: &[String]) -> String {
    let extension = token.rsplit('.').next().unwrap_or(token);
    if token.is_empty() || MEDIA_EXTENSIONS.contains(&extension) {
        return token.to_string();
    }
    let found = listing
        .iter()
        .find(|name| Path::new(name.as_str()).file_stem().is_some_and(|stem| stem == token));
    match found {
        Some(name) => name.clone(),
        None => {
            log_info_indent(format!("No creative file found for '{}', kept as is", token), 1);
            token.to_string()
        }
    }
}

/// `group|ad` when the table has ad groups, the ad name otherwise.
fn composite_keys(table: &Table) -> TableResult<Vec<Cell>> {
    let ads = table.column(AD_COLUMN)?;
    if !table.has_column(AD_GROUP_COLUMN) {
        return Ok(ads.into_iter().cloned().collect());
    }
    let groups = table.column(AD_GROUP_COLUMN)?;
    Ok(groups
        .into_iter()
        .zip(ads)
        .map(|(group, ad)| match (group, ad) {
            (Some(group), Some(ad)) => Some(format!("{}{}{}", group, LIST_SEPARATOR, ad)),
            _ => None,
        })
        .collect())
}

fn name_table(table: &Table) -> TableResult<Table> {
    let names = table.unique(AD_COLUMN)?.into_iter().filter(Option::is_some).collect();
    Ok(Table::from_column(AD_COLUMN, names))
}

fn relation_table(table: &Table) -> TableResult<Table> {
    let keys = composite_keys(table)?;
    let has_group = table.has_column(AD_GROUP_COLUMN);
    let (source_columns, position) = if has_group {
        (Some("adset_name|ad_name".to_string()), Some("|".to_string()))
    } else {
        (Some("ad_name".to_string()), None)
    };

    let mut out = Table::new(relation_columns());
    for family in &FAMILIES {
        let fixed = table.column(&family.fixed_column())?;
        for (key, value) in keys.iter().zip(fixed) {
            out.push_row(vec![
                Some(family.tag.to_string()),
                source_columns.clone(),
                position.clone(),
                key.clone(),
                value.clone(),
            ])?;
        }
    }

    if has_group && table.has_column(URL_COLUMN) {
        let groups = table.column(AD_GROUP_COLUMN)?;
        let urls = table.column(URL_COLUMN)?;
        let mut seen = Vec::new();
        for (group, url) in groups.into_iter().zip(urls) {
            if let (Some(group), Some(url)) = (group, url) {
                if !seen.contains(&(group, url)) {
                    seen.push((group, url));
                }
            }
        }
        for (group, url) in seen {
            out.push_row(vec![
                Some(LINK_URL_TAG.to_string()),
                Some(FILTER_GROUP_PREFIX.to_string()),
                None,
                Some(group.clone()),
                Some(url.clone()),
            ])?;
        }
    }
    Ok(out)
}

/// One row per ad with the distinct ad group parts at each index.
fn filter_table(table: &Table, indices: &[i64]) -> TableResult<Table> {
    let ads: Vec<Cell> = table.unique(AD_COLUMN)?.into_iter().filter(Option::is_some).collect();

    if !table.has_column(AD_GROUP_COLUMN) {
        if !indices.is_empty() {
            log_warning_indent(
                format!("{} not in match table, filter file has ad names only", AD_GROUP_COLUMN),
                1,
            );
        }
        return Ok(Table::from_column(FILTER_AD_COLUMN, ads));
    }

    let ad_column = table.column(AD_COLUMN)?;
    let mut out = Table::from_column(FILTER_AD_COLUMN, ads.clone());
    for &idx in indices {
        let parts = table.split_column(AD_GROUP_COLUMN, idx)?;
        let values: Vec<Cell> = ads
            .iter()
            .map(|ad| {
                let mut distinct: Vec<&str> = Vec::new();
                for (row_ad, part) in ad_column.iter().zip(&parts) {
                    if *row_ad != ad {
                        continue;
                    }
                    if let Some(part) = part.as_deref() {
                        if !distinct.contains(&part) {
                            distinct.push(part);
                        }
                    }
                }
                if distinct.is_empty() {
                    None
                } else {
                    Some(distinct.join("|"))
                }
            })
            .collect();
        out.set_column(&format!("{}::{}", FILTER_GROUP_PREFIX, idx), values)?;
    }
    Ok(out)
}
