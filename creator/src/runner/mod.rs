//! Job configuration and execution.
//!
//! A job table lists one job per row. [`JobConfig::load`] turns it into typed
//! [`Job`]s (rejecting malformed rows individually) and [`JobRunner`] runs
//! them in order, one at a time, collecting undefined-value counts into a
//! [`RunReport`].
//!
//! # Example
//!
//! ```rust,ignore
//! use creator::config::Paths;
//! use creator::runner::{JobConfig, JobRunner};
//! use creator::store::CsvStore;
//!
//! let paths = Paths::from_env();
//! let store = CsvStore::new();
//! let config = JobConfig::load(&store, &paths, "create/creator_config.csv".as_ref())?;
//! let report = JobRunner::new(&store, &paths).run_all(&config)?;
//! println!("{} undefined values", report.total_undefined());
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Paths;
use crate::error::{ConfigError, ConfigResult, CreatorError, CreatorResult};
use crate::logs::{log_error, log_info, log_success, log_warning, log_warning_indent};
use crate::models::{FieldSpec, Job, JobKind, COL_CREATE_TYPE, COL_FILE_NAME, COL_NEW_FILE};
use crate::store::{prune_empty_dirs, TabularStore};
use crate::table::Table;
use crate::transform::{
    ColumnCounts, CombinationGenerator, Context, DuplicationExpander, MatchTableTranspiler, MediaPlan,
    PlanNameExtractor, RelationResolver,
};

/// Job table location relative to the config directory.
pub const DEFAULT_JOB_TABLE: &str = "create/creator_config.csv";

/// Header row of media plans read by `derive_plan` jobs.
const MEDIA_PLAN_HEADER_ROW: usize = 0;

// =============================================================================
// Job configuration
// =============================================================================

/// A job and the job-table row it came from (1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEntry {
    pub row: usize,
    pub job: Job,
}

/// A job that was rejected at load time or failed while running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    pub row: usize,
    pub kind: Option<String>,
    pub source_file: Option<String>,
    pub destination_file: Option<String>,
    pub error: String,
}

impl JobFailure {
    fn for_job(entry: &JobEntry, error: impl ToString) -> Self {
        Self {
            row: entry.row,
            kind: Some(entry.job.kind.to_string()),
            source_file: Some(entry.job.source_file.clone()),
            destination_file: Some(entry.job.destination_file.clone()),
            error: error.to_string(),
        }
    }
}

/// Jobs loaded from a job table.
#[derive(Debug, Clone, Default)]
pub struct JobConfig {
    pub entries: Vec<JobEntry>,
    /// Rows that could not be turned into a job.
    pub rejected: Vec<JobFailure>,
}

impl JobConfig {
    /// Read and parse the job table at `path` (relative to the config directory).
    pub fn load(store: &dyn TabularStore, paths: &Paths, path: &Path) -> CreatorResult<Self> {
        let path = paths.resolve(path);
        log_info(format!("Loading job table {}", path.display()));
        let table = store.read(&path)?;
        Ok(Self::from_table(&table)?)
    }

    /// Parse a job table. Missing required columns fail the whole table;
    /// malformed rows are rejected one by one.
    pub fn from_table(table: &Table) -> ConfigResult<Self> {
        for column in [COL_FILE_NAME, COL_NEW_FILE, COL_CREATE_TYPE] {
            if !table.has_column(column) {
                return Err(ConfigError::MissingColumn(column.to_string()));
            }
        }

        let mut config = Self::default();
        for idx in 0..table.len() {
            let row = idx + 1;
            match Job::from_row(table, idx) {
                Ok(job) => config.entries.push(JobEntry { row, job }),
                Err(e) => {
                    log_warning(format!("Job row {} skipped: {}", row, e));
                    config.rejected.push(JobFailure {
                        row,
                        kind: table.value(idx, COL_CREATE_TYPE).map(str::to_string),
                        source_file: table.value(idx, COL_FILE_NAME).map(str::to_string),
                        destination_file: table.value(idx, COL_NEW_FILE).map(str::to_string),
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(config)
    }

    /// A configuration holding a single ad-hoc job.
    pub fn single(job: Job) -> Self {
        Self {
            entries: vec![JobEntry { row: 1, job }],
            rejected: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Run report
// =============================================================================

/// Outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub jobs_run: usize,
    /// Undefined-value counts per destination file, then per impacted column.
    pub counts: BTreeMap<String, ColumnCounts>,
    pub failures: Vec<JobFailure>,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            generated_at: Utc::now(),
            jobs_run: 0,
            counts: BTreeMap::new(),
            failures: Vec::new(),
        }
    }

    /// Merge the counts of one job; later jobs overwrite a column's earlier count.
    pub fn record(&mut self, destination: &str, counts: ColumnCounts) {
        self.counts.entry(destination.to_string()).or_default().extend(counts);
    }

    pub fn count(&self, destination: &str, column: &str) -> Option<usize> {
        self.counts.get(destination)?.get(column).copied()
    }

    pub fn total_undefined(&self) -> usize {
        self.counts.values().flat_map(|c| c.values()).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.total_undefined() == 0
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Runner
// =============================================================================

/// Runs jobs against a store and a filesystem layout.
pub struct JobRunner<'a> {
    ctx: Context<'a>,
    keep_going: bool,
}

impl<'a> JobRunner<'a> {
    pub fn new(store: &'a dyn TabularStore, paths: &'a Paths) -> Self {
        Self {
            ctx: Context::new(store, paths),
            keep_going: false,
        }
    }

    /// Record failing jobs and continue instead of aborting the run.
    pub fn keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }

    /// Run every job in order, then prune the error-report directory.
    pub fn run_all(&self, config: &JobConfig) -> CreatorResult<RunReport> {
        let mut report = RunReport::new();
        report.failures.extend(config.rejected.iter().cloned());

        let total = config.len();
        for (i, entry) in config.entries.iter().enumerate() {
            log_info(format!("Doing job {} of {}", i + 1, total));
            match self.run_job(&entry.job) {
                Ok(counts) => {
                    report.jobs_run += 1;
                    report.record(&entry.job.destination_file, counts);
                }
                Err(e) if self.keep_going => {
                    log_error(format!("Job {} failed: {}", entry.row, e));
                    report.failures.push(JobFailure::for_job(entry, &e));
                }
                Err(e) => return Err(e),
            }
        }

        if prune_empty_dirs(&self.ctx.paths.error_dir)? {
            log_info(format!("Removed empty {}", self.ctx.paths.error_dir.display()));
        }

        let undefined = report.total_undefined();
        if undefined == 0 && report.failures.is_empty() {
            log_success(format!("{} job(s) done", report.jobs_run));
        } else {
            log_warning(format!(
                "{} job(s) done, {} failed, {} undefined value(s)",
                report.jobs_run,
                report.failures.len(),
                undefined
            ));
        }
        Ok(report)
    }

    /// Run one job and return its undefined-value counts.
    pub fn run_job(&self, job: &Job) -> CreatorResult<ColumnCounts> {
        log_info(format!(
            "Doing job from {} on {} of type {}",
            job.source_file, job.destination_file, job.kind
        ));

        if let JobKind::Unknown(kind) = &job.kind {
            log_warning_indent(format!("Unknown job type '{}', nothing done", kind), 1);
            return Ok(ColumnCounts::new());
        }

        let paths = self.ctx.paths;
        let source_path = paths.resolve(&job.source_file);
        let destination = paths.resolve(&job.destination_file);

        if job.kind == JobKind::DerivePlan {
            let mut plan = MediaPlan::load(self.ctx.store, &source_path, MEDIA_PLAN_HEADER_ROW)?;
            if let Some(filter) = &job.row_filter {
                plan.table = filter.apply(&plan.table)?;
            }
            let FieldSpec::Columns(columns) = &job.spec else {
                return Err(spec_mismatch(job));
            };
            PlanNameExtractor::new(self.ctx).apply(&plan, &destination, columns)?;
            return Ok(ColumnCounts::new());
        }

        let mut source = self.ctx.store.read(&source_path)?;
        if let Some(filter) = &job.row_filter {
            source = filter.apply(&source)?;
        }

        match (&job.kind, &job.spec) {
            (JobKind::Create, FieldSpec::Simple(column)) => {
                CombinationGenerator::new(self.ctx).apply(&source, &destination, column, job.overwrite)?;
                Ok(ColumnCounts::new())
            }
            (JobKind::Duplicate, spec) => {
                DuplicationExpander::new(self.ctx).apply(&source, &destination, spec)?;
                Ok(ColumnCounts::new())
            }
            (JobKind::Relate, _) => RelationResolver::new(self.ctx).apply(&destination, &source),
            (JobKind::MatchTable, FieldSpec::Outputs(outputs)) => {
                MatchTableTranspiler::new(self.ctx).apply(&source, outputs)?;
                Ok(ColumnCounts::new())
            }
            _ => Err(spec_mismatch(job)),
        }
    }
}

fn spec_mismatch(job: &Job) -> CreatorError {
    ConfigError::InvalidFieldSpec {
        spec: format!("{:?}", job.spec),
        message: format!("not usable by a '{}' job", job.kind),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CreatorError, TableError};
    use crate::models::{
        COL_COLUMN_NAME, COL_FILE_FILTER, COL_OVERWRITE, REL_COLUMN_NAME, REL_COLUMN_VALUE, REL_IMPACTED_COLUMN,
        REL_NEW_VALUE, REL_POSITION,
    };
    use crate::store::CsvStore;
    use tempfile::tempdir;

    fn job_table(rows: &[&[&str]]) -> Table {
        Table::from_literals(
            &[COL_FILE_NAME, COL_NEW_FILE, COL_CREATE_TYPE, COL_COLUMN_NAME, COL_OVERWRITE, COL_FILE_FILTER],
            rows,
        )
        .unwrap()
    }

    fn rules(rows: &[&[&str]]) -> Table {
        Table::from_literals(
            &[REL_IMPACTED_COLUMN, REL_COLUMN_NAME, REL_POSITION, REL_COLUMN_VALUE, REL_NEW_VALUE],
            rows,
        )
        .unwrap()
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        paths: Paths,
        store: CsvStore,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let paths = Paths::under(dir.path());
            Self {
                _dir: dir,
                paths,
                store: CsvStore::new(),
            }
        }

        fn write(&self, name: &str, table: &Table) {
            self.store.write(table, &self.paths.resolve(name)).unwrap();
        }

        fn read(&self, name: &str) -> Table {
            self.store.read(&self.paths.resolve(name)).unwrap()
        }
    }

    fn campaign_fixture() -> Fixture {
        let fx = Fixture::new();
        fx.write(
            "create/campaign_parts.csv",
            &Table::from_literals(
                &["country", "brand", "year"],
                &[&["US", "Brand", "2024"], &["", "Unknown", ""]],
            )
            .unwrap(),
        );
        fx.write(
            "create/campaign_relation.csv",
            &rules(&[
                &["adset_key", "campaign_name", "1", "Brand", "B1"],
                &["status", "campaign_name", "Constant", "", "ACTIVE"],
            ]),
        );
        fx.write(
            DEFAULT_JOB_TABLE,
            &job_table(&[
                &["create/campaign_parts.csv", "create/campaign_upload.csv", "create", "campaign_name", "TRUE", ""],
                &["create/campaign_relation.csv", "create/campaign_upload.csv", "relation", "", "", ""],
                &["create/nowhere.csv", "create/nowhere.csv", "teleport", "", "", ""],
            ]),
        );
        fx
    }

    #[test]
    fn test_load_rejects_malformed_rows() {
        let table = job_table(&[
            &["a.csv", "b.csv", "create", "campaign_name", "", ""],
            &["a.csv", "b.csv", "create", "", "", ""],
            &["a.csv", "b.csv", "relation", "", "sometimes", ""],
        ]);
        let config = JobConfig::from_table(&table).unwrap();

        assert_eq!(config.len(), 1);
        assert_eq!(config.rejected.len(), 2);
        assert_eq!(config.rejected[0].row, 2);
        assert_eq!(config.rejected[1].kind.as_deref(), Some("relation"));
    }

    #[test]
    fn test_load_requires_columns() {
        let table = Table::from_literals(&[COL_FILE_NAME, COL_NEW_FILE], &[&["a.csv", "b.csv"]]).unwrap();
        assert!(matches!(
            JobConfig::from_table(&table),
            Err(ConfigError::MissingColumn(c)) if c == COL_CREATE_TYPE
        ));
    }

    #[test]
    fn test_run_all_end_to_end() {
        let fx = campaign_fixture();
        let config = JobConfig::load(&fx.store, &fx.paths, Path::new(DEFAULT_JOB_TABLE)).unwrap();
        assert_eq!(config.len(), 3);

        let report = JobRunner::new(&fx.store, &fx.paths).run_all(&config).unwrap();

        assert_eq!(report.jobs_run, 3);
        assert_eq!(report.count("create/campaign_upload.csv", "adset_key"), Some(1));
        assert_eq!(report.count("create/campaign_upload.csv", "status"), Some(0));
        assert_eq!(report.total_undefined(), 1);

        let upload = fx.read("create/campaign_upload.csv");
        assert_eq!(upload.len(), 2);
        assert_eq!(upload.value(0, "campaign_name"), Some("US_Brand_2024"));
        assert_eq!(upload.value(0, "adset_key"), Some("B1"));
        assert_eq!(upload.value(1, "campaign_name"), Some("US_Unknown_2024"));
        assert_eq!(upload.cell(1, "adset_key"), Some(&None));
        assert_eq!(upload.value(1, "status"), Some("ACTIVE"));

        let report_path = fx
            .paths
            .error_report_path(&fx.paths.resolve("create/campaign_upload.csv"), "adset_key");
        assert!(report_path.exists());
        let undefined = fx.store.read(&report_path).unwrap();
        assert_eq!(undefined.value(0, "adset_key"), Some("Unknown"));
    }

    #[test]
    fn test_rerun_after_fix_removes_reports() {
        let fx = campaign_fixture();
        let runner = JobRunner::new(&fx.store, &fx.paths);
        let config = JobConfig::load(&fx.store, &fx.paths, Path::new(DEFAULT_JOB_TABLE)).unwrap();
        runner.run_all(&config).unwrap();
        assert!(fx.paths.error_dir.exists());

        fx.write(
            "create/campaign_relation.csv",
            &rules(&[
                &["adset_key", "campaign_name", "1", "Brand", "B1"],
                &["adset_key", "campaign_name", "1", "Unknown", "U1"],
            ]),
        );
        let report = runner.run_all(&config).unwrap();

        assert_eq!(report.count("create/campaign_upload.csv", "adset_key"), Some(0));
        assert!(report.is_clean());
        // Report deleted, then the empty directory tree pruned
        assert!(!fx.paths.error_dir.exists());
        assert_eq!(fx.read("create/campaign_upload.csv").value(1, "adset_key"), Some("U1"));
    }

    #[test]
    fn test_missing_source_aborts_by_default() {
        let fx = campaign_fixture();
        let config = JobConfig::from_table(&job_table(&[
            &["create/missing.csv", "create/campaign_upload.csv", "create", "campaign_name", "", ""],
            &["create/campaign_parts.csv", "create/campaign_upload.csv", "create", "campaign_name", "", ""],
        ]))
        .unwrap();

        let err = JobRunner::new(&fx.store, &fx.paths).run_all(&config).unwrap_err();
        assert!(matches!(err, CreatorError::Table(TableError::NotFound(_))));
        assert!(!fx.paths.resolve("create/campaign_upload.csv").exists());
    }

    #[test]
    fn test_keep_going_records_failure() {
        let fx = campaign_fixture();
        let config = JobConfig::from_table(&job_table(&[
            &["create/missing.csv", "create/campaign_upload.csv", "create", "campaign_name", "", ""],
            &["create/campaign_parts.csv", "create/campaign_upload.csv", "create", "campaign_name", "", ""],
        ]))
        .unwrap();

        let report = JobRunner::new(&fx.store, &fx.paths)
            .keep_going(true)
            .run_all(&config)
            .unwrap();

        assert_eq!(report.jobs_run, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].row, 1);
        assert_eq!(fx.read("create/campaign_upload.csv").len(), 2);
    }

    #[test]
    fn test_row_filter_on_source() {
        let fx = campaign_fixture();
        let job = Job::from_row(
            &job_table(&[&[
                "create/campaign_parts.csv",
                "create/brands.csv",
                "create",
                "brand",
                "",
                "brand::Brand",
            ]]),
            0,
        )
        .unwrap();

        JobRunner::new(&fx.store, &fx.paths).run_job(&job).unwrap();

        // Filtered source keeps one row: US, Brand, 2024
        let out = fx.read("create/brands.csv");
        assert_eq!(out.len(), 1);
        assert_eq!(out.value(0, "brand"), Some("US_Brand_2024"));
    }

    #[test]
    fn test_derive_plan_job() {
        let fx = Fixture::new();
        fx.write(
            "mediaplan/plan.csv",
            &Table::from_literals(
                &["Campaign Name", "Country"],
                &[&["Spring_Sale", "US"], &["_____", "DE"], &["Spring_Sale", "US"]],
            )
            .unwrap(),
        );
        let job = Job::from_row(
            &job_table(&[&["mediaplan/plan.csv", "mediaplan/names.csv", "mediaplan", "Campaign Name|Country", "", ""]]),
            0,
        )
        .unwrap();

        JobRunner::new(&fx.store, &fx.paths).run_job(&job).unwrap();

        let out = fx.read("mediaplan/names.csv");
        assert_eq!(out.columns(), &["Campaign Name".to_string(), "Country".to_string()]);
        assert_eq!(out.len(), 2);
        assert_eq!(out.value(0, "Campaign Name"), Some("Spring_Sale"));
        assert_eq!(out.value(1, "Country"), Some("DE"));
    }

    #[test]
    fn test_report_serializes() {
        let mut report = RunReport::new();
        report.record("create/ad_upload.csv", ColumnCounts::from([("title".to_string(), 2)]));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["counts"]["create/ad_upload.csv"]["title"], 2);
        assert!(json["generated_at"].is_string());
    }
}
