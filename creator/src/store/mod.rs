//! Spreadsheet persistence.
//!
//! Components never touch files directly; they go through a [`TabularStore`].
//! [`CsvStore`] is the filesystem implementation used by the CLI.

use std::fs;
use std::io::BufWriter;
use std::path::Path;

use crate::error::{TableError, TableResult};
use crate::parser::{parse_bytes_auto, write_delimited, ReadOptions};
use crate::table::Table;

/// Read and write whole tables by path.
pub trait TabularStore {
    /// Read a table with explicit options.
    fn read_with(&self, path: &Path, options: &ReadOptions) -> TableResult<Table>;

    /// Replace the file at `path` with `table`.
    fn write(&self, table: &Table, path: &Path) -> TableResult<()>;

    fn exists(&self, path: &Path) -> bool;

    /// Delete a file; returns whether something was removed.
    fn remove(&self, path: &Path) -> TableResult<bool>;

    /// Read a table with the default options.
    fn read(&self, path: &Path) -> TableResult<Table> {
        self.read_with(path, &ReadOptions::default())
    }
}

/// Delimited-text files on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvStore;

impl CsvStore {
    pub fn new() -> Self {
        Self
    }
}

impl TabularStore for CsvStore {
    fn read_with(&self, path: &Path, options: &ReadOptions) -> TableResult<Table> {
        if !path.is_file() {
            return Err(TableError::NotFound(path.to_path_buf()));
        }
        let bytes = fs::read(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let result = parse_bytes_auto(&bytes, options).map_err(|source| TableError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(
            path = %path.display(),
            encoding = %result.encoding,
            delimiter = ?result.delimiter,
            rows = result.table.len(),
            "read table"
        );
        Ok(result.table)
    }

    fn write(&self, table: &Table, path: &Path) -> TableResult<()> {
        let io_err = |source| TableError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = fs::File::create(path).map_err(io_err)?;
        write_delimited(table, BufWriter::new(file))?;
        tracing::debug!(path = %path.display(), rows = table.len(), "wrote table");
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn remove(&self, path: &Path) -> TableResult<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(TableError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Remove empty directories under `root` bottom-up, then `root` itself if empty.
///
/// Returns whether `root` was removed.
pub fn prune_empty_dirs(root: &Path) -> std::io::Result<bool> {
    if !root.is_dir() {
        return Ok(false);
    }
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_dir() {
            prune_empty_dirs(&path)?;
        }
    }
    if fs::read_dir(root)?.next().is_none() {
        fs::remove_dir(root)?;
        return Ok(true);
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/out.csv");
        let table = Table::from_literals(&["ad_name", "title"], &[&["Ad_1", "Hello, world"]]).unwrap();

        let store = CsvStore::new();
        store.write(&table, &path).unwrap();
        let read = store.read(&path).unwrap();

        assert_eq!(read, table);
    }

    #[test]
    fn test_blank_row_survives_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("upload.csv");
        let mut table = Table::new(vec!["ad_name".into(), "title".into()]);
        table.push_row(vec![Some("Ad_1".into()), Some("One".into())]).unwrap();
        table.push_row(vec![None, None]).unwrap();
        table.push_row(vec![Some("Ad_3".into()), Some("Three".into())]).unwrap();

        let store = CsvStore::new();
        store.write(&table, &path).unwrap();
        let read = store.read(&path).unwrap();

        assert_eq!(read.len(), 3);
        assert_eq!(read, table);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let err = CsvStore::new().read(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, TableError::NotFound(_)));
    }

    #[test]
    fn test_remove_reports_whether_removed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let store = CsvStore::new();
        store.write(&Table::new(vec!["a".into()]), &path).unwrap();

        assert!(store.remove(&path).unwrap());
        assert!(!store.remove(&path).unwrap());
    }

    #[test]
    fn test_prune_empty_dirs() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("ERROR_REPORTS");
        fs::create_dir_all(root.join("create/sub")).unwrap();

        assert!(prune_empty_dirs(&root).unwrap());
        assert!(!root.exists());
    }

    #[test]
    fn test_prune_keeps_dirs_with_files() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("ERROR_REPORTS");
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::create_dir_all(root.join("create")).unwrap();
        fs::write(root.join("create/report.csv"), "a\n1\n").unwrap();

        assert!(!prune_empty_dirs(&root).unwrap());
        assert!(!root.join("empty").exists());
        assert!(root.join("create/report.csv").exists());
    }
}
