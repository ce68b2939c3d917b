//! Loading measurement files into one unified table.
//!
//! Files are selected by name, tagged with the `batch` and `keep` flags their
//! names encode, and folded into a single table. A file only joins the table
//! when its schema is identical to the table's; the others are reported as
//! skipped in the [`MergeSummary`].

use std::{
    fmt,
    path::{Path, PathBuf},
};

use tokio::fs::{metadata, read, read_dir};
use tracing::{debug, info, warn};

use crate::{
    config::Settings,
    error::TableError,
    table::{Schema, Table, Value},
};

pub const DELAY: &str = "delay";
pub const HOSTS: &str = "hosts";
pub const BATCH: &str = "batch";
pub const KEEP: &str = "keep";

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> TableError + '_ {
    move |source| TableError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Lists the measurement files of `dir`, sorted by file name
pub async fn select_files(dir: &Path, settings: &Settings) -> Result<Vec<PathBuf>, TableError> {
    let mut items = read_dir(dir).await.map_err(io_error(dir))?;
    let mut files = Vec::new();
    while let Some(entry) = items.next_entry().await.map_err(io_error(dir))? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.starts_with(&settings.file_prefix) || !name.ends_with(&settings.file_suffix) {
            continue;
        }
        let path = entry.path();
        if metadata(&path).await.map_err(io_error(&path))?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    debug!("Selected {} files in {}", files.len(), dir.display());
    Ok(files)
}

/// Experiment flags encoded in a measurement file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTags {
    pub batch: bool,
    pub keep: bool,
}

impl FileTags {
    /// Only the file name is inspected, never the directories leading to it
    pub fn from_path(path: &Path, settings: &Settings) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();
        Self {
            batch: name.contains(&settings.batch_marker),
            keep: !name.contains(&settings.no_keep_marker),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaggedFile {
    pub path: PathBuf,
    pub tags: FileTags,
    pub table: Table,
}

/// Parses one measurement file and appends its `batch` and `keep` columns
pub async fn load_tagged(path: &Path, settings: &Settings) -> Result<TaggedFile, TableError> {
    let content = read(path).await.map_err(io_error(path))?;
    let mut table = Table::from_csv_reader(content.as_slice(), path)?;
    for column in [DELAY, HOSTS] {
        if !table.schema().contains(column) {
            return Err(TableError::RequiredColumn {
                path: path.to_path_buf(),
                column: column.to_owned(),
            });
        }
    }

    let tags = FileTags::from_path(path, settings);
    table.set_constant_column(BATCH, Value::Bool(tags.batch));
    table.set_constant_column(KEEP, Value::Bool(tags.keep));
    debug!(
        "Loaded {} rows from {} batch={} keep={}",
        table.len(),
        path.display(),
        tags.batch,
        tags.keep
    );

    Ok(TaggedFile {
        path: path.to_path_buf(),
        tags,
        table,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    SchemaMismatch { expected: Schema, found: Schema },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::SchemaMismatch { expected, found } => {
                write!(f, "schema {found} does not match {expected}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    Merged { rows: usize },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub outcome: MergeOutcome,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeSummary {
    pub files: Vec<FileOutcome>,
}

impl MergeSummary {
    pub fn accepted(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, MergeOutcome::Merged { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.files.len() - self.accepted()
    }

    pub fn rows(&self) -> usize {
        self.files
            .iter()
            .map(|f| match f.outcome {
                MergeOutcome::Merged { rows } => rows,
                MergeOutcome::Skipped(_) => 0,
            })
            .sum()
    }
}

impl fmt::Display for MergeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files merged ({} rows), {} skipped",
            self.accepted(),
            self.rows(),
            self.skipped()
        )
    }
}

/// Folds tagged files into one table whose schema never changes once set
#[derive(Debug, Default)]
pub struct SchemaGatedMerger {
    schema: Option<Schema>,
    table: Table,
    summary: MergeSummary,
}

impl SchemaGatedMerger {
    /// With `expected` set, every file is gated against it. Otherwise the first
    /// merged file fixes the schema.
    pub fn new(expected: Option<Schema>) -> Self {
        Self {
            table: expected.clone().map(Table::new).unwrap_or_default(),
            schema: expected,
            summary: MergeSummary::default(),
        }
    }

    pub fn merge(&mut self, file: TaggedFile) -> &MergeOutcome {
        let TaggedFile { path, table, .. } = file;
        let outcome = match &self.schema {
            None => {
                let rows = table.len();
                self.schema = Some(table.schema().clone());
                self.table = table;
                MergeOutcome::Merged { rows }
            }
            Some(schema) if schema == table.schema() => {
                let rows = table.len();
                self.table.append(table);
                MergeOutcome::Merged { rows }
            }
            Some(schema) => {
                let reason = SkipReason::SchemaMismatch {
                    expected: schema.clone(),
                    found: table.schema().clone(),
                };
                warn!("Skipping {}: {reason}", path.display());
                MergeOutcome::Skipped(reason)
            }
        };

        self.summary.files.push(FileOutcome { path, outcome });
        &self.summary.files[self.summary.files.len() - 1].outcome
    }

    pub fn finish(self) -> (Table, MergeSummary) {
        (self.table, self.summary)
    }
}

/// Selects, loads and merges every measurement file in `dir`
pub async fn load_unified(
    dir: &Path,
    settings: &Settings,
) -> Result<(Table, MergeSummary), TableError> {
    let mut merger = SchemaGatedMerger::new(settings.expected_schema.clone());
    for path in select_files(dir, settings).await? {
        merger.merge(load_tagged(&path, settings).await?);
    }
    let (table, summary) = merger.finish();
    info!("{}: {summary}", dir.display());
    Ok((table, summary))
}

#[cfg(test)]
mod tests {
    use std::fs::write;

    use tempfile::tempdir;

    use super::*;

    const HEADER: &str = "delay,hosts,send_wall_sum";

    fn tagged(name: &str, data: &str) -> TaggedFile {
        let path = PathBuf::from(name);
        let mut table = Table::from_csv_reader(data.as_bytes(), &path).unwrap();
        let tags = FileTags::from_path(&path, &Settings::default());
        table.set_constant_column(BATCH, Value::Bool(tags.batch));
        table.set_constant_column(KEEP, Value::Bool(tags.keep));
        TaggedFile { path, tags, table }
    }

    #[test]
    fn tags_come_from_the_file_name() {
        let settings = Settings::default();
        let tags = |name: &str| FileTags::from_path(Path::new(name), &settings);
        assert_eq!(
            tags("coins_a.csv"),
            FileTags {
                batch: false,
                keep: true
            }
        );
        assert_eq!(
            tags("coins_a_nokeep.csv"),
            FileTags {
                batch: false,
                keep: false
            }
        );
        assert_eq!(
            tags("coins_batch_nokeep.csv"),
            FileTags {
                batch: true,
                keep: false
            }
        );
        assert_eq!(
            tags("/data_batch/_nokeep/coins.csv"),
            FileTags {
                batch: false,
                keep: true
            }
        );
    }

    #[test]
    fn first_file_fixes_schema() {
        let mut merger = SchemaGatedMerger::new(None);
        let first = format!("{HEADER}\n10,4,1.0\n10,8,2.0\n");
        let same = format!("{HEADER}\n20,4,1.5\n");
        let extra = format!("{HEADER},extra\n20,8,1.0,3\n");

        assert_eq!(
            merger.merge(tagged("coins_a.csv", &first)),
            &MergeOutcome::Merged { rows: 2 }
        );
        assert!(matches!(
            merger.merge(tagged("coins_b.csv", &extra)),
            MergeOutcome::Skipped(SkipReason::SchemaMismatch { .. })
        ));
        assert_eq!(
            merger.merge(tagged("coins_c_batch.csv", &same)),
            &MergeOutcome::Merged { rows: 1 }
        );

        let (table, summary) = merger.finish();
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.schema(),
            &Schema::new(["delay", "hosts", "send_wall_sum", "batch", "keep"])
        );
        assert_eq!(table.numbers(DELAY).unwrap(), vec![10.0, 10.0, 20.0]);
        assert_eq!(table.bools(BATCH).unwrap(), vec![false, false, true]);
        assert_eq!(summary.accepted(), 2);
        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.rows(), 3);
        assert_eq!(summary.files[1].path, PathBuf::from("coins_b.csv"));
    }

    #[test]
    fn reordered_columns_are_skipped() {
        let mut merger = SchemaGatedMerger::new(None);
        merger.merge(tagged("coins_a.csv", "delay,hosts\n1,2\n"));
        let outcome = merger.merge(tagged("coins_b.csv", "hosts,delay\n2,1\n")).clone();
        assert_eq!(
            outcome,
            MergeOutcome::Skipped(SkipReason::SchemaMismatch {
                expected: Schema::new(["delay", "hosts", "batch", "keep"]),
                found: Schema::new(["hosts", "delay", "batch", "keep"]),
            })
        );
    }

    #[test]
    fn expected_schema_gates_the_first_file_too() {
        let expected = Schema::new(["delay", "hosts", "send_wall_sum", "batch", "keep"]);
        let mut merger = SchemaGatedMerger::new(Some(expected.clone()));
        assert!(matches!(
            merger.merge(tagged("coins_a.csv", "delay,hosts\n1,2\n")),
            MergeOutcome::Skipped(_)
        ));
        assert_eq!(
            merger.merge(tagged("coins_b.csv", &format!("{HEADER}\n1,2,3\n"))),
            &MergeOutcome::Merged { rows: 1 }
        );
        let (table, summary) = merger.finish();
        assert_eq!(table.schema(), &expected);
        assert_eq!(table.len(), 1);
        assert_eq!(summary.to_string(), "1 files merged (1 rows), 1 skipped");
    }

    #[tokio::test]
    async fn selects_by_prefix_and_suffix() {
        let dir = tempdir().unwrap();
        for name in ["coins_b.csv", "coins_a.csv", "coins.txt", "other.csv"] {
            write(dir.path().join(name), "delay,hosts\n").unwrap();
        }
        std::fs::create_dir(dir.path().join("coins_dir.csv")).unwrap();

        let files = select_files(dir.path(), &Settings::default()).await.unwrap();
        let names = files
            .iter()
            .map(|f| f.file_name().unwrap().to_str().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["coins_a.csv", "coins_b.csv"]);
    }

    #[tokio::test]
    async fn missing_directory_is_fatal() {
        let dir = tempdir().unwrap();
        let err = select_files(&dir.path().join("nope"), &Settings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TableError::Io { .. }));
    }

    #[tokio::test]
    async fn loader_requires_delay_and_hosts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("coins_a.csv");
        write(&path, "delay,send_wall_sum\n1,2\n").unwrap();
        match load_tagged(&path, &Settings::default()).await.unwrap_err() {
            TableError::RequiredColumn { column, .. } => assert_eq!(column, HOSTS),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparsable_file_aborts_the_load() {
        let dir = tempdir().unwrap();
        write(dir.path().join("coins_a.csv"), "delay,hosts\n1,2\n").unwrap();
        write(dir.path().join("coins_b.csv"), "delay,hosts\n1,2,3\n").unwrap();
        let err = load_unified(dir.path(), &Settings::default())
            .await
            .unwrap_err();
        match err {
            TableError::Csv { path, .. } => assert!(path.ends_with("coins_b.csv")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_directory_gives_empty_table() {
        let dir = tempdir().unwrap();
        let (table, summary) = load_unified(dir.path(), &Settings::default()).await.unwrap();
        assert!(table.is_empty());
        assert!(table.schema().is_empty());
        assert!(summary.files.is_empty());
    }
}
