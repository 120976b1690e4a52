//! Durable record log.
//!
//! Records are appended as rows of a delimited text file whose header is the fixed field
//! order. Each append is all-or-nothing: the row is rendered in memory, written with a
//! single append, flushed to disk, and on failure the file is truncated back to the length
//! it had before, so readers never see a partial row.
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{AppResult, DaqError};
use crate::record::{Field, Record};

/// Trait for the durable store records are committed to.
#[async_trait]
pub trait PersistenceWriter: Send + Sync {
    /// Appends one record as a single row. Either the whole row lands or nothing does.
    async fn append(&mut self, record: &Record) -> AppResult<()>;

    /// Human-readable location of the store, for logs.
    fn location(&self) -> String;
}

/// Append-only CSV file in the fixed field order.
#[derive(Debug, Clone)]
pub struct CsvRecordLog {
    path: PathBuf,
}

impl CsvRecordLog {
    /// Use an existing data file. Appends fail if the file is missing.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create the data file with its header row unless it already has content.
    pub fn create(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DaqError::Persistence(format!(
                    "Failed to create directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                DaqError::Persistence(format!("Failed to create '{}': {}", path.display(), e))
            })?;

        let len = file
            .metadata()
            .map_err(|e| {
                DaqError::Persistence(format!("Failed to inspect '{}': {}", path.display(), e))
            })?
            .len();
        if len == 0 {
            let header = render_row(Field::headers())?;
            file.write_all(&header)
                .and_then(|_| file.sync_data())
                .map_err(|e| DaqError::Persistence(format!("Failed to write header: {}", e)))?;
            info!(path = %path.display(), "Data file created");
        } else {
            debug!(path = %path.display(), bytes = len, "Data file already exists");
        }

        Ok(Self { path })
    }

    /// Location of the data file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append_row(&self, row: &[u8]) -> AppResult<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                DaqError::Persistence(format!(
                    "Data file '{}' is not available: {}",
                    self.path.display(),
                    e
                ))
            })?;

        append_all_or_nothing(&mut file, row).map_err(|e| {
            DaqError::Persistence(format!(
                "Failed to append to '{}': {}",
                self.path.display(),
                e
            ))
        })
    }
}

/// Byte sink a row can be appended to and rolled back from.
trait RowSink: Write {
    /// Current end offset, where the next row starts.
    fn end_offset(&mut self) -> io::Result<u64>;
    /// Make written bytes durable.
    fn sync(&mut self) -> io::Result<()>;
    /// Cut the sink back to `len` bytes.
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl RowSink for File {
    fn end_offset(&mut self) -> io::Result<u64> {
        self.seek(SeekFrom::End(0))
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Write `row` completely and durably, or restore the sink to its previous length.
fn append_all_or_nothing<S: RowSink>(sink: &mut S, row: &[u8]) -> io::Result<()> {
    let previous_len = sink.end_offset()?;
    if let Err(e) = sink.write_all(row).and_then(|_| sink.sync()) {
        if let Err(rollback) = sink.truncate(previous_len) {
            warn!(error = %rollback, "Failed to roll back partial row");
        }
        return Err(e);
    }
    Ok(())
}

#[async_trait]
impl PersistenceWriter for CsvRecordLog {
    async fn append(&mut self, record: &Record) -> AppResult<()> {
        let row = render_row(record.to_row())?;
        self.append_row(&row)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Render one CSV row, terminator included.
fn render_row<I, T>(cells: I) -> AppResult<Vec<u8>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    writer
        .write_record(cells)
        .map_err(|e| DaqError::Persistence(e.to_string()))?;
    writer
        .into_inner()
        .map_err(|e| DaqError::Persistence(e.to_string()))
}

/// Read back every data row of a log file, header excluded.
pub fn read_rows(path: impl AsRef<Path>) -> AppResult<Vec<Vec<String>>> {
    let file = File::open(path.as_ref())?;
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
    reader
        .records()
        .map(|row| {
            row.map(|r| r.iter().map(str::to_string).collect())
                .map_err(|e| DaqError::Persistence(e.to_string()))
        })
        .collect()
}
