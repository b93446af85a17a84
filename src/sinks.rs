//! Terminal stages: size-rotated record output and the per-archive report.

use crate::error::{IngestError, Result};
use crate::framework::*;

use log::{debug, info};

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// What ended up in one output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSummary {
    pub path: PathBuf,
    pub records: u64,
    /// Bytes written, separators included.
    pub bytes: u64,
}

struct OutputFile {
    path: PathBuf,
    writer: BufWriter<File>,
    bytes: u64,
    records: u64,
}

/// Appends records to `<prefix>_<n>.pgn` files, moving on to the next file
/// once the current one holds at least `threshold` bytes.
///
/// Every byte written counts toward the threshold, including the blank line
/// that follows each record. The check happens before a record is written, so
/// a record is never split and a file exceeds the threshold by less than the
/// length of its last record.
pub struct RotatingWriter {
    dir: PathBuf,
    prefix: String,
    threshold: u64,
    current: Option<OutputFile>,
    next_index: usize,
    closed: Vec<OutputSummary>,
}

impl RotatingWriter {
    /// Creates the output directory if needed. No file is opened until the
    /// first record arrives.
    pub fn new(dir: &Path, prefix: &str, threshold: u64) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| IngestError::OutputWrite {
            path: dir.to_path_buf(),
            source: e,
        })?;

        Ok(Self {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
            threshold,
            current: None,
            next_index: 1,
            closed: Vec::new(),
        })
    }

    /// Index of the open (or last opened) file, 0 before the first write.
    pub fn current_index(&self) -> usize {
        self.next_index - 1
    }

    pub fn write(&mut self, record: &str) -> Result<()> {
        let file = match self.current.take() {
            Some(file) if file.bytes < self.threshold => file,
            previous => {
                if let Some(previous) = previous {
                    self.close_file(previous)?;
                }
                self.open_next()?
            }
        };
        let file = self.current.insert(file);

        let separator = if record.ends_with('\n') { "\n" } else { "\n\n" };
        write_all(file, record.as_bytes())?;
        write_all(file, separator.as_bytes())?;

        file.bytes += (record.len() + separator.len()) as u64;
        file.records += 1;
        Ok(())
    }

    /// Flushes and closes the open file and lists every file written.
    pub fn finish(mut self) -> Result<Vec<OutputSummary>> {
        if let Some(file) = self.current.take() {
            self.close_file(file)?;
        }
        Ok(std::mem::take(&mut self.closed))
    }

    fn open_next(&mut self) -> Result<OutputFile> {
        let path = self
            .dir
            .join(format!("{}_{}.pgn", self.prefix, self.next_index));
        let file = File::create(&path).map_err(|e| IngestError::OutputWrite {
            path: path.clone(),
            source: e,
        })?;
        debug!("opened {}", path.display());
        self.next_index += 1;

        Ok(OutputFile {
            path,
            writer: BufWriter::new(file),
            bytes: 0,
            records: 0,
        })
    }

    fn close_file(&mut self, mut file: OutputFile) -> Result<()> {
        file.writer.flush().map_err(|e| IngestError::OutputWrite {
            path: file.path.clone(),
            source: e,
        })?;
        info!(
            "closed {} ({} records, {} bytes)",
            file.path.display(),
            file.records,
            file.bytes
        );

        self.closed.push(OutputSummary {
            path: file.path,
            records: file.records,
            bytes: file.bytes,
        });
        Ok(())
    }
}

fn write_all(file: &mut OutputFile, bytes: &[u8]) -> Result<()> {
    file.writer
        .write_all(bytes)
        .map_err(|e| IngestError::OutputWrite {
            path: file.path.clone(),
            source: e,
        })
}

impl Sink for RotatingWriter {
    type Input = String;

    fn close(&mut self, input: FlowFile<Self::Input>) -> Result<()> {
        self.write(&input.data)
    }
}

/// CSV audit log with one row per archive.
pub struct RunReport {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl RunReport {
    pub const HEADER: [&'static str; 8] = [
        "archive",
        "status",
        "records",
        "kept",
        "diverted",
        "dropped",
        "discarded_bytes",
        "output_index",
    ];

    pub fn create(path: &Path) -> Result<Self> {
        let mut writer = csv::Writer::from_path(path).map_err(|e| IngestError::Report {
            path: path.to_path_buf(),
            source: e,
        })?;
        writer
            .write_record(Self::HEADER)
            .map_err(|e| IngestError::Report {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    pub fn row(&mut self, archive: &Path, stats: &Stats, output_index: usize) -> Result<()> {
        let status = if stats.aborted_archives > 0 { "aborted" } else { "ok" };
        let row = [
            archive.to_string_lossy().into_owned(),
            status.to_string(),
            stats.records.to_string(),
            stats.kept.to_string(),
            stats.diverted.to_string(),
            stats.dropped.to_string(),
            stats.discarded_bytes.to_string(),
            output_index.to_string(),
        ];
        self.writer
            .write_record(&row)
            .map_err(|e| IngestError::Report {
                path: self.path.clone(),
                source: e,
            })
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush().map_err(|e: io::Error| IngestError::Report {
            path: self.path.clone(),
            source: e.into(),
        })
    }
}
