//! Error types for the extraction pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while extracting records.
///
/// Undecodable bytes at a chunk boundary are not an error: the source drops
/// them, logs the loss and keeps going.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The input directory is missing or cannot be listed.
    #[error("cannot read input directory {path}: {source}")]
    InputDir { path: PathBuf, source: io::Error },

    /// Opening or decompressing one archive failed. Only that archive is
    /// abandoned.
    #[error("failed to read archive {path} at chunk {chunk} (offset {offset}): {source}")]
    ArchiveRead {
        path: PathBuf,
        chunk: usize,
        offset: u64,
        source: io::Error,
    },

    /// Creating, writing or flushing an output file failed.
    #[error("failed to write output {path}: {source}")]
    OutputWrite { path: PathBuf, source: io::Error },

    /// Writing the run report failed.
    #[error("failed to write report {path}: {source}")]
    Report { path: PathBuf, source: csv::Error },
}

impl IngestError {
    /// Whether the error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, IngestError::ArchiveRead { .. })
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_archive_errors_are_recoverable() {
        let read = IngestError::ArchiveRead {
            path: PathBuf::from("a.pgn.zst"),
            chunk: 3,
            offset: 30,
            source: io::Error::new(io::ErrorKind::UnexpectedEof, "truncated"),
        };
        assert!(!read.is_fatal());
        assert_eq!(
            read.to_string(),
            "failed to read archive a.pgn.zst at chunk 3 (offset 30): truncated"
        );

        let write = IngestError::OutputWrite {
            path: PathBuf::from("out/evals_1.pgn"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(write.is_fatal());
    }
}
