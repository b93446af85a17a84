use crate::error::IngestError;
use crate::framework::*;

use flate2::read::MultiGzDecoder;
use glob::{glob, Pattern};
use log::{debug, warn};

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Largest zstd window accepted; the public dumps are compressed with long
/// distance matching.
const ZSTD_WINDOW_LOG_MAX: u32 = 31;

/// Lists the archives of one directory, sorted by file name.
pub struct ArchiveGlob {
    pub dir: PathBuf,
    pub suffixes: Vec<String>,
}

impl ArchiveGlob {
    /// Fails unless `dir` exists and is a directory.
    pub fn check_dir(&self) -> Result<(), IngestError> {
        match fs::metadata(&self.dir) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(IngestError::InputDir {
                path: self.dir.clone(),
                source: io::Error::other("not a directory"),
            }),
            Err(e) => Err(IngestError::InputDir {
                path: self.dir.clone(),
                source: e,
            }),
        }
    }

    fn patterns(&self) -> Vec<String> {
        let dir = Pattern::escape(&self.dir.to_string_lossy());
        self.suffixes
            .iter()
            .map(|suffix| format!("{}/*{}", dir, Pattern::escape(suffix)))
            .collect()
    }
}

impl Transform for ArchiveGlob {
    type Input = ();
    type Output = PathBuf;
    type Iter = std::vec::IntoIter<Flow<PathBuf>>;

    fn transform(&self, _input: FlowFile<()>) -> Self::Iter {
        let source: Arc<str> = Arc::from(self.dir.to_string_lossy().as_ref());

        if let Err(err) = self.check_dir() {
            return vec![Err(err)].into_iter();
        }

        let mut paths: Vec<PathBuf> = self
            .patterns()
            .iter()
            .flat_map(|pat| match glob(pat) {
                Ok(paths) => Some(paths),
                Err(e) => {
                    warn!("skipping pattern {}: {}", pat, e);
                    None
                }
            })
            .flatten()
            .flat_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|path| path.is_file())
            .collect();

        // glob already yields alphabetical order per pattern, but several
        // suffixes interleave
        paths.sort();
        paths.dedup();

        paths
            .into_iter()
            .map(|path| Ok(FlowFile::new(path, source.clone())))
            .collect::<Vec<_>>()
            .into_iter()
    }
}

/// A bounded run of decoded text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    /// Decompressed byte offset of the first byte of this chunk.
    pub offset: u64,
    pub text: String,
    /// Undecodable bytes dropped while decoding this chunk.
    pub discarded: usize,
}

/// Decodes raw bytes as UTF-8, dropping every invalid or truncated sequence.
///
/// Returns the text and the number of bytes dropped.
pub fn decode_chunk(bytes: Vec<u8>) -> (String, usize) {
    match String::from_utf8(bytes) {
        Ok(text) => (text, 0),
        Err(e) => {
            let bytes = e.into_bytes();
            let mut text = String::with_capacity(bytes.len());
            let mut discarded = 0;
            for piece in bytes.utf8_chunks() {
                text.push_str(piece.valid());
                discarded += piece.invalid().len();
            }
            (text, discarded)
        }
    }
}

fn open_archive(path: &Path) -> io::Result<Box<dyn Read>> {
    let file = File::open(path)?;
    let reader = if matches!(path.to_str(), Some(p) if p.ends_with(".zst")) {
        let mut decoder = zstd::stream::read::Decoder::new(file)?;
        decoder.window_log_max(ZSTD_WINDOW_LOG_MAX)?;
        Box::new(decoder) as Box<dyn Read>
    } else if matches!(path.to_str(), Some(p) if p.ends_with(".gz")) {
        Box::new(MultiGzDecoder::new(file)) as _
    } else {
        Box::new(BufReader::new(file)) as _
    };

    Ok(reader)
}

/// Lazily reads fixed-size chunks of decoded text from one archive.
///
/// The decoder (and with it the file handle) is released as soon as the
/// stream ends or fails, and in any case when the source is dropped.
pub struct ChunkSource {
    path: PathBuf,
    source: Arc<str>,
    reader: Option<Box<dyn Read>>,
    pending: Option<IngestError>,
    chunk_size: usize,
    index: usize,
    offset: u64,
}

impl ChunkSource {
    pub fn open(path: &Path, chunk_size: usize) -> Self {
        let source: Arc<str> = Arc::from(path.to_string_lossy().as_ref());
        let (reader, pending) = match open_archive(path) {
            Ok(reader) => (Some(reader), None),
            Err(e) => {
                let err = IngestError::ArchiveRead {
                    path: path.to_path_buf(),
                    chunk: 0,
                    offset: 0,
                    source: e,
                };
                (None, Some(err))
            }
        };

        Self {
            path: path.to_path_buf(),
            source,
            reader,
            pending,
            chunk_size: chunk_size.max(1),
            index: 0,
            offset: 0,
        }
    }

    /// Reads already decompressed text from `reader`.
    pub fn from_reader(reader: impl Read + 'static, name: &str, chunk_size: usize) -> Self {
        Self {
            path: PathBuf::from(name),
            source: Arc::from(name),
            reader: Some(Box::new(reader)),
            pending: None,
            chunk_size: chunk_size.max(1),
            index: 0,
            offset: 0,
        }
    }

    fn emit(&mut self, buf: Vec<u8>) -> FlowFile<Chunk> {
        let len = buf.len() as u64;
        let (text, discarded) = decode_chunk(buf);
        if discarded > 0 {
            warn!(
                "{}: discarded {} undecodable bytes in chunk {} at offset {}",
                self.path.display(),
                discarded,
                self.index,
                self.offset
            );
        }
        let chunk = Chunk {
            index: self.index,
            offset: self.offset,
            text,
            discarded,
        };
        self.index += 1;
        self.offset += len;
        FlowFile::new(chunk, self.source.clone())
    }
}

impl Iterator for ChunkSource {
    type Item = Flow<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending.take() {
            return Some(Err(err));
        }
        let reader = self.reader.as_mut()?;

        let mut buf = Vec::with_capacity(self.chunk_size);
        let read = reader
            .by_ref()
            .take(self.chunk_size as u64)
            .read_to_end(&mut buf);

        match read {
            Ok(0) => {
                self.reader = None;
                None
            }
            Ok(_) => Some(Ok(self.emit(buf))),
            Err(e) => {
                self.reader = None;
                // whatever was decompressed before the failure still counts
                let partial = if buf.is_empty() {
                    None
                } else {
                    Some(self.emit(buf))
                };
                let err = IngestError::ArchiveRead {
                    path: self.path.clone(),
                    chunk: self.index,
                    offset: self.offset,
                    source: e,
                };
                match partial {
                    Some(chunk) => {
                        self.pending = Some(err);
                        Some(Ok(chunk))
                    }
                    None => Some(Err(err)),
                }
            }
        }
    }
}

/// Opens an archive and streams its decoded chunks.
pub struct Unpack {
    pub chunk_size: usize,
}

impl Transform for Unpack {
    type Input = PathBuf;
    type Output = Chunk;
    type Iter = CloseableIter<ChunkSource, Box<dyn Fn()>>;

    fn transform(&self, input: FlowFile<PathBuf>) -> Self::Iter {
        let chunks = ChunkSource::open(&input.data, self.chunk_size);
        let path = input.data;
        let after: Box<dyn Fn()> = Box::new(move || debug!("closing archive {}", path.display()));
        CloseableIter::new(chunks, after)
    }
}
