//! Splits a stream of decoded chunks into complete game records.
//!
//! A record boundary is a blank line directly followed by the tag that opens
//! the next record's header section (`"\n\n[Event "` by default). A record
//! keeps its own final newline, the blank line between two records is
//! dropped, and whatever is left when the chunks run out is emitted as the
//! last record. Because boundaries are searched in the accumulated text, the
//! records produced do not depend on how the text was chunked.

use crate::framework::*;
use crate::transformers::Chunk;

use std::collections::VecDeque;
use std::sync::Arc;

pub struct Records<I> {
    chunks: I,
    delimiter: String,
    carry: String,
    /// Bytes of `carry` already known not to start a delimiter.
    scanned: usize,
    ready: VecDeque<String>,
    source: Arc<str>,
    lossy_chunks: u64,
    discarded_bytes: u64,
    done: bool,
}

impl<I> Records<I>
where
    I: Iterator<Item = Flow<Chunk>>,
{
    pub fn new(chunks: I, record_tag: &str) -> Self {
        Self {
            chunks,
            delimiter: format!("\n\n{}", record_tag),
            carry: String::new(),
            scanned: 0,
            ready: VecDeque::new(),
            source: Arc::from(""),
            lossy_chunks: 0,
            discarded_bytes: 0,
            done: false,
        }
    }

    /// Chunks that lost bytes to decoding so far.
    pub fn lossy_chunks(&self) -> u64 {
        self.lossy_chunks
    }

    pub fn discarded_bytes(&self) -> u64 {
        self.discarded_bytes
    }

    fn push(&mut self, chunk: FlowFile<Chunk>) {
        let FlowFile { data, source } = chunk;
        self.source = source;
        if data.discarded > 0 {
            self.lossy_chunks += 1;
            self.discarded_bytes += data.discarded as u64;
        }
        self.carry.push_str(&data.text);

        let mut start = 0;
        let mut from = self.scanned;
        while let Some(pos) = self.carry[from..].find(&self.delimiter) {
            let at = from + pos;
            self.emit(start, at + 1);
            start = at + 2;
            from = start;
        }
        self.carry.drain(..start);

        let mut scanned = self.carry.len().saturating_sub(self.delimiter.len() - 1);
        while !self.carry.is_char_boundary(scanned) {
            scanned -= 1;
        }
        self.scanned = scanned;
    }

    fn emit(&mut self, start: usize, end: usize) {
        let record = &self.carry[start..end];
        if !record.trim().is_empty() {
            self.ready.push_back(record.to_string());
        }
    }

    fn flush(&mut self) {
        let mut record = std::mem::take(&mut self.carry);
        while record.ends_with("\n\n") {
            record.pop();
        }
        if !record.trim().is_empty() {
            self.ready.push_back(record);
        }
    }
}

impl<I> Iterator for Records<I>
where
    I: Iterator<Item = Flow<Chunk>>,
{
    type Item = Flow<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.ready.pop_front() {
                return Some(Ok(FlowFile::new(record, self.source.clone())));
            }
            if self.done {
                return None;
            }
            match self.chunks.next() {
                Some(Ok(chunk)) => self.push(chunk),
                Some(Err(e)) => {
                    // the archive is abandoned, so is its unfinished record
                    self.done = true;
                    self.carry.clear();
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    self.flush();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use crate::transformers::ChunkSource;

    use std::io::{self, Cursor};
    use std::path::PathBuf;

    const TAG: &str = "[Event ";

    fn game(n: usize, extra: &str) -> String {
        format!(
            "[Event \"Rated Blitz game\"]\n[Site \"https://lichess.org/g{n}\"]\n[Result \"1-0\"]\n\n1. e4 {{ [%eval 0.{n}] }} 1... e5 {extra}1-0\n"
        )
    }

    fn split(text: &str, chunk_size: usize) -> Vec<String> {
        let chunks = ChunkSource::from_reader(Cursor::new(text.to_string()), "mem", chunk_size);
        Records::new(chunks, TAG).map(|r| r.unwrap().data).collect()
    }

    #[test]
    fn test_n_records_identical_to_source() {
        let games: Vec<String> = (0..5).map(|n| game(n, "")).collect();
        let text = games.join("\n") + "\n";

        let records = split(&text, 1 << 20);
        assert_eq!(records, games);
    }

    #[test]
    fn test_chunk_size_invariance() {
        let games: Vec<String> = (0..20).map(|n| game(n, "{ Réti } ")).collect();
        let text = games.join("\n");

        let reference = split(&text, 10 * 1024 * 1024);
        assert_eq!(reference.len(), 20);
        // sizes that never cut the two-byte 'é' are lossless
        for size in [1usize, 2, 3, 5, 8, 9, 64, 1000] {
            let ascii = text.replace('é', "e");
            assert_eq!(split(&ascii, size), split(&ascii, 10 * 1024 * 1024), "size {}", size);
        }
        assert_eq!(split(&text, text.len()), reference);
    }

    #[test]
    fn test_final_record_without_terminator() {
        let text = format!("{}\n{}", game(1, ""), game(2, "").trim_end());
        let records = split(&text, 16);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], game(2, "").trim_end());
    }

    #[test]
    fn test_surplus_trailing_blank_lines_trimmed() {
        let text = format!("{}\n\n\n", game(1, ""));
        assert_eq!(split(&text, 4), vec![game(1, "")]);
    }

    #[test]
    fn test_leading_blank_lines_skipped() {
        let text = format!("\n\n{}\n{}", game(1, ""), game(2, ""));
        assert_eq!(split(&text, 3), vec![game(1, ""), game(2, "")]);
    }

    #[test]
    fn test_empty_stream() {
        assert!(split("", 8).is_empty());
        assert!(split("\n\n\n", 8).is_empty());
    }

    #[test]
    fn test_movetext_blank_line_is_not_a_boundary() {
        let text = game(1, "");
        assert_eq!(split(&text, 2), vec![text]);
    }

    #[test]
    fn test_read_error_ends_stream() {
        let first = game(1, "");
        let text = format!("{}\n{}", first, &game(2, "")[..20]);
        let chunk = Chunk {
            index: 0,
            offset: 0,
            text,
            discarded: 0,
        };
        let err = IngestError::ArchiveRead {
            path: PathBuf::from("a.pgn.zst"),
            chunk: 1,
            offset: 99,
            source: io::Error::new(io::ErrorKind::InvalidData, "bad frame"),
        };
        let chunks = vec![Ok(FlowFile::new(chunk, Arc::from("a.pgn.zst"))), Err(err)];

        let mut records = Records::new(chunks.into_iter(), TAG);
        let kept = records.next().unwrap().unwrap();
        assert_eq!(kept.data, first);
        assert_eq!(&*kept.source, "a.pgn.zst");
        assert!(matches!(records.next(), Some(Err(IngestError::ArchiveRead { .. }))));
        assert!(records.next().is_none());
    }

    #[test]
    fn test_decode_loss_is_counted() {
        let chunk = |text: &str, discarded| {
            Ok(FlowFile::new(
                Chunk {
                    index: 0,
                    offset: 0,
                    text: text.to_string(),
                    discarded,
                },
                Arc::from("mem"),
            ))
        };
        let chunks = vec![chunk(&game(1, ""), 1), chunk("", 0), chunk("\n", 2)];
        let mut records = Records::new(chunks.into_iter(), TAG);
        assert_eq!(records.by_ref().count(), 1);
        assert_eq!(records.lossy_chunks(), 2);
        assert_eq!(records.discarded_bytes(), 3);
    }
}
