//! Streams annotated games out of compressed PGN archives.
//!
//! Each archive is decoded in bounded chunks, split into game records, filtered
//! for engine evaluations and appended to size-rotated output files:
//!
//! ```text
//! ArchiveGlob -> Unpack -> Records -> ContentFilter -> RotatingWriter
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod framework;
pub mod junctions;
pub mod sinks;
pub mod split;
pub mod transformers;

pub use config::Config;
pub use driver::{Extractor, RunSummary};
pub use error::{IngestError, Result};

#[cfg(test)]
mod tests {
    use crate::framework::*;
    use crate::junctions::*;
    use crate::split::*;
    use crate::transformers::*;

    use std::fs;

    #[test]
    fn test_linear_flow() {
        let dir = tempfile::tempdir().unwrap();
        let game = |event: &str, moves: &str| {
            format!("[Event \"{}\"]\n[Result \"*\"]\n\n{} *\n", event, moves)
        };
        let a = [
            game("Rated Blitz game", "1. e4 { [%eval 0.2] }"),
            game("Rated Bullet game", "1. d4 { [%eval 0.1] }"),
        ]
        .join("\n");
        let b = [
            game("Rated Rapid game", "1. c4"),
            game("Rated Classical game", "1. Nf3 { [%eval 0.0] }"),
            game("Rated Blitz game", "1. g3 { [%eval -0.1] }"),
        ]
        .join("\n");
        fs::write(dir.path().join("a.pgn.zst"), zstd::encode_all(a.as_bytes(), 1).unwrap()).unwrap();
        fs::write(dir.path().join("b.pgn.zst"), zstd::encode_all(b.as_bytes(), 1).unwrap()).unwrap();

        let g = ArchiveGlob {
            dir: dir.path().to_path_buf(),
            suffixes: vec![".pgn.zst".to_string()],
        };
        let u = Unpack { chunk_size: 5 };
        let f = ContentFilter::new("[%eval", "Bullet");

        let mut stats = Stats::new();
        g.transform(FlowFile::genesis())
            .map(Result::unwrap)
            .flat_map(|i| Records::new(u.transform(i), "[Event "))
            .map(Result::unwrap)
            .for_each(|i| stats.increment(f.split(&i)));

        assert_eq!(stats.records, 5);
        assert_eq!(stats.kept, 3);
        assert_eq!(stats.diverted, 1);
        assert_eq!(stats.dropped, 1);
    }
}
