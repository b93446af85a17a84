//! Runs every archive of the input directory through the pipeline.

use crate::config::Config;
use crate::error::{IngestError, Result};
use crate::framework::*;
use crate::junctions::ContentFilter;
use crate::sinks::{OutputSummary, RotatingWriter, RunReport};
use crate::split::Records;
use crate::transformers::{ArchiveGlob, Unpack};

use log::{error, info};

use std::path::{Path, PathBuf};

const PROGRESS_EVERY: u64 = 1_000_000;

fn archive_glob(config: &Config) -> ArchiveGlob {
    ArchiveGlob {
        dir: config.input_dir.clone(),
        suffixes: config.archive_suffixes.clone(),
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub stats: Stats,
    pub outputs: Vec<OutputSummary>,
    pub bullet_outputs: Vec<OutputSummary>,
}

/// Owns the state shared across archives: the filter, the writers (and with
/// them the rotation counters) and the running totals.
pub struct Extractor {
    config: Config,
    filter: ContentFilter,
    writer: RotatingWriter,
    bullets: Option<RotatingWriter>,
    report: Option<RunReport>,
    totals: Stats,
}

impl Extractor {
    /// Checks the input directory, then creates the output directory and the
    /// report. Nothing is created when the input directory is unusable.
    pub fn new(config: Config) -> Result<Self> {
        archive_glob(&config).check_dir()?;

        let filter = ContentFilter::new(&config.eval_marker, &config.bullet_marker);
        let writer = RotatingWriter::new(&config.output_dir, &config.prefix, config.max_bytes)?;
        let bullets = match &config.bullet_prefix {
            Some(prefix) => Some(RotatingWriter::new(
                &config.output_dir,
                prefix,
                config.max_bytes,
            )?),
            None => None,
        };
        let report = match &config.report {
            Some(path) => Some(RunReport::create(path)?),
            None => None,
        };

        Ok(Self {
            config,
            filter,
            writer,
            bullets,
            report,
            totals: Stats::new(),
        })
    }

    /// Processes the archives in file name order and closes every output.
    pub fn run(mut self) -> Result<RunSummary> {
        let archives = archive_glob(&self.config)
            .transform(FlowFile::genesis())
            .map(|archive| archive.map(|ff| ff.data))
            .collect::<Result<Vec<PathBuf>>>()?;

        if archives.is_empty() {
            info!(
                "no archives matching {:?} in {}",
                self.config.archive_suffixes,
                self.config.input_dir.display()
            );
        }

        for archive in &archives {
            self.process(archive)?;
        }

        info!(
            "done: {} archives ({} aborted), {} records, {} kept, {} diverted, {} dropped",
            self.totals.archives,
            self.totals.aborted_archives,
            self.totals.records,
            self.totals.kept,
            self.totals.diverted,
            self.totals.dropped
        );
        if self.totals.discarded_bytes > 0 {
            info!(
                "decoding dropped {} bytes across {} chunks",
                self.totals.discarded_bytes, self.totals.lossy_chunks
            );
        }

        let outputs = self.writer.finish()?;
        let bullet_outputs = match self.bullets {
            Some(writer) => writer.finish()?,
            None => Vec::new(),
        };
        if let Some(report) = self.report {
            report.finish()?;
        }

        Ok(RunSummary {
            stats: self.totals,
            outputs,
            bullet_outputs,
        })
    }

    /// Streams one archive into the writers.
    ///
    /// A read failure abandons the archive and is logged; only output errors
    /// are returned.
    pub fn process(&mut self, archive: &Path) -> Result<Stats> {
        info!(
            "processing {} (output file {})",
            archive.display(),
            self.writer.current_index()
        );

        let unpack = Unpack {
            chunk_size: self.config.chunk_size,
        };
        let chunks = unpack.transform(FlowFile::new(archive.to_path_buf(), "".into()));
        let mut records = Records::new(chunks, &self.config.record_tag);

        let mut stats = Stats::new();
        stats.archives = 1;

        for record in records.by_ref() {
            let record = match record {
                Ok(record) => record,
                Err(e @ IngestError::ArchiveRead { .. }) => {
                    error!("abandoning archive: {}", e);
                    stats.aborted_archives = 1;
                    break;
                }
                Err(e) => return Err(e),
            };

            let route = match self.filter.split(&record) {
                Route::Keep => {
                    self.writer.close(record)?;
                    Route::Keep
                }
                Route::Divert => match self.bullets.as_mut() {
                    Some(bullets) => {
                        bullets.close(record)?;
                        Route::Divert
                    }
                    None => Route::Drop,
                },
                Route::Drop => Route::Drop,
            };
            stats.increment(route);

            if (self.totals.records + stats.records) % PROGRESS_EVERY == 0 {
                info!("processed {} records", self.totals.records + stats.records);
            }
        }
        stats.lossy_chunks = records.lossy_chunks();
        stats.discarded_bytes = records.discarded_bytes();
        drop(records);

        info!(
            "finished {}: {} kept, {} diverted, {} dropped (output file {})",
            archive.display(),
            stats.kept,
            stats.diverted,
            stats.dropped,
            self.writer.current_index()
        );

        if let Some(report) = self.report.as_mut() {
            report.row(archive, &stats, self.writer.current_index())?;
        }
        self.totals += &stats;
        Ok(stats)
    }
}
