use pgn_ingest::config::*;
use pgn_ingest::Extractor;

use anyhow::Context;
use clap::builder::NonEmptyStringValueParser;
use clap::Parser;
use env_logger::Env;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pgn-extract",
    about = "Extract games with engine evaluations from compressed PGN archives"
)]
struct Args {
    /// Directory holding the .pgn.zst / .pgn.gz archives
    input_dir: PathBuf,

    /// Directory receiving the rotated output files
    output_dir: PathBuf,

    /// Record bytes after which the next game goes to a new output file
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    max_bytes: u64,

    /// Size of the decoded chunks read from an archive
    #[arg(long, env = "PGN_EXTRACT_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Games must contain this to be kept
    #[arg(
        long,
        env = "PGN_EXTRACT_EVAL_MARKER",
        default_value = DEFAULT_EVAL_MARKER,
        value_parser = NonEmptyStringValueParser::new()
    )]
    eval_marker: String,

    /// Games containing this are not kept
    #[arg(
        long,
        env = "PGN_EXTRACT_BULLET_MARKER",
        default_value = DEFAULT_BULLET_MARKER,
        value_parser = NonEmptyStringValueParser::new()
    )]
    bullet_marker: String,

    /// Tag opening every game's header section
    #[arg(
        long,
        env = "PGN_EXTRACT_RECORD_TAG",
        default_value = DEFAULT_RECORD_TAG,
        value_parser = NonEmptyStringValueParser::new()
    )]
    record_tag: String,

    /// Archive file suffix to pick up, repeatable or comma separated
    /// [default: .pgn.zst,.pgn.gz]
    #[arg(
        long = "suffix",
        env = "PGN_EXTRACT_SUFFIX",
        value_delimiter = ',',
        value_parser = NonEmptyStringValueParser::new()
    )]
    suffixes: Vec<String>,

    /// Output file name prefix
    #[arg(long, env = "PGN_EXTRACT_PREFIX", default_value = DEFAULT_PREFIX)]
    prefix: String,

    /// Write bullet games with evals to their own files instead of dropping them
    #[arg(long, env = "PGN_EXTRACT_BULLETS")]
    bullets: bool,

    /// Output file name prefix for bullet games
    #[arg(long, env = "PGN_EXTRACT_BULLET_PREFIX", default_value = DEFAULT_BULLET_PREFIX)]
    bullet_prefix: String,

    /// Write a per-archive CSV report to this path
    #[arg(long, env = "PGN_EXTRACT_REPORT")]
    report: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    // setup logger, INFO level by default
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = Config::new(args.input_dir, args.output_dir, args.max_bytes)
        .chunk_size(args.chunk_size)
        .markers(args.eval_marker, args.bullet_marker)
        .record_tag(args.record_tag)
        .prefix(args.prefix);
    if args.bullets {
        config = config.divert_bullets(args.bullet_prefix);
    }
    if let Some(report) = args.report {
        config = config.report(report);
    }
    if !args.suffixes.is_empty() {
        config = config.archive_suffixes(args.suffixes);
    }

    let summary = Extractor::new(config)
        .context("cannot prepare outputs")?
        .run()
        .context("extraction aborted")?;

    let stats = &summary.stats;
    println!("Total games with eval comments: {}", stats.kept);
    if !summary.bullet_outputs.is_empty() || stats.diverted > 0 {
        println!("Total bullet games with eval comments: {}", stats.diverted);
    }
    println!("Dropped games: {}", stats.dropped);
    println!(
        "Output files: {}",
        summary.outputs.len() + summary.bullet_outputs.len()
    );
    if stats.aborted_archives > 0 {
        println!("Abandoned archives: {}", stats.aborted_archives);
    }

    Ok(())
}
