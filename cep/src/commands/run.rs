//! Drives one evaluation mechanism over a pattern file and an event stream
//! to completion: a `Config`/`Error`/`command` split for one synchronous
//! run rather than a long-lived server. The core's concurrency model
//! is single threaded and suspends only at I/O boundaries, so there is no
//! need for an async runtime here.

use cep_core::config::{parse_merge_strategy, parse_negation_algorithm, parse_update_type, EngineConfig};
use cep_core::eval::EngineError;
use cep_core::io::{CsvDataFormatter, LineInputStream, OutputStream as _, TextOutputStream};
use cep_core::metrics::Metrics;
use cep_time::{SystemProvider, TimeProviderRef};
use metric::Registry;
use observability_deps::tracing::warn;
use snafu::{ResultExt, Snafu};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("could not read pattern file {}: {}", path.display(), source))]
    ReadPatternFile { path: PathBuf, source: std::io::Error },

    #[snafu(display("could not parse pattern file {}: {}", path.display(), source))]
    ParsePatternFile { path: PathBuf, source: serde_json::Error },

    #[snafu(display("could not open input {}: {}", path.display(), source))]
    OpenInput { path: PathBuf, source: std::io::Error },

    #[snafu(display("could not open output {}: {}", path.display(), source))]
    OpenOutput { path: PathBuf, source: std::io::Error },

    #[snafu(display("could not open metrics output {}: {}", path.display(), source))]
    OpenMetricsOutput { path: PathBuf, source: std::io::Error },

    #[snafu(display("{}", source))]
    Engine { source: EngineError },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// CLI configuration covering every recognized configuration option.
#[derive(Debug, clap::Parser)]
pub struct Config {
    /// Path to a JSON pattern file (see `cep::patterns`).
    #[clap(long)]
    patterns: PathBuf,

    /// Input event rows; reads stdin if omitted.
    #[clap(long)]
    input: Option<PathBuf>,

    /// Where rendered matches are written; stdout if omitted.
    #[clap(long)]
    output: Option<PathBuf>,

    /// Where the metrics stream is written; stderr if omitted.
    #[clap(long)]
    metrics_output: Option<PathBuf>,

    /// Discard the metrics stream entirely.
    #[clap(long)]
    quiet_metrics: bool,

    /// Enable adaptive reoptimization. Rejected at construction if more
    /// than one pattern is registered.
    #[clap(long)]
    adaptive: bool,

    /// `trivial` or `simultaneous`.
    #[clap(long, default_value = "trivial")]
    update_type: String,

    /// `share-leaves`, `subtree-union`, or `local-search`.
    #[clap(long, default_value = "share-leaves")]
    merge: String,

    /// `naive`, `statistic`, or `lowest-position`.
    #[clap(long, default_value = "naive")]
    negation_algorithm: String,

    /// Event-time duration between statistics ticks, in milliseconds.
    #[clap(long, default_value = "1000")]
    statistics_window_millis: i64,

    /// Maximum concurrent active partial matches before a shed triggers.
    #[clap(long, default_value_t = usize::MAX)]
    load_shed_threshold: usize,

    /// Partial matches freed per shed, once triggered.
    #[clap(long, default_value = "0")]
    load_shed_target: usize,
}

pub fn command(config: Config) -> Result<()> {
    logfmt::init_default_subscriber();

    let negation_algorithm =
        parse_negation_algorithm(&config.negation_algorithm).map_err(|source| Error::Engine {
            source: EngineError::Config(source),
        })?;
    let update_type = parse_update_type(&config.update_type).map_err(|source| Error::Engine {
        source: EngineError::Config(source),
    })?;
    let merge = parse_merge_strategy(&config.merge).map_err(|source| Error::Engine {
        source: EngineError::Config(source),
    })?;

    let raw = std::fs::read_to_string(&config.patterns).context(ReadPatternFileSnafu {
        path: config.patterns.clone(),
    })?;
    let file: crate::patterns::PatternFile = serde_json::from_str(&raw).context(ParsePatternFileSnafu {
        path: config.patterns.clone(),
    })?;
    let patterns = crate::patterns::load_patterns(file, negation_algorithm);

    let engine_config = EngineConfig {
        adaptive: config.adaptive,
        update_type,
        optimizer: cep_core::config::OptimizerKind::Trivial,
        statistics_update_window_nanos: config.statistics_window_millis.saturating_mul(1_000_000),
        merge,
        load_shed_threshold: config.load_shed_threshold,
        load_shed_target: config.load_shed_target,
        negation_algorithm,
    };

    let time_provider: TimeProviderRef = Arc::new(SystemProvider::default());
    let metrics_writer = open_metrics_output(&config)?;
    let registry = Registry::with_sink(metrics_writer, time_provider);
    let metrics = Metrics::new(&registry);

    let mut mechanism = cep_core::eval::EvaluationMechanism::new(patterns, engine_config, metrics.clone())
        .map_err(|source| Error::Engine { source })?;
    let multi_pattern = mechanism.multi_pattern();

    let input = open_input(&config.input)?;
    let mut input_stream = LineInputStream::new(input);
    let formatter = CsvDataFormatter;
    let output_writer = open_output(&config.output)?;
    let mut output = TextOutputStream::new(output_writer);

    let mut events = cep_core::io::decode_stream(&mut input_stream, &formatter, |err| {
        metrics.malformed_events.inc();
        warn!(%err, "dropping malformed row");
    });
    for event in events.by_ref() {
        let event_type = Arc::clone(&event.event_type);
        let start = Instant::now();
        let produced = mechanism.eval_event(event);
        metrics
            .event_processing_latency
            .record(start.elapsed().as_nanos() as i64, "event_type", event_type);
        for m in produced {
            output.emit(m.pattern_id, multi_pattern, &m.pm);
        }
    }
    // End-of-stream always triggers a graceful drain of any match still
    // waiting on a window-close confirmation.
    for m in mechanism.finalize() {
        output.emit(m.pattern_id, multi_pattern, &m.pm);
    }
    output.close();
    Ok(())
}

fn open_input(path: &Option<PathBuf>) -> Result<Box<dyn BufRead>> {
    match path {
        Some(p) => {
            let f = File::open(p).context(OpenInputSnafu { path: p.clone() })?;
            Ok(Box::new(BufReader::new(f)))
        }
        None => Ok(Box::new(BufReader::new(std::io::stdin()))),
    }
}

fn open_output(path: &Option<PathBuf>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) => {
            let f = File::create(p).context(OpenOutputSnafu { path: p.clone() })?;
            Ok(Box::new(f))
        }
        None => Ok(Box::new(std::io::stdout())),
    }
}

fn open_metrics_output(config: &Config) -> Result<Box<dyn Write + Send>> {
    if config.quiet_metrics {
        return Ok(Box::new(std::io::sink()));
    }
    match &config.metrics_output {
        Some(p) => {
            let f = File::create(p).context(OpenMetricsOutputSnafu { path: p.clone() })?;
            Ok(Box::new(f))
        }
        None => Ok(Box::new(std::io::stderr())),
    }
}
