#![warn(clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,  // run counts as u32, millis as u64; 64-bit targets
    clippy::cast_precision_loss,       // millisecond statistics as f64
    clippy::module_name_repetitions,   // Rust naming conventions
    clippy::similar_names,             // lo/hi, text/texts in scan code
    clippy::missing_errors_doc,        // every fallible fn returns TallyError
    clippy::missing_panics_doc,        // same
)]

pub mod config;
pub mod error;
pub mod harness;
pub mod kernel;
pub mod report;
pub mod scan;
pub mod types;

use std::path::Path;

use tracing::info;

use config::Config;
use error::TallyError;
use harness::Harness;
use report::CsvSink;
use types::{Corpus, RunRecord};

/// The single public entry point: load the input, run every selected
/// backend `config.runs` times, and write the CSV. `on_record` sees each
/// record as soon as it is written.
pub fn run(
    config: &Config,
    mut on_record: impl FnMut(&RunRecord),
) -> Result<Vec<RunRecord>, TallyError> {
    let corpus = load_corpus(&config.input)?;
    info!(
        input = %config.input.display(),
        bytes = corpus.bytes().len(),
        lines = corpus.line_count(),
        workers = config.workers,
        partition = %config.partition,
        "corpus loaded"
    );

    let harness = Harness::from_config(config)?;
    let mut sink = CsvSink::create(&config.output)?;
    let input = config.input.display().to_string();

    let records = harness.run(&corpus, &config.pattern, &input, |record| {
        sink.write(record)?;
        on_record(record);
        Ok(())
    })?;
    sink.finish()?;

    Ok(records)
}

/// Read the whole file into memory. Fails before any backend runs.
pub fn load_corpus(path: &Path) -> Result<Corpus, TallyError> {
    let bytes = std::fs::read(path).map_err(|e| TallyError::io(path, e))?;
    Ok(Corpus::new(bytes))
}
