#![allow(dead_code)]

pub mod fixtures;

use std::sync::Arc;

use typify::instrument::{InstrumentConfig, Instrumented, Instrumenter, Stats, StatsSnapshot};

/// Instrument `source` with the default configuration and fresh stats
pub fn instrument(source: &str, file: &str) -> (Instrumented, StatsSnapshot) {
    let stats = Arc::new(Stats::new());
    let instrumenter =
        Instrumenter::new(InstrumentConfig::default(), stats.clone()).expect("patterns compile");
    let result = instrumenter
        .instrument(source, file)
        .unwrap_or_else(|e| panic!("failed to instrument {file}: {e}"));
    (result, stats.snapshot())
}

/// Assert that `source` parses, with the text in the failure message
pub fn assert_parses(source: &str) -> typify::parser::Parsed {
    typify::parser::parse(source)
        .unwrap_or_else(|e| panic!("expected source to parse: {e}\n---\n{source}"))
}

/// The text with all whitespace removed
pub fn compact(code: &str) -> String {
    code.chars().filter(|c| !c.is_whitespace()).collect()
}
