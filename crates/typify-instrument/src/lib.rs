//! Typify Instrument - contract instrumentation driven by comments
//!
//! Functions annotated with a `::` signature comment are wrapped in calls
//! to a runtime checker, and free-standing `typify:` comments become type
//! registrations on that checker:
//!
//! ```
//! use std::sync::Arc;
//! use typify_instrument::{InstrumentConfig, Instrumenter, Stats};
//!
//! let stats = Arc::new(Stats::new());
//! let instrumenter = Instrumenter::new(InstrumentConfig::default(), stats.clone()).unwrap();
//! let output = instrumenter
//!     .transform("// :: number -> number\nfunction inc(x) { return x + 1; }", "inc.js")
//!     .unwrap();
//!
//! assert!(output.contains("\"inc :: number -> number\""));
//! assert_eq!(stats.function_declaration.matched(), 1);
//! ```

pub mod astgen;
mod config;
pub mod directive;
mod error;
pub mod insert;
pub mod matcher;
mod stats;
pub mod wrap;

pub use config::*;
pub use directive::{Directive, DirectiveKind};
pub use error::*;
pub use stats::*;

use std::path::{Component, Path};
use std::sync::Arc;

use swc_core::common::comments::Comment;
use tracing::{debug, warn};
use typify_codegen::{generate, GenerateOptions, PositionMap};

use crate::wrap::Patterns;

/// Result of instrumenting one file
#[derive(Debug, Clone)]
pub struct Instrumented {
    pub code: String,
    /// Generated offsets mapped back to the source
    pub map: PositionMap,
    /// Source Map v3 JSON, when configured
    pub source_map: Option<String>,
    /// Directives that were skipped as malformed
    pub warnings: Vec<SkippedDirective>,
}

/// Instruments sources with one configuration, accumulating into shared
/// [`Stats`]
#[derive(Debug, Clone)]
pub struct Instrumenter {
    config: InstrumentConfig,
    stats: Arc<Stats>,
    patterns: Patterns,
}

impl Instrumenter {
    pub fn new(config: InstrumentConfig, stats: Arc<Stats>) -> Result<Self, InstrumentError> {
        Ok(Self {
            config,
            stats,
            patterns: Patterns::standard()?,
        })
    }

    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    /// Parse, insert directives, wrap annotated functions and regenerate
    pub fn instrument(&self, source: &str, file: &str) -> Result<Instrumented, InstrumentError> {
        debug!(file, bytes = source.len(), "instrumenting");
        let parsed = typify_parser::parse_file(source, file)?;
        let context = &parsed.context;

        let (directives, errors) = collect_directives(&context.comments());
        let mut warnings = Vec::new();
        for error in errors {
            let range = context.range(error.span());
            if self.config.strict_directives {
                return Err(InstrumentError::Directive { error, range });
            }
            warn!(file, offset = range.start, "skipping directive: {error}");
            warnings.push(SkippedDirective { error, range });
        }

        let script = insert::insert_directives(parsed.script, &directives, &self.config.checker);
        let script =
            wrap::wrap_functions(script, context, &self.config, &self.stats, &self.patterns);

        let options = GenerateOptions {
            source_map: self.config.source_map,
            ..GenerateOptions::default()
        };
        let generated = generate(&script, context, &options)?;
        debug!(
            file,
            directives = directives.len(),
            mappings = generated.map.len(),
            "instrumented"
        );

        Ok(Instrumented {
            code: generated.code,
            map: generated.map,
            source_map: generated.source_map,
            warnings,
        })
    }

    /// Instrumented source text only
    pub fn transform(&self, source: &str, file: &str) -> Result<String, InstrumentError> {
        Ok(self.instrument(source, file)?.code)
    }
}

/// Read every free-standing directive among `comments`. Comments that carry
/// the `typify:` marker but fit no directive form are reported and ignored.
pub fn collect_directives(comments: &[Comment]) -> (Vec<Directive>, Vec<DirectiveError>) {
    let mut directives = Vec::new();
    let mut errors = Vec::new();
    for comment in comments.iter().filter(|c| directive::is_directive_comment(c)) {
        match directive::parse_directive(comment) {
            Ok(Some(found)) => directives.push(found),
            Ok(None) => warn!(
                offset = comment.span.lo.0,
                text = comment.text.trim(),
                "unrecognized typify directive"
            ),
            Err(error) => errors.push(error),
        }
    }
    (directives, errors)
}

/// Whether a module at `path` should be instrumented when loaded: nothing
/// under a `node_modules`, `test` or `tests` directory is
pub fn is_instrumentable(path: &Path) -> bool {
    let Some(parent) = path.parent() else {
        return true;
    };
    !parent.components().any(|component| {
        matches!(
            component,
            Component::Normal(name)
                if matches!(name.to_str(), Some("node_modules" | "test" | "tests"))
        )
    })
}
