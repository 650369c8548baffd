//! Typify Parser - JavaScript front end
//!
//! Parses a script with `swc_ecma_parser` and keeps everything later stages
//! need next to the tree: the source map the spans point into and every
//! comment, indexed by the position of the token it precedes or follows.

mod error;
mod source;

pub use error::*;
pub use source::*;

use swc_core::ecma::ast::{EsVersion, Script};
use swc_core::ecma::parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax};

/// A parsed script and its source context
#[derive(Debug)]
pub struct Parsed {
    pub script: Script,
    pub context: SourceContext,
}

/// Parse a source string into a script
pub fn parse(source: &str) -> Result<Parsed, ParseError> {
    parse_file(source, "input.js")
}

/// Parse a source string, naming it `file_name` in spans and source maps
pub fn parse_file(source: &str, file_name: &str) -> Result<Parsed, ParseError> {
    let context = SourceContext::new(source, file_name);

    let script = {
        let lexer = Lexer::new(
            Syntax::Es(EsSyntax::default()),
            EsVersion::EsNext,
            StringInput::from(&*context.file),
            Some(&context.comments),
        );
        let mut parser = Parser::new_from(lexer);
        let script = parser
            .parse_script()
            .map_err(|e| ParseError::from_syntax(e, &context))?;
        // Recovered errors still mean the input is not valid JavaScript
        if let Some(error) = parser.take_errors().into_iter().next() {
            return Err(ParseError::from_syntax(error, &context));
        }
        script
    };

    Ok(Parsed { script, context })
}
