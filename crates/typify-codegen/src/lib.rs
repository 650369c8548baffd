//! Typify Codegen - JavaScript source generation
//!
//! Prints a script with `swc_ecma_codegen` and records, for every node that
//! came from the original source, where its text starts in the output. The
//! same records can be rendered as a Source Map v3 document.

mod position;

pub use position::*;

use serde::{Deserialize, Serialize};
use swc_core::common::comments::Comments;
use swc_core::ecma::ast::Script;
use swc_core::ecma::codegen::{text_writer::JsWriter, Config, Emitter};
use thiserror::Error;
use typify_parser::SourceContext;

/// Output options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// Emit the source's comments
    pub comments: bool,
    /// Render a Source Map v3 document next to the code
    pub source_map: bool,
}

/// Generated code and its position map
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub code: String,
    pub map: PositionMap,
    /// Source Map v3 JSON, when requested
    pub source_map: Option<String>,
}

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("failed to emit code: {0}")]
    Emit(#[from] std::io::Error),

    #[error("emitted text is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("failed to render source map: {0}")]
    SourceMap(String),
}

/// Generate JavaScript text for `script`, whose spans point into `context`
pub fn generate(
    script: &Script,
    context: &SourceContext,
    options: &GenerateOptions,
) -> Result<Generated, CodegenError> {
    let mut buf = Vec::new();
    let mut emitted = Vec::new();
    {
        let comments: Option<&dyn Comments> = if options.comments {
            Some(&context.comments)
        } else {
            None
        };
        let mut emitter = Emitter {
            cfg: Config::default(),
            cm: context.source_map.clone(),
            comments,
            wr: JsWriter::new(context.source_map.clone(), "\n", &mut buf, Some(&mut emitted)),
        };
        emitter.emit_script(script)?;
    }

    let mut code = String::from_utf8(buf)?;
    code.truncate(code.trim_end_matches('\n').len());
    let map = PositionMap::from_emitted(&code, &emitted, context);

    let source_map = if options.source_map {
        let rendered = context.source_map.build_source_map(&mut emitted);
        let mut json = Vec::new();
        rendered
            .to_writer(&mut json)
            .map_err(|e| CodegenError::SourceMap(e.to_string()))?;
        Some(String::from_utf8(json)?)
    } else {
        None
    };

    Ok(Generated {
        code,
        map,
        source_map,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regen_with(source: &str, options: &GenerateOptions) -> Generated {
        let parsed = typify_parser::parse(source).expect("source should parse");
        generate(&parsed.script, &parsed.context, options).expect("generation succeeds")
    }

    fn regen(source: &str) -> String {
        regen_with(source, &GenerateOptions::default()).code
    }

    /// The text with all whitespace removed
    fn compact(code: &str) -> String {
        code.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_statements_are_laid_out() {
        let code = regen("function f(x){return x+1}var a=1,b;foo(a,b)");
        assert_eq!(compact(&code), "functionf(x){returnx+1;}vara=1,b;foo(a,b);");
        assert!(code.contains("\n"), "expected one statement per line:\n{code}");
    }

    #[test]
    fn test_literals_are_printed_as_written() {
        let code = regen(r#"var s = "😀", lone = '\uD800', n = 010, big = 0x1fffffffffffffffffff;"#);
        assert!(code.contains(r#""😀""#), "{code}");
        assert!(code.contains(r#"'\uD800'"#), "{code}");
        assert!(code.contains("n = 010"), "{code}");
        assert!(code.contains("0x1fffffffffffffffffff"), "{code}");
    }

    #[test]
    fn test_inputs_outside_plain_ascii_es5() {
        assert!(regen("if (x) /a/.test(y);").contains("/a/.test(y)"));
        assert_eq!(compact(&regen("\u{feff}var a = 1;")), "vara=1;");
        assert!(regen("var café = 1;").contains("café"));
        assert_eq!(compact(&regen("var let = 1;")), "varlet=1;");
    }

    #[test]
    fn test_comments_optional() {
        assert_eq!(compact(&regen("// hi\nfoo();")), "foo();");

        let options = GenerateOptions {
            comments: true,
            ..GenerateOptions::default()
        };
        assert!(regen_with("// hi\nfoo();", &options).code.contains("// hi"));
    }

    #[test]
    fn test_hashbang_is_kept() {
        assert!(regen("#!/usr/bin/env node\nrun()").starts_with("#!/usr/bin/env node\n"));
    }

    #[test]
    fn test_position_map_points_at_original_statements() {
        let source = "var a = 1;\n\n\nfoo(a);";
        let generated = regen_with(source, &GenerateOptions::default());
        assert!(generated.source_map.is_none());

        let foo_generated = generated.code.find("foo").expect("foo emitted");
        let foo_original = source.find("foo").expect("foo in source");
        assert_eq!(generated.map.original_offset(foo_generated), Some(foo_original));

        let mappings = generated.map.mappings();
        assert!(mappings.windows(2).all(|w| w[0].generated < w[1].generated));
        assert!(mappings.iter().all(|m| m.original <= source.len()));
    }

    #[test]
    fn test_source_map_document() {
        let options = GenerateOptions {
            source_map: true,
            ..GenerateOptions::default()
        };
        let generated = regen_with("var a = 1;\nfoo(a);", &options);
        let json = generated.source_map.expect("source map requested");
        let map: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");
        assert_eq!(map["version"], 3);
        assert!(map["mappings"].as_str().is_some_and(|m| !m.is_empty()));
    }
}
