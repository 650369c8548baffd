//! Comment directives
//!
//! Two kinds of comments drive instrumentation. A comment preceding a
//! function that contains `::` carries its signature:
//!
//! ```text
//! // add :: number -> number -> number
//! ```
//!
//! A free-standing comment starting with `typify:` declares a type:
//!
//! ```text
//! // typify: type Point = { x: number; y: number }
//! // typify: instance Person
//! /* typify: adt Tree
//!      leaf: number
//!      node: Tree */
//! ```

use indexmap::IndexMap;
use serde::Serialize;
use swc_core::common::comments::Comment;
use swc_core::common::Span;

use crate::DirectiveError;

const MARKER: &str = "typify:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub kind: DirectiveKind,
    /// Span of the originating comment
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "directive", rename_all = "lowercase")]
pub enum DirectiveKind {
    /// `type Name = definition`
    Alias { name: String, definition: String },
    /// `instance Name`
    Instance { name: String },
    /// `adt Name` with `field: type` lines
    Adt {
        name: String,
        fields: IndexMap<String, String>,
    },
}

impl DirectiveKind {
    pub fn name(&self) -> &str {
        match self {
            DirectiveKind::Alias { name, .. }
            | DirectiveKind::Instance { name }
            | DirectiveKind::Adt { name, .. } => name,
        }
    }

    /// Checker member the directive calls
    pub fn method(&self) -> &'static str {
        match self {
            DirectiveKind::Alias { .. } => "alias",
            DirectiveKind::Instance { .. } => "instance",
            DirectiveKind::Adt { .. } => "adt",
        }
    }
}

/// Signature carried by a statement's leading comments.
///
/// The first comment containing `::` is used: its signature is the rest of
/// that line, whitespace-trimmed. An empty signature counts as none.
pub fn find_signature(comments: &[Comment]) -> Option<String> {
    let comment = comments.iter().find(|c| c.text.contains("::"))?;
    let (_, rest) = comment.text.split_once("::")?;
    let signature = rest
        .trim_start()
        .split(is_line_terminator)
        .next()
        .unwrap_or_default()
        .trim_end();
    (!signature.is_empty()).then(|| signature.to_string())
}

/// Whether a comment is addressed to typify
pub fn is_directive_comment(comment: &Comment) -> bool {
    comment.text.trim_start().starts_with(MARKER)
}

/// Read a free-standing directive. Comments that are not directives, or
/// that fit no directive form, yield `Ok(None)`.
pub fn parse_directive(comment: &Comment) -> Result<Option<Directive>, DirectiveError> {
    let Some(body) = comment.text.trim_start().strip_prefix(MARKER) else {
        return Ok(None);
    };
    let body = body.trim_start();

    let kind = if let Some(rest) = keyword(body, "type") {
        parse_alias(rest)
    } else if let Some(rest) = keyword(body, "instance") {
        parse_instance(rest)
    } else if let Some(rest) = keyword(body, "adt") {
        parse_adt(rest, comment.span)?
    } else {
        None
    };

    Ok(kind.map(|kind| Directive {
        kind,
        span: comment.span,
    }))
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

/// `word` followed by at least one whitespace character
fn keyword<'a>(text: &'a str, word: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(word)?;
    let trimmed = rest.trim_start();
    (trimmed.len() < rest.len()).then_some(trimmed)
}

/// Split a leading `[A-Za-z_][A-Za-z0-9_]*` off `text`
fn split_name(text: &str) -> Option<(&str, &str)> {
    let first = text.chars().next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    let len = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    Some(text.split_at(len))
}

/// `Name = definition`, where the definition is the rest of the line after
/// `=` exactly as written
fn parse_alias(text: &str) -> Option<DirectiveKind> {
    let (name, rest) = split_name(text)?;
    let after_name = rest.trim_start();
    if after_name.len() == rest.len() {
        return None;
    }
    let definition = after_name
        .strip_prefix('=')?
        .trim_start_matches(|c: char| c.is_whitespace() && !is_line_terminator(c));
    if definition.contains(is_line_terminator) {
        return None;
    }
    Some(DirectiveKind::Alias {
        name: name.to_string(),
        definition: definition.to_string(),
    })
}

fn parse_instance(text: &str) -> Option<DirectiveKind> {
    let (name, rest) = split_name(text)?;
    rest.trim().is_empty().then(|| DirectiveKind::Instance {
        name: name.to_string(),
    })
}

fn parse_adt(text: &str, span: Span) -> Result<Option<DirectiveKind>, DirectiveError> {
    let Some((name, rest)) = split_name(text) else {
        return Ok(None);
    };
    let (header, body) = rest.split_once('\n').unwrap_or((rest, ""));
    if !header.trim().is_empty() {
        return Ok(None);
    }

    let mut fields = IndexMap::new();
    for line in body.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let Some((field, ty)) = parse_field(line) else {
            return Err(DirectiveError::MalformedAdtField {
                name: name.to_string(),
                line: line.to_string(),
                span,
            });
        };
        // Re-declared fields keep their first position
        fields.insert(field.to_string(), ty.to_string());
    }

    if fields.is_empty() {
        return Ok(None);
    }
    Ok(Some(DirectiveKind::Adt {
        name: name.to_string(),
        fields,
    }))
}

/// `name: type`
fn parse_field(line: &str) -> Option<(&str, &str)> {
    let (name, rest) = split_name(line)?;
    let ty = rest.trim_start().strip_prefix(':')?.trim();
    (!ty.is_empty()).then_some((name, ty))
}
