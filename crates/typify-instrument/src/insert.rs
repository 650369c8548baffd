//! Directive insertion
//!
//! Each free-standing directive becomes a call on the checker binding,
//! placed in the innermost block scope that contains its comment. A first
//! read-only pass indexes the scopes; a second pass walks the tree in the
//! same order and splices the calls in.

use std::cmp::Reverse;

use serde_json::{Map, Value};
use swc_core::common::{Span, Spanned};
use swc_core::ecma::ast::{BlockStmt, ExprStmt, Script, Stmt};
use swc_core::ecma::visit::{Visit, VisitMut, VisitMutWith, VisitWith};
use tracing::debug;

use crate::astgen;
use crate::directive::{Directive, DirectiveKind};

/// A block scope found by traversal. The script is scope 0; blocks are
/// numbered in pre-order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Scope {
    span: Span,
    depth: usize,
}

#[derive(Default)]
struct ScopeCollector {
    scopes: Vec<Scope>,
    depth: usize,
}

impl Visit for ScopeCollector {
    fn visit_script(&mut self, script: &Script) {
        self.scopes.push(Scope {
            span: script.span,
            depth: 0,
        });
        script.visit_children_with(self);
    }

    fn visit_block_stmt(&mut self, block: &BlockStmt) {
        self.depth += 1;
        self.scopes.push(Scope {
            span: block.span,
            depth: self.depth,
        });
        block.visit_children_with(self);
        self.depth -= 1;
    }
}

fn contains(outer: Span, inner: Span) -> bool {
    outer.lo <= inner.lo && inner.hi <= outer.hi
}

/// Index of the scope a comment at `span` belongs to: the smallest
/// containing range, then the deepest, then the first discovered. The
/// script always qualifies.
fn target_scope(scopes: &[Scope], span: Span) -> usize {
    scopes
        .iter()
        .enumerate()
        .filter(|(id, scope)| *id == 0 || contains(scope.span, span))
        .min_by_key(|(id, scope)| {
            (scope.span.hi.0 - scope.span.lo.0, Reverse(scope.depth), *id)
        })
        .map_or(0, |(id, _)| id)
}

/// The checker call a directive stands for, spanned to its comment
pub fn directive_statement(directive: &Directive, checker: &str) -> Stmt {
    let name = directive.kind.name();
    let arguments = match &directive.kind {
        DirectiveKind::Alias { definition, .. } => {
            vec![astgen::string(name), astgen::string(definition)]
        }
        DirectiveKind::Instance { .. } => vec![astgen::string(name), astgen::ident(name)],
        DirectiveKind::Adt { fields, .. } => {
            let fields: Map<String, Value> = fields
                .iter()
                .map(|(field, ty)| (field.clone(), Value::String(ty.clone())))
                .collect();
            vec![astgen::string(name), astgen::literal(&Value::Object(fields))]
        }
    };

    let callee = astgen::member(astgen::lookup(checker), directive.kind.method());
    Stmt::Expr(ExprStmt {
        span: directive.span,
        expr: Box::new(astgen::call(callee, arguments)),
    })
}

struct Inserter {
    /// Pending statements per scope, in source order
    pending: Vec<Vec<Stmt>>,
    next_block: usize,
}

impl Inserter {
    fn splice(&mut self, scope: usize, body: &mut Vec<Stmt>) {
        let Some(pending) = self.pending.get_mut(scope) else {
            return;
        };
        for stmt in std::mem::take(pending) {
            let start = stmt.span().lo;
            let index = body
                .iter()
                .position(|existing| existing.span().lo >= start)
                .unwrap_or(body.len());
            body.insert(index, stmt);
        }
    }
}

impl VisitMut for Inserter {
    fn visit_mut_script(&mut self, script: &mut Script) {
        script.visit_mut_children_with(self);
        self.splice(0, &mut script.body);
    }

    fn visit_mut_block_stmt(&mut self, block: &mut BlockStmt) {
        let id = self.next_block;
        self.next_block += 1;
        block.visit_mut_children_with(self);
        self.splice(id, &mut block.stmts);
    }
}

/// Insert a checker call for every directive into its enclosing scope
pub fn insert_directives(mut script: Script, directives: &[Directive], checker: &str) -> Script {
    if directives.is_empty() {
        return script;
    }

    let mut collector = ScopeCollector::default();
    script.visit_with(&mut collector);
    let scopes = collector.scopes;

    let mut pending = vec![Vec::new(); scopes.len()];
    let mut ordered: Vec<&Directive> = directives.iter().collect();
    ordered.sort_by_key(|directive| directive.span.lo);
    for directive in ordered {
        let scope = target_scope(&scopes, directive.span);
        debug!(
            directive = directive.kind.method(),
            name = directive.kind.name(),
            scope,
            "inserting directive"
        );
        pending[scope].push(directive_statement(directive, checker));
    }

    let mut inserter = Inserter {
        pending,
        next_block: 1,
    };
    script.visit_mut_with(&mut inserter);
    script
}
