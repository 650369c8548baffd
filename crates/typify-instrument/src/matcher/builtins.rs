//! Built-in matchers

use swc_core::ecma::ast::{Callee, Decl, Expr, Stmt};

use super::{expect_at_most, match_all, Bindings, Matcher, MatcherRegistry, NodeRef};
use crate::PatternError;

pub(super) fn register(registry: &mut MatcherRegistry) {
    registry.add_matcher("var", var);
    registry.add_matcher("return", return_stmt);
    registry.add_matcher("ident", ident);
    registry.add_matcher("expr", expr_stmt);
    registry.add_matcher("call", call);
    registry.add_matcher("function", function);
}

fn optional(args: Vec<Matcher>) -> Matcher {
    args.into_iter().next().unwrap_or_else(Matcher::any)
}

/// `(var id init)`: a variable declarator
fn var(args: Vec<Matcher>) -> Result<Matcher, PatternError> {
    expect_at_most("var", &args, 2, "at most 2")?;
    let mut args = args.into_iter();
    let id = args.next().unwrap_or_else(Matcher::any);
    let init = args.next().unwrap_or_else(Matcher::any);

    Ok(Matcher::new(move |node| {
        let declarator = node.as_declarator()?;
        match_all([
            (&id, NodeRef::Pat(&declarator.name)),
            (&init, NodeRef::from_option_expr(declarator.init.as_deref())),
        ])
    }))
}

/// `(return arg)`; `(return)` only matches a bare `return;`
fn return_stmt(args: Vec<Matcher>) -> Result<Matcher, PatternError> {
    expect_at_most("return", &args, 1, "at most 1")?;
    let argument = args.into_iter().next();

    Ok(Matcher::new(move |node| {
        let Stmt::Return(stmt) = node.as_stmt()? else {
            return None;
        };
        match &argument {
            Some(pattern) => pattern.matches(NodeRef::from_option_expr(stmt.arg.as_deref())),
            None => stmt.arg.is_none().then(Bindings::new),
        }
    }))
}

/// `(ident name)`: an identifier, optionally constrained further
fn ident(args: Vec<Matcher>) -> Result<Matcher, PatternError> {
    expect_at_most("ident", &args, 1, "at most 1")?;
    let name = optional(args);

    Ok(Matcher::new(move |node| {
        node.ident_name()?;
        name.matches(node)
    }))
}

/// `(expr e)`: an expression statement
fn expr_stmt(args: Vec<Matcher>) -> Result<Matcher, PatternError> {
    expect_at_most("expr", &args, 1, "at most 1")?;
    let inner = optional(args);

    Ok(Matcher::new(move |node| {
        let Stmt::Expr(stmt) = node.as_stmt()? else {
            return None;
        };
        inner.matches(NodeRef::Expr(&stmt.expr))
    }))
}

/// `(call callee args...)`: without argument patterns any argument list
/// matches; otherwise the counts must agree
fn call(args: Vec<Matcher>) -> Result<Matcher, PatternError> {
    let mut args = args.into_iter();
    let callee = args.next().unwrap_or_else(Matcher::any);
    let arguments: Vec<Matcher> = args.collect();

    Ok(Matcher::new(move |node| {
        let Expr::Call(call) = node.as_expr()? else {
            return None;
        };
        let Callee::Expr(target) = &call.callee else {
            return None;
        };
        let actual = &call.args;

        let bindings = callee.matches(NodeRef::Expr(target))?;
        if arguments.is_empty() {
            return Some(bindings);
        }
        if arguments.len() != actual.len() {
            return None;
        }
        bindings.merge(match_all(
            arguments
                .iter()
                .zip(actual.iter().map(|arg| NodeRef::Expr(&arg.expr))),
        )?)
    }))
}

/// `(function name)`: a function declaration
fn function(args: Vec<Matcher>) -> Result<Matcher, PatternError> {
    expect_at_most("function", &args, 1, "at most 1")?;
    let name = optional(args);

    Ok(Matcher::new(move |node| {
        let Stmt::Decl(Decl::Fn(function)) = node.as_stmt()? else {
            return None;
        };
        name.matches(NodeRef::Ident(&function.ident))
    }))
}
