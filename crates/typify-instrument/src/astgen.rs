//! Constructors for synthesized nodes
//!
//! Every node built here carries [`DUMMY_SP`]; callers stamp a real span
//! where the output should map back to the source.

use serde_json::Value;
use swc_core::common::{SyntaxContext, DUMMY_SP};
use swc_core::ecma::ast::*;

/// A binding name
pub fn name(sym: &str) -> Ident {
    Ident::new(sym.into(), DUMMY_SP, SyntaxContext::empty())
}

pub fn ident(sym: &str) -> Expr {
    Expr::Ident(name(sym))
}

pub fn this() -> Expr {
    Expr::This(ThisExpr { span: DUMMY_SP })
}

/// `object.property`
pub fn member(object: Expr, property: &str) -> Expr {
    Expr::Member(MemberExpr {
        span: DUMMY_SP,
        obj: Box::new(object),
        prop: MemberProp::Ident(IdentName::new(property.into(), DUMMY_SP)),
    })
}

/// `a.b.c` from `"a.b.c"`
pub fn lookup(dotted: &str) -> Expr {
    let mut parts = dotted.split('.');
    let head = ident(parts.next().unwrap_or_default());
    parts.fold(head, member)
}

/// A JSON value as a literal expression; object keys keep their order
pub fn literal(value: &Value) -> Expr {
    match value {
        Value::Null => Expr::Lit(Lit::Null(Null { span: DUMMY_SP })),
        Value::Bool(value) => Expr::Lit(Lit::Bool(Bool {
            span: DUMMY_SP,
            value: *value,
        })),
        Value::Number(n) => number(n.as_f64().unwrap_or_default()),
        Value::String(s) => string(s),
        Value::Array(items) => Expr::Array(ArrayLit {
            span: DUMMY_SP,
            elems: items
                .iter()
                .map(|item| {
                    Some(ExprOrSpread {
                        spread: None,
                        expr: Box::new(literal(item)),
                    })
                })
                .collect(),
        }),
        Value::Object(entries) => Expr::Object(ObjectLit {
            span: DUMMY_SP,
            props: entries
                .iter()
                .map(|(key, value)| {
                    PropOrSpread::Prop(Box::new(Prop::KeyValue(KeyValueProp {
                        key: PropName::Str(str_lit(key)),
                        value: Box::new(literal(value)),
                    })))
                })
                .collect(),
        }),
    }
}

/// A numeric literal; negative values become a unary minus
fn number(value: f64) -> Expr {
    let lit = |value| {
        Expr::Lit(Lit::Num(Number {
            span: DUMMY_SP,
            value,
            raw: None,
        }))
    };
    if value.is_sign_negative() && value != 0.0 {
        Expr::Unary(UnaryExpr {
            span: DUMMY_SP,
            op: UnaryOp::Minus,
            arg: Box::new(lit(-value)),
        })
    } else {
        lit(value)
    }
}

fn str_lit(value: &str) -> Str {
    Str {
        span: DUMMY_SP,
        value: value.into(),
        raw: None,
    }
}

pub fn string(value: &str) -> Expr {
    Expr::Lit(Lit::Str(str_lit(value)))
}

pub fn call(callee: Expr, arguments: Vec<Expr>) -> Expr {
    Expr::Call(CallExpr {
        span: DUMMY_SP,
        ctxt: SyntaxContext::empty(),
        callee: Callee::Expr(Box::new(callee)),
        args: arguments
            .into_iter()
            .map(|expr| ExprOrSpread {
                spread: None,
                expr: Box::new(expr),
            })
            .collect(),
        type_args: None,
    })
}

pub fn expr_stmt(expression: Expr) -> Stmt {
    Stmt::Expr(ExprStmt {
        span: DUMMY_SP,
        expr: Box::new(expression),
    })
}

/// `function (params) { body }` without a name
pub fn function(params: Vec<Ident>, body: BlockStmt) -> Box<Function> {
    Box::new(Function {
        params: params
            .into_iter()
            .map(|id| Param {
                span: DUMMY_SP,
                decorators: Vec::new(),
                pat: Pat::Ident(id.into()),
            })
            .collect(),
        decorators: Vec::new(),
        span: DUMMY_SP,
        ctxt: SyntaxContext::empty(),
        body: Some(body),
        is_generator: false,
        is_async: false,
        type_params: None,
        return_type: None,
    })
}

/// An existing function as an anonymous function expression
pub fn anonymous(function: Box<Function>) -> Expr {
    Expr::Fn(FnExpr {
        ident: None,
        function,
    })
}

pub fn fn_decl(ident: Ident, function: Box<Function>) -> Stmt {
    Stmt::Decl(Decl::Fn(FnDecl {
        ident,
        declare: false,
        function,
    }))
}

pub fn block(stmts: Vec<Stmt>) -> BlockStmt {
    BlockStmt {
        span: DUMMY_SP,
        ctxt: SyntaxContext::empty(),
        stmts,
    }
}

pub fn return_stmt(argument: Option<Expr>) -> Stmt {
    Stmt::Return(ReturnStmt {
        span: DUMMY_SP,
        arg: argument.map(Box::new),
    })
}

/// `target = value`. Targets other than identifiers and members are
/// parenthesized.
pub fn assign(target: Expr, value: Expr) -> Expr {
    let left = match target {
        Expr::Member(member) => SimpleAssignTarget::Member(member),
        Expr::Ident(id) => SimpleAssignTarget::Ident(id.into()),
        other => SimpleAssignTarget::Paren(ParenExpr {
            span: DUMMY_SP,
            expr: Box::new(other),
        }),
    };
    Expr::Assign(AssignExpr {
        span: DUMMY_SP,
        op: AssignOp::Assign,
        left: AssignTarget::Simple(left),
        right: Box::new(value),
    })
}

/// `left || right`, `left && right` and the like
pub fn logical(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Bin(BinExpr {
        span: DUMMY_SP,
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}
