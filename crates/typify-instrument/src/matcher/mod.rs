//! Structural pattern matching over the AST
//!
//! Patterns are s-expressions compiled against a [`MatcherRegistry`]:
//!
//! - `?name` matches any present node and binds it to `name`; `?` matches
//!   anything, including an absent node
//! - `(?name pattern)` matches `pattern` and binds the node to `name`
//! - `(head args...)` invokes the registered matcher `head` with the
//!   compiled sub-patterns
//! - a bare symbol naming a registered matcher invokes it with no
//!   arguments; any other bare symbol matches an identifier of that name
//!
//! ```
//! use typify_instrument::matcher::{MatcherRegistry, NodeRef};
//!
//! let parsed = typify_parser::parse("function g() { return f(x); }").unwrap();
//! let function = parsed.script.body[0].as_decl().and_then(|d| d.as_fn_decl()).unwrap();
//! let body = function.function.body.as_ref().unwrap();
//! let pattern = MatcherRegistry::new().compile("(return (call f ?arg))").unwrap();
//! let bindings = pattern.matches(NodeRef::Stmt(&body.stmts[0])).unwrap();
//! assert!(bindings.get("arg").is_some());
//! ```

mod builtins;
mod sexpr;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use swc_core::ecma::ast::{Expr, Ident, Pat, Stmt, VarDecl, VarDeclarator};

use crate::PatternError;
use sexpr::SExpr;

/// A borrowed node of any kind a pattern can look at
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Stmt(&'a Stmt),
    Expr(&'a Expr),
    /// A declaration outside a statement list, such as a `for` head
    VarDecl(&'a VarDecl),
    Declarator(&'a VarDeclarator),
    Pat(&'a Pat),
    Ident(&'a Ident),
    /// A missing optional child, such as the argument of a bare `return`
    Absent,
}

impl<'a> NodeRef<'a> {
    pub fn is_absent(&self) -> bool {
        matches!(self, NodeRef::Absent)
    }

    pub fn as_stmt(&self) -> Option<&'a Stmt> {
        match self {
            NodeRef::Stmt(stmt) => Some(stmt),
            _ => None,
        }
    }

    pub fn as_expr(&self) -> Option<&'a Expr> {
        match self {
            NodeRef::Expr(expr) => Some(expr),
            _ => None,
        }
    }

    /// A variable declaration, whether a statement or a `for` head
    pub fn as_var_decl(&self) -> Option<&'a VarDecl> {
        match *self {
            NodeRef::Stmt(Stmt::Decl(decl)) => decl.as_var().map(|decl| &**decl),
            NodeRef::VarDecl(decl) => Some(decl),
            _ => None,
        }
    }

    pub fn as_declarator(&self) -> Option<&'a VarDeclarator> {
        match self {
            NodeRef::Declarator(declarator) => Some(declarator),
            _ => None,
        }
    }

    pub fn as_ident(&self) -> Option<&'a Ident> {
        match self {
            NodeRef::Ident(ident) => Some(ident),
            _ => None,
        }
    }

    /// Name of an identifier node, identifier expression or binding
    pub fn ident_name(&self) -> Option<&'a str> {
        match *self {
            NodeRef::Ident(ident) | NodeRef::Expr(Expr::Ident(ident)) => Some(&*ident.sym),
            NodeRef::Pat(Pat::Ident(binding)) => Some(&*binding.id.sym),
            _ => None,
        }
    }

    pub fn from_option_expr(expr: Option<&'a Expr>) -> Self {
        expr.map_or(NodeRef::Absent, NodeRef::Expr)
    }

    /// Identity comparison; two equal-looking nodes are still different
    pub fn same_node(&self, other: &NodeRef<'_>) -> bool {
        match (self, other) {
            (NodeRef::Stmt(a), NodeRef::Stmt(b)) => std::ptr::eq(*a, *b),
            (NodeRef::Expr(a), NodeRef::Expr(b)) => std::ptr::eq(*a, *b),
            (NodeRef::VarDecl(a), NodeRef::VarDecl(b)) => std::ptr::eq(*a, *b),
            (NodeRef::Declarator(a), NodeRef::Declarator(b)) => std::ptr::eq(*a, *b),
            (NodeRef::Pat(a), NodeRef::Pat(b)) => std::ptr::eq(*a, *b),
            (NodeRef::Ident(a), NodeRef::Ident(b)) => std::ptr::eq(*a, *b),
            (NodeRef::Absent, NodeRef::Absent) => true,
            _ => false,
        }
    }
}

/// Nodes captured by a successful match, in capture order
#[derive(Debug, Clone, Default)]
pub struct Bindings<'a> {
    nodes: IndexMap<String, NodeRef<'a>>,
}

impl<'a> Bindings<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(name: &str, node: NodeRef<'a>) -> Self {
        let mut bindings = Self::new();
        bindings.nodes.insert(name.to_string(), node);
        bindings
    }

    pub fn get(&self, name: &str) -> Option<NodeRef<'a>> {
        self.nodes.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeRef<'a>)> + '_ {
        self.nodes.iter().map(|(name, node)| (name.as_str(), *node))
    }

    /// Combine two binding sets; `None` if a name is bound to two
    /// different nodes
    pub fn merge(mut self, other: Bindings<'a>) -> Option<Self> {
        for (name, node) in other.nodes {
            match self.nodes.get(&name) {
                Some(existing) if !existing.same_node(&node) => return None,
                Some(_) => {}
                None => {
                    self.nodes.insert(name, node);
                }
            }
        }
        Some(self)
    }
}

type MatchFn = dyn for<'a> Fn(NodeRef<'a>) -> Option<Bindings<'a>> + Send + Sync;

/// A compiled pattern
#[derive(Clone)]
pub struct Matcher {
    inner: Arc<MatchFn>,
}

impl Matcher {
    pub fn new<F>(f: F) -> Self
    where
        F: for<'a> Fn(NodeRef<'a>) -> Option<Bindings<'a>> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Matches anything, binding nothing
    pub fn any() -> Self {
        Self::new(|_| Some(Bindings::new()))
    }

    /// Match `node`; `None` means no match. Never mutates the tree.
    pub fn matches<'a>(&self, node: NodeRef<'a>) -> Option<Bindings<'a>> {
        (self.inner)(node)
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Matcher")
    }
}

/// Match every `(matcher, node)` pair and merge the bindings
pub fn match_all<'m, 'a>(
    pairs: impl IntoIterator<Item = (&'m Matcher, NodeRef<'a>)>,
) -> Option<Bindings<'a>> {
    pairs
        .into_iter()
        .try_fold(Bindings::new(), |acc, (matcher, node)| {
            acc.merge(matcher.matches(node)?)
        })
}

type MatcherFactory = dyn Fn(Vec<Matcher>) -> Result<Matcher, PatternError> + Send + Sync;

/// Named matcher constructors used when compiling patterns
#[derive(Clone)]
pub struct MatcherRegistry {
    factories: HashMap<String, Arc<MatcherFactory>>,
}

impl Default for MatcherRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MatcherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("MatcherRegistry")
            .field("matchers", &names)
            .finish()
    }
}

impl MatcherRegistry {
    /// A registry with the built-in matchers
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        builtins::register(&mut registry);
        registry
    }

    /// Register (or replace) the matcher `name`. The factory receives the
    /// compiled sub-patterns of each use.
    pub fn add_matcher<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(Vec<Matcher>) -> Result<Matcher, PatternError> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn compile(&self, pattern: &str) -> Result<Matcher, PatternError> {
        let expr = sexpr::read(pattern)?;
        self.compile_expr(&expr)
    }

    fn compile_expr(&self, expr: &SExpr) -> Result<Matcher, PatternError> {
        match expr {
            SExpr::Symbol { name, .. } => self.compile_symbol(name),
            SExpr::List { items, offset } => {
                let Some((head, args)) = items.split_first() else {
                    return Err(PatternError::EmptyList { offset: *offset });
                };
                let SExpr::Symbol { name, .. } = head else {
                    return Err(PatternError::InvalidHead {
                        offset: head.offset(),
                    });
                };

                if let Some(binding) = name.strip_prefix('?') {
                    let [inner] = args else {
                        return Err(PatternError::Arity {
                            name: name.clone(),
                            expected: "1",
                            found: args.len(),
                        });
                    };
                    let inner = self.compile_expr(inner)?;
                    return Ok(bind(binding, inner));
                }

                let args = args
                    .iter()
                    .map(|arg| self.compile_expr(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                self.invoke(name, args)
            }
        }
    }

    fn compile_symbol(&self, name: &str) -> Result<Matcher, PatternError> {
        if name == "?" {
            return Ok(Matcher::any());
        }
        if let Some(binding) = name.strip_prefix('?') {
            let binding = binding.to_string();
            return Ok(Matcher::new(move |node| {
                (!node.is_absent()).then(|| Bindings::single(&binding, node))
            }));
        }
        if self.contains(name) {
            return self.invoke(name, Vec::new());
        }

        let expected = name.to_string();
        Ok(Matcher::new(move |node| {
            (node.ident_name() == Some(expected.as_str())).then(Bindings::new)
        }))
    }

    fn invoke(&self, name: &str, args: Vec<Matcher>) -> Result<Matcher, PatternError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| PatternError::UnknownMatcher {
                name: name.to_string(),
            })?;
        factory(args)
    }
}

/// Wrap `inner` so a successful match also binds the node to `name`
fn bind(name: &str, inner: Matcher) -> Matcher {
    if name.is_empty() {
        return inner;
    }
    let name = name.to_string();
    Matcher::new(move |node| {
        inner
            .matches(node)?
            .merge(Bindings::single(&name, node))
    })
}

/// Arity check for matcher factories
pub fn expect_at_most(
    name: &str,
    args: &[Matcher],
    max: usize,
    expected: &'static str,
) -> Result<(), PatternError> {
    if args.len() > max {
        return Err(PatternError::Arity {
            name: name.to_string(),
            expected,
            found: args.len(),
        });
    }
    Ok(())
}
