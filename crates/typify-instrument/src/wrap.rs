//! Function wrapping
//!
//! Annotated functions are handed to the runtime checker, which returns a
//! contract-enforcing replacement. Three shapes are recognized:
//!
//! - a function declaration, rewritten into a forwarding declaration that
//!   keeps the checked function in a property of itself, so hoisting keeps
//!   working and each evaluation of the declaration gets its own cache
//! - `var x = function ...`, whose initializer is wrapped in place, in a
//!   statement or in a `for` head
//! - `return function ...`, whose argument is wrapped in place
//!
//! Every recognized shape is counted in [`Stats`], annotated or not.

use swc_core::common::{BytePos, Spanned};
use swc_core::ecma::ast::{
    BinaryOp, Decl, Expr, FnDecl, FnExpr, ForStmt, Script, Stmt, VarDecl, VarDeclOrExpr,
};
use swc_core::ecma::visit::{VisitMut, VisitMutWith};
use tracing::trace;
use typify_parser::SourceContext;

use crate::astgen;
use crate::directive::find_signature;
use crate::matcher::{expect_at_most, match_all, Bindings, Matcher, MatcherRegistry, NodeRef};
use crate::{InstrumentConfig, PatternError, Stats};

/// A single declarator initialized with a function expression
pub const VAR_FUNCTION_PATTERN: &str = "(var! (var ?ident (?f fn-expr)))";

/// A return of a function expression
pub const RETURN_FUNCTION_PATTERN: &str = "(return (?f fn-expr))";

/// Register the matchers the wrapping patterns use:
///
/// - `(var! d...)` matches a `var`/`let`/`const` declaration with exactly one
///   declarator per sub-pattern, each matching its declarator
/// - `fn-expr` matches a function expression, parenthesized or not
pub fn register_extensions(registry: &mut MatcherRegistry) {
    registry.add_matcher("var!", |declarators| {
        Ok(Matcher::new(move |node| {
            let decl = node.as_var_decl()?;
            if decl.decls.len() != declarators.len() {
                return None;
            }
            match_all(
                declarators
                    .iter()
                    .zip(decl.decls.iter().map(NodeRef::Declarator)),
            )
        }))
    });

    registry.add_matcher("fn-expr", |args| {
        expect_at_most("fn-expr", &args, 0, "0")?;
        Ok(Matcher::new(|node| {
            function_expr(node.as_expr()?).map(|_| Bindings::new())
        }))
    });
}

/// Compiled wrapping patterns
#[derive(Debug, Clone)]
pub struct Patterns {
    var_function: Matcher,
    return_function: Matcher,
}

impl Patterns {
    /// Compile against `registry`, which must carry the extensions from
    /// [`register_extensions`]
    pub fn compile(registry: &MatcherRegistry) -> Result<Self, PatternError> {
        Ok(Self {
            var_function: registry.compile(VAR_FUNCTION_PATTERN)?,
            return_function: registry.compile(RETURN_FUNCTION_PATTERN)?,
        })
    }

    /// Compile against the built-in registry plus the extensions
    pub fn standard() -> Result<Self, PatternError> {
        let mut registry = MatcherRegistry::new();
        register_extensions(&mut registry);
        Self::compile(&registry)
    }
}

enum Shape {
    Declaration,
    /// Carries the declared variable's name
    VarFunction(String),
    ReturnFunction,
    Other,
}

struct Wrapper<'a> {
    context: &'a SourceContext,
    config: &'a InstrumentConfig,
    stats: &'a Stats,
    patterns: &'a Patterns,
}

impl Wrapper<'_> {
    fn classify(&self, node: NodeRef<'_>) -> Shape {
        if matches!(node.as_stmt(), Some(Stmt::Decl(Decl::Fn(_)))) {
            return Shape::Declaration;
        }
        if let Some(bindings) = self.patterns.var_function.matches(node) {
            if let Some(name) = bindings.get("ident").and_then(|node| node.ident_name()) {
                return Shape::VarFunction(name.to_string());
            }
        }
        if self.patterns.return_function.matches(node).is_some() {
            return Shape::ReturnFunction;
        }
        Shape::Other
    }

    /// Signature from the comments before the token at `pos`
    fn signature(&self, pos: BytePos) -> Option<String> {
        find_signature(&self.context.leading_comments(pos))
    }

    /// The checker entry point
    fn checker(&self) -> Expr {
        let binding = astgen::lookup(&self.config.checker);
        match &self.config.check_method {
            Some(method) => astgen::member(binding, method),
            None => binding,
        }
    }

    /// `<checker>("label", function)`
    fn check(&self, label: String, function: Expr) -> Expr {
        astgen::call(self.checker(), vec![astgen::string(&label), function])
    }

    /// ```js
    /// function f() {
    ///   f.__typify__ = f.__typify__ || checker("f :: S", function (p...) { body });
    ///   return f.__typify__.apply(this, arguments);
    /// }
    /// ```
    fn wrap_declaration(&self, decl: &mut FnDecl, signature: &str) {
        let name = decl.ident.sym.to_string();
        let label = format!("{name} :: {signature}");
        trace!(function = %name, "wrapping function declaration");

        let cache = || astgen::member(astgen::ident(&name), &self.config.cache_property);
        let span = decl.function.span;
        let original = std::mem::replace(
            &mut decl.function,
            astgen::function(Vec::new(), astgen::block(Vec::new())),
        );

        let fill = astgen::expr_stmt(astgen::assign(
            cache(),
            astgen::logical(
                BinaryOp::LogicalOr,
                cache(),
                self.check(label, astgen::anonymous(original)),
            ),
        ));
        let forward = astgen::return_stmt(Some(astgen::call(
            astgen::member(cache(), "apply"),
            vec![astgen::this(), astgen::ident("arguments")],
        )));

        let mut wrapper = astgen::function(Vec::new(), astgen::block(vec![fill, forward]));
        wrapper.span = span;
        decl.function = wrapper;
    }

    fn wrap_var(&self, decl: &mut VarDecl, name: &str, signature: Option<String>) {
        self.stats.var_function_expression.record(signature.is_some());
        let Some(signature) = signature else {
            return;
        };
        for declarator in &mut decl.decls {
            if let Some(init) = declarator.init.take() {
                let label = format!("{} :: {}", function_name(&init).unwrap_or(name), signature);
                trace!(%label, "wrapping function expression");
                declarator.init = Some(Box::new(self.check(label, *init)));
            }
        }
    }

    fn wrap_return(&self, argument: &mut Option<Box<Expr>>, signature: Option<String>) {
        self.stats.return_function_expression.record(signature.is_some());
        let Some(signature) = signature else {
            return;
        };
        let Some(function) = argument.take() else {
            return;
        };
        let label = match function_name(&function) {
            Some(name) => format!("{name} :: {signature}"),
            None => signature,
        };
        trace!(%label, "wrapping returned function");
        *argument = Some(Box::new(self.check(label, *function)));
    }
}

/// The function expression `expr` is, looking through parentheses
fn function_expr(mut expr: &Expr) -> Option<&FnExpr> {
    while let Expr::Paren(paren) = expr {
        expr = &paren.expr;
    }
    match expr {
        Expr::Fn(function) => Some(function),
        _ => None,
    }
}

fn function_name(expr: &Expr) -> Option<&str> {
    function_expr(expr)?.ident.as_ref().map(|ident| &*ident.sym)
}

impl VisitMut for Wrapper<'_> {
    /// Classify against the statement as written, instrument its children,
    /// then rewrite the statement itself
    fn visit_mut_stmt(&mut self, stmt: &mut Stmt) {
        let shape = self.classify(NodeRef::Stmt(stmt));
        let signature = match shape {
            Shape::Other => None,
            _ => self.signature(stmt.span().lo),
        };

        stmt.visit_mut_children_with(self);

        match (shape, stmt) {
            (Shape::Declaration, Stmt::Decl(Decl::Fn(decl))) => {
                self.stats.function_declaration.record(signature.is_some());
                if let Some(signature) = signature {
                    self.wrap_declaration(decl, &signature);
                }
            }
            (Shape::VarFunction(name), Stmt::Decl(Decl::Var(decl))) => {
                self.wrap_var(decl, &name, signature);
            }
            (Shape::ReturnFunction, Stmt::Return(ret)) => {
                self.wrap_return(&mut ret.arg, signature);
            }
            _ => {}
        }
    }

    fn visit_mut_for_stmt(&mut self, stmt: &mut ForStmt) {
        let head = match &stmt.init {
            Some(VarDeclOrExpr::VarDecl(decl)) => match self.classify(NodeRef::VarDecl(decl)) {
                Shape::VarFunction(name) => Some((name, self.signature(decl.span.lo))),
                _ => None,
            },
            _ => None,
        };

        stmt.visit_mut_children_with(self);

        if let (Some((name, signature)), Some(VarDeclOrExpr::VarDecl(decl))) =
            (head, &mut stmt.init)
        {
            self.wrap_var(decl, &name, signature);
        }
    }
}

/// Wrap every annotated function in `script`, counting what was seen
pub fn wrap_functions(
    mut script: Script,
    context: &SourceContext,
    config: &InstrumentConfig,
    stats: &Stats,
    patterns: &Patterns,
) -> Script {
    let mut wrapper = Wrapper {
        context,
        config,
        stats,
        patterns,
    };
    script.visit_mut_with(&mut wrapper);
    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use typify_codegen::{generate, GenerateOptions};

    fn run_with(source: &str, config: &InstrumentConfig) -> (String, Stats) {
        let parsed = typify_parser::parse(source).expect("source should parse");
        let stats = Stats::new();
        let patterns = Patterns::standard().expect("patterns compile");
        let script = wrap_functions(parsed.script, &parsed.context, config, &stats, &patterns);
        let code = generate(&script, &parsed.context, &GenerateOptions::default())
            .expect("generation succeeds")
            .code;
        (code, stats)
    }

    fn run(source: &str) -> (String, Stats) {
        run_with(source, &InstrumentConfig::default())
    }

    /// The text with all whitespace removed
    fn compact(code: &str) -> String {
        code.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_declaration_caches_on_itself() {
        let (output, stats) = run("// :: number -> number\nfunction f(x) {\n  return x + 1;\n}");
        assert_eq!(
            compact(&output),
            compact(
                "function f() {
                    f.__typify__ = f.__typify__ || global.__typify(\"f :: number -> number\", function(x) {
                        return x + 1;
                    });
                    return f.__typify__.apply(this, arguments);
                }"
            )
        );
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.function_declaration.total, 1);
        assert_eq!(snapshot.function_declaration.matched, 1);
    }

    #[test]
    fn test_declaration_in_loop_body_gets_a_cache_per_evaluation() {
        let source = "\
var out = [];
for (let i = 0; i < 3; i++) {
  // :: number -> number
  function f(x) { return x + i; }
  out.push(f(0));
}";
        let (output, stats) = run(source);
        let output = compact(&output);
        assert!(
            output.contains(
                "{functionf(){f.__typify__=f.__typify__||global.__typify(\"f::number->number\""
            ),
            "{output}"
        );
        // No shared binding outside the declaration
        assert_eq!(output.matches("__typify__").count(), 3);
        assert!(!output.contains("var__typify"), "{output}");
        assert!(output.ends_with("out.push(f(0));}"), "{output}");
        assert_eq!(stats.function_declaration.matched(), 1);
    }

    #[test]
    fn test_wrapped_declaration_keeps_async_and_generator_flags() {
        let (output, _) = run("// :: T\nasync function f() { await g(); }\n// :: U\nfunction* h() { yield 1; }");
        let output = compact(&output);
        assert!(output.contains("global.__typify(\"f::T\",asyncfunction(){awaitg();})"), "{output}");
        assert!(output.contains("global.__typify(\"h::U\",function*(){yield1;})"), "{output}");
    }

    #[test]
    fn test_unannotated_declaration_is_counted_only() {
        let source = "function f(x) {\n  return x + 1;\n}";
        let (output, stats) = run(source);
        assert_eq!(compact(&output), compact(source));
        assert_eq!(stats.function_declaration.total(), 1);
        assert_eq!(stats.function_declaration.matched(), 0);
    }

    #[test]
    fn test_var_function_expression() {
        let (output, stats) = run("// :: number -> number\nvar g = function (x) {\n  return x;\n};");
        assert_eq!(
            compact(&output),
            "varg=global.__typify(\"g::number->number\",function(x){returnx;});"
        );
        assert_eq!(stats.var_function_expression.matched(), 1);

        // A named expression labels itself
        let (output, _) = run("// :: a\nlet h = function inner() {};");
        assert_eq!(compact(&output), "leth=global.__typify(\"inner::a\",functioninner(){});");

        // Parentheses around the function are seen through
        let (output, _) = run("// :: a\nvar p = (function () {});");
        assert!(compact(&output).starts_with("varp=global.__typify(\"p::a\","), "{output}");
    }

    #[test]
    fn test_var_shapes_outside_the_pattern_are_not_counted() {
        let (_, stats) = run("// :: a\nvar a = function () {}, b = 1;\n// :: b\nvar c = 3;");
        assert_eq!(stats.var_function_expression.total(), 0);

        let (_, stats) = run("var d = function () {};");
        assert_eq!(stats.var_function_expression.total(), 1);
        assert_eq!(stats.var_function_expression.matched(), 0);
    }

    #[test]
    fn test_var_in_for_head_is_classified() {
        let (output, stats) = run("for (var f = function () {}; f; f = null) {}");
        assert_eq!(stats.var_function_expression.total(), 1);
        assert_eq!(stats.var_function_expression.matched(), 0);
        assert!(!output.contains("__typify"));

        let (output, stats) = run("for (/* :: -> T */ var f = function () {}; f; f = null) {}");
        assert_eq!(stats.var_function_expression.matched(), 1);
        assert!(
            compact(&output).starts_with("for(varf=global.__typify(\"f::->T\",function(){});"),
            "{output}"
        );
    }

    #[test]
    fn test_return_function_expression() {
        let source = "\
function make() {
  // :: string
  return function () {
    return \"a\";
  };
}";
        let (output, stats) = run(source);
        assert_eq!(
            compact(&output),
            "functionmake(){returnglobal.__typify(\"string\",function(){return\"a\";});}"
        );
        let snapshot = stats.snapshot();
        assert_eq!((snapshot.function_declaration.total, snapshot.function_declaration.matched), (1, 0));
        assert_eq!(
            (snapshot.return_function_expression.total, snapshot.return_function_expression.matched),
            (1, 1)
        );

        let (output, _) = run("function m() {\n  // :: T\n  return function named() {};\n}");
        assert!(compact(&output).contains("global.__typify(\"named::T\",functionnamed(){})"));
    }

    #[test]
    fn test_nested_declarations_cache_on_their_own_functions() {
        let source = "\
// :: A
function outer() {
  // :: B
  function inner() {}
  return inner;
}";
        let (output, stats) = run(source);
        let output = compact(&output);
        assert!(output.contains("outer.__typify__=outer.__typify__||"), "{output}");
        assert!(output.contains("inner.__typify__=inner.__typify__||"), "{output}");
        assert!(output.contains("\"outer::A\""));
        assert!(output.contains("\"inner::B\""));
        assert_eq!(stats.function_declaration.total(), 2);
        assert_eq!(stats.function_declaration.matched(), 2);
    }

    #[test]
    fn test_single_statement_position() {
        let (output, stats) = run("if (ready)\n  // :: T\n  var g = function () {};");
        assert_eq!(
            compact(&output),
            "if(ready)varg=global.__typify(\"g::T\",function(){});"
        );
        assert_eq!(stats.var_function_expression.matched(), 1);
    }

    #[test]
    fn test_check_method_and_custom_cache_property() {
        let config = InstrumentConfig {
            checker: "contracts".to_string(),
            check_method: Some("wrap".to_string()),
            cache_property: "$c".to_string(),
            ..InstrumentConfig::default()
        };
        let (output, _) = run_with("// :: T\nfunction f() {}", &config);
        let output = compact(&output);
        assert!(output.contains("f.$c=f.$c||contracts.wrap(\"f::T\",function(){})"), "{output}");
        assert!(output.contains("returnf.$c.apply(this,arguments);"), "{output}");
    }

    #[test]
    fn test_extension_matchers() {
        let mut registry = MatcherRegistry::new();
        register_extensions(&mut registry);
        let parsed = typify_parser::parse("var a = 1, b = function () {};").unwrap();
        let stmt = NodeRef::Stmt(&parsed.script.body[0]);

        assert!(registry.compile("(var! ? ?)").unwrap().matches(stmt).is_some());
        assert!(registry.compile("(var! ?)").unwrap().matches(stmt).is_none());

        let bindings = registry
            .compile("(var! (var a) (var ?name (?f fn-expr)))")
            .unwrap()
            .matches(stmt)
            .unwrap();
        assert_eq!(bindings.get("name").and_then(|n| n.ident_name()), Some("b"));
        assert!(bindings.get("f").and_then(|n| n.as_expr()).is_some());

        assert!(matches!(
            registry.compile("(fn-expr x)"),
            Err(PatternError::Arity { .. })
        ));
    }
}
