//! End-to-end instrumentation of whole modules

use std::sync::Arc;

use typify_instrument::{InstrumentConfig, Instrumented, Instrumenter, Stats, StatsSnapshot};

const LIBRARY: &str = r#"
'use strict';

// typify: type Point = { x: number, y: number }

/* typify: adt Shape
     circle: number
     rect: Point
*/

// distance :: Point -> Point -> number
function distance(a, b) {
  var dx = a.x - b.x, dy = a.y - b.y;
  return Math.sqrt(dx * dx + dy * dy);
}

// :: number -> Shape
var circle = function (r) {
  return { circle: r };
};

function scaler(k) {
  // :: number -> number
  return function (x) {
    return x * k;
  };
}

module.exports = { distance: distance, circle: circle, scaler: scaler };
"#;

fn instrument_with(source: &str, config: InstrumentConfig) -> (Instrumented, StatsSnapshot) {
    let stats = Arc::new(Stats::new());
    let instrumenter = Instrumenter::new(config, stats.clone()).expect("patterns compile");
    let result = instrumenter
        .instrument(source, "library.js")
        .unwrap_or_else(|e| panic!("instrumentation failed: {e}"));
    (result, stats.snapshot())
}

fn instrument(source: &str) -> (Instrumented, StatsSnapshot) {
    instrument_with(source, InstrumentConfig::default())
}

/// The text with all whitespace removed
fn compact(code: &str) -> String {
    code.chars().filter(|c| !c.is_whitespace()).collect()
}

#[test]
fn unannotated_code_only_changes_formatting() {
    let source = "var add = function (a, b) { return a + b };\nfunction id(x) { return x }\n";
    let (result, stats) = instrument(source);

    assert_eq!(
        compact(&result.code),
        "varadd=function(a,b){returna+b;};functionid(x){returnx;}"
    );
    assert_eq!(stats.function_declaration.matched, 0);
    assert_eq!(stats.var_function_expression.matched, 0);
    assert_eq!(stats.return_function_expression.matched, 0);
    assert_eq!(stats.function_declaration.total, 1);
    assert_eq!(stats.var_function_expression.total, 1);
}

#[test]
fn signature_comment_decides_the_match() {
    let (annotated, stats) = instrument("// :: number -> number\nfunction f(x) { return x; }");
    assert!(annotated.code.contains("\"f :: number -> number\""));
    assert_eq!((stats.function_declaration.total, stats.function_declaration.matched), (1, 1));

    let (plain, stats) = instrument("function f(x) { return x; }");
    assert!(!plain.code.contains("__typify"));
    assert_eq!((stats.function_declaration.total, stats.function_declaration.matched), (1, 0));
}

#[test]
fn whole_module() {
    let (result, stats) = instrument(LIBRARY);
    let code = &result.code;

    assert!(
        code.starts_with("'use strict';\nglobal.__typify.alias(\"Point\", \"{ x: number, y: number }\");\n"),
        "{code}"
    );
    let flat = compact(code);
    assert!(flat.contains(
        "global.__typify.adt(\"Shape\",{\"circle\":\"number\",\"rect\":\"Point\"});functiondistance(){"
    ));
    assert!(code.contains("\"distance :: Point -> Point -> number\""));
    assert!(flat.contains("distance.__typify__=distance.__typify__||global.__typify("));
    assert!(code.contains("var circle = global.__typify(\"circle :: number -> Shape\", function("));
    assert!(code.contains("return global.__typify(\"number -> number\", function("));
    assert!(flat.ends_with("module.exports={distance:distance,circle:circle,scaler:scaler};"));
    assert!(result.warnings.is_empty());

    assert_eq!(
        stats.to_string(),
        "Function declarations: 1 / 2\nVar function expression: 1 / 1\nReturn function expression: 1 / 1"
    );
}

#[test]
fn output_reparses() {
    let (result, _) = instrument(LIBRARY);
    typify_parser::parse(&result.code)
        .unwrap_or_else(|e| panic!("instrumented output does not parse: {e}\n{}", result.code));
}

#[test]
fn reinstrumenting_output_does_not_fail() {
    let (first, _) = instrument(LIBRARY);
    let (second, stats) = instrument(&first.code);
    typify_parser::parse(&second.code).expect("second pass output parses");
    // Signature comments are gone after the first pass
    assert_eq!(stats.function_declaration.matched, 0);
}

#[test]
fn position_map_is_ordered_and_points_into_source() {
    let (result, _) = instrument(LIBRARY);
    let mappings = result.map.mappings();
    assert!(!mappings.is_empty());
    assert!(mappings.windows(2).all(|pair| pair[0].generated < pair[1].generated));
    assert!(mappings.iter().all(|m| m.original <= LIBRARY.len()));

    // The wrapped declaration's name maps back to the original one
    let generated = result.code.find("function distance()").unwrap() + "function ".len();
    let original = LIBRARY.find("function distance(").unwrap() + "function ".len();
    assert!(
        mappings.iter().any(|m| m.generated == generated && m.original == original),
        "{mappings:?}"
    );
}

#[test]
fn nested_directives_follow_their_block() {
    let source = r#"
function setup() {
  prepare();
  // typify: instance Widget
  if (enabled) {
    // typify: type Id = string
    // typify: type Key = Id
    register();
  }
}
"#;
    let (result, _) = instrument(source);
    assert_eq!(
        compact(&result.code),
        compact(
            "function setup() {
                prepare();
                global.__typify.instance(\"Widget\", Widget);
                if (enabled) {
                    global.__typify.alias(\"Id\", \"string\");
                    global.__typify.alias(\"Key\", \"Id\");
                    register();
                }
            }"
        )
    );
}

#[test]
fn checker_binding_is_configurable() {
    let config = InstrumentConfig {
        checker: "window.contracts".to_string(),
        check_method: Some("fn".to_string()),
        ..InstrumentConfig::default()
    };
    let (result, _) = instrument_with("// typify: instance T\n// :: T\nvar f = function () {};", config);
    assert_eq!(
        compact(&result.code),
        "window.contracts.instance(\"T\",T);varf=window.contracts.fn(\"f::T\",function(){});"
    );
}

#[test]
fn stats_accumulate_across_files() {
    let stats = Arc::new(Stats::new());
    let instrumenter = Instrumenter::new(InstrumentConfig::default(), stats.clone()).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let instrumenter = instrumenter.clone();
            std::thread::spawn(move || {
                let source = format!("// :: number\nfunction f{i}() {{ return {i}; }}");
                instrumenter.transform(&source, "thread.js").unwrap()
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(stats.function_declaration.total(), 4);
    assert_eq!(stats.function_declaration.matched(), 4);
}

#[test]
fn declarations_evaluated_repeatedly_keep_separate_caches() {
    let source = "\
var out = [];
for (let i = 0; i < 3; i++) {
  // :: number -> number
  function f(x) { return x + i; }
  out.push(f(0));
}
[10, 20].forEach(function (n) {
  // :: -> number
  function g() { return n; }
  out.push(g());
});
";
    let (result, stats) = instrument(source);
    let flat = compact(&result.code);
    assert!(flat.contains("functionf(){f.__typify__=f.__typify__||"), "{flat}");
    assert!(flat.contains("returnf.__typify__.apply(this,arguments);"), "{flat}");
    assert!(flat.contains("functiong(){g.__typify__=g.__typify__||"), "{flat}");
    // Nothing outside the declarations holds a checked function
    assert!(!flat.contains("var__typify"), "{flat}");
    assert_eq!((stats.function_declaration.total, stats.function_declaration.matched), (2, 2));
    assert_eq!(stats.return_function_expression.total, 0);
}

#[test]
fn string_escapes_and_number_forms_survive() {
    let source = r#"// :: -> string
function face() { return "\uD83D\uDE00" + '\uD800' + 010 + 0x1fffffffffffffffffff; }"#;
    let (result, _) = instrument(source);
    assert!(
        result.code.contains(r#""\uD83D\uDE00" + '\uD800' + 010 + 0x1fffffffffffffffffff"#),
        "{}",
        result.code
    );
}

#[test]
fn hashbang_survives() {
    let (result, _) = instrument("#!/usr/bin/env node\n// :: T\nvar main = function () {};");
    assert!(result.code.starts_with("#!/usr/bin/env node\nvar main = global.__typify("));
}
