//! Dynamic-language validator (Rhai).
//!
//! Each call builds a fresh interpreter with operation, call-depth, size and
//! wall-clock ceilings, runs the submission, then the test script, then calls
//! the test script's `run_tests()` entry point. Limits are enforced by the
//! interpreter itself and surface synchronously as errors. The heap ceiling
//! bounds each value and also the values live in scope at every variable read.
//!
//! The entry point returns an array of object maps:
//!
//! ```text
//! fn run_tests() {
//!     [ #{ name: "adds", pass: add(2, 3) == 5, message: "2 + 3 = 5" } ]
//! }
//! ```

use std::sync::{Arc, Mutex};
use std::time::Instant;

use codegym_domain::{Criterion, CriterionUnit, ExerciseSpec, FailureKind, Verdict};
use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, Map, Position, Scope};
use tracing::debug;

use crate::config::InterpreterLimits;
use crate::error::RunnerResult;
use crate::output::LineSink;

/// Conventional zero-argument test entry function.
pub const ENTRY_POINT: &str = "run_tests";

/// Bytes accounted per array/map element when deriving size ceilings from
/// the heap ceiling.
const SLOT_BYTES: usize = 16;

/// Containers nested deeper than this are charged one slot each.
const MAX_CHARGE_DEPTH: usize = 32;

/// Validate a script submission against the exercise's test script.
pub async fn validate(
    code: &str,
    spec: &ExerciseSpec,
    limits: &InterpreterLimits,
) -> RunnerResult<Verdict> {
    let Some(test_source) = spec.test_source() else {
        return Ok(Verdict::configuration_invalid("no test script found"));
    };

    let code = code.to_string();
    let tests = test_source.to_string();
    let limits = limits.clone();
    let verdict = tokio::task::spawn_blocking(move || run(&code, &tests, &limits)).await?;
    Ok(verdict)
}

fn build_engine(limits: &InterpreterLimits, sink: &Arc<Mutex<LineSink>>) -> Engine {
    let mut engine = Engine::new();
    let element_cap = (limits.heap_bytes / SLOT_BYTES).max(1);
    engine
        .set_max_operations(limits.max_operations)
        .set_max_call_levels(limits.max_call_depth)
        .set_max_string_size(limits.heap_bytes)
        .set_max_array_size(element_cap)
        .set_max_map_size(element_cap);
    engine.disable_symbol("eval");

    let heap_bytes = limits.heap_bytes;
    engine.on_var(move |_name, _index, context| {
        let mut budget = heap_bytes;
        let fits = context
            .scope()
            .iter_raw()
            .all(|(_, _, value)| charge(value, &mut budget, 0));
        if fits {
            Ok(None)
        } else {
            Err(EvalAltResult::ErrorDataTooLarge("Live data".into(), Position::NONE).into())
        }
    });

    let deadline = Instant::now() + limits.timeout();
    engine.on_progress(move |_| (Instant::now() >= deadline).then_some(Dynamic::UNIT));

    let print_sink = Arc::clone(sink);
    engine.on_print(move |text| {
        if let Ok(mut sink) = print_sink.lock() {
            sink.push_line(text);
        }
    });
    let debug_sink = Arc::clone(sink);
    engine.on_debug(move |text, _source, _pos| {
        if let Ok(mut sink) = debug_sink.lock() {
            sink.push_line(text);
        }
    });
    engine
}

/// Deduct the approximate size of `value` from `budget`. Returns false as
/// soon as the budget is exhausted.
fn charge(value: &Dynamic, budget: &mut usize, depth: usize) -> bool {
    let own = if let Ok(s) = value.as_immutable_string_ref() {
        s.len()
    } else if let Ok(blob) = value.as_blob_ref() {
        blob.len()
    } else {
        0
    };
    let Some(rest) = budget.checked_sub(SLOT_BYTES + own) else {
        return false;
    };
    *budget = rest;
    if depth >= MAX_CHARGE_DEPTH {
        return true;
    }

    if let Ok(items) = value.as_array_ref() {
        return items.iter().all(|item| charge(item, budget, depth + 1));
    }
    if let Ok(map) = value.as_map_ref() {
        return map.iter().all(|(key, item)| match budget.checked_sub(key.len()) {
            Some(rest) => {
                *budget = rest;
                charge(item, budget, depth + 1)
            }
            None => false,
        });
    }
    true
}

fn run(code: &str, tests: &str, limits: &InterpreterLimits) -> Verdict {
    let sink = Arc::new(Mutex::new(LineSink::new(limits.max_output_lines)));
    let engine = build_engine(limits, &sink);
    let output = || sink.lock().ok().and_then(|sink| sink.joined());
    let mut scope = Scope::new();

    let submission = match engine.compile(code) {
        Ok(ast) => ast,
        Err(err) => return submission_failed(&err.to_string()).with_output(output()),
    };
    if let Err(err) = engine.run_ast_with_scope(&mut scope, &submission) {
        let verdict = limit_verdict(&err, limits, "submission execution")
            .unwrap_or_else(|| submission_failed(&err.to_string()));
        return verdict.with_output(output());
    }
    debug!("submission script ran");

    let test_ast = match engine.compile(tests) {
        Ok(ast) => ast,
        Err(err) => return test_script_failed(&err.to_string()).with_output(output()),
    };
    // Test functions resolve against the submission's functions.
    let harness = submission.clone_functions_only().merge(&test_ast);
    if let Err(err) = engine.run_ast_with_scope(&mut scope, &harness) {
        let verdict = limit_verdict(&err, limits, "tests")
            .unwrap_or_else(|| test_script_failed(&err.to_string()));
        return verdict.with_output(output());
    }

    let options = CallFnOptions::new().eval_ast(false);
    let value = match engine.call_fn_with_options::<Dynamic>(
        options,
        &mut scope,
        &harness,
        ENTRY_POINT,
        (),
    ) {
        Ok(value) => value,
        Err(err) if is_missing_entry(&err) => {
            return Verdict::failure(
                FailureKind::Configuration,
                format!("Internal error: test entry point `{ENTRY_POINT}()` not found."),
            )
            .with_output(output());
        }
        Err(err) => {
            let verdict = limit_verdict(&err, limits, "test execution").unwrap_or_else(|| {
                Verdict::failure(FailureKind::Submission, "Error while running the tests.")
                    .with_criterion(Criterion::fail("test execution", err.to_string()))
            });
            return verdict.with_output(output());
        }
    };

    let criteria = collect_results(value);
    debug!(results = criteria.len(), "test entry point returned");
    Verdict::from_criteria(criteria, CriterionUnit::Tests).with_output(output())
}

fn submission_failed(error: &str) -> Verdict {
    Verdict::failure(FailureKind::Submission, "Error in your script.")
        .with_compile_diagnostics(error)
        .with_criterion(Criterion::fail(
            "submission execution",
            format!("Error: {error}"),
        ))
}

fn test_script_failed(error: &str) -> Verdict {
    Verdict::failure(
        FailureKind::Configuration,
        "Internal error in the exercise tests.",
    )
    .with_criterion(Criterion::fail("tests", format!("Test script error: {error}")))
}

fn innermost(err: &EvalAltResult) -> &EvalAltResult {
    match err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _)
        | EvalAltResult::ErrorInModule(_, inner, _) => innermost(inner),
        other => other,
    }
}

fn is_missing_entry(err: &EvalAltResult) -> bool {
    matches!(err, EvalAltResult::ErrorFunctionNotFound(signature, _) if signature.starts_with(ENTRY_POINT))
}

/// Map interpreter ceiling violations to their own verdicts.
fn limit_verdict(err: &EvalAltResult, limits: &InterpreterLimits, phase: &str) -> Option<Verdict> {
    let (verdict, detail) = match innermost(err) {
        EvalAltResult::ErrorTerminated(..) => (
            Verdict::timed_out("Time limit exceeded. Check for infinite loops."),
            format!("Execution exceeded {} ms.", limits.timeout_ms),
        ),
        EvalAltResult::ErrorTooManyOperations(..) => (
            Verdict::timed_out("Execution step limit exceeded. Check for infinite loops."),
            format!("Execution exceeded {} operations.", limits.max_operations),
        ),
        EvalAltResult::ErrorDataTooLarge(what, _) => (
            Verdict::failure(
                FailureKind::ResourceLimit,
                "Memory limit exceeded. Your code is using too much memory.",
            ),
            format!("{what} exceeded the {} byte heap ceiling.", limits.heap_bytes),
        ),
        EvalAltResult::ErrorStackOverflow(..) => (
            Verdict::failure(
                FailureKind::ResourceLimit,
                "Recursion limit exceeded. Check your base case.",
            ),
            format!("Call depth exceeded {}.", limits.max_call_depth),
        ),
        _ => return None,
    };
    Some(verdict.with_criterion(Criterion::fail(phase, detail)))
}

fn collect_results(value: Dynamic) -> Vec<Criterion> {
    let Ok(items) = value.into_array() else {
        return Vec::new();
    };
    let mut criteria = Vec::with_capacity(items.len());
    for item in items {
        let Some(map) = item.try_cast::<Map>() else {
            continue;
        };
        let passed = map
            .get("pass")
            .or_else(|| map.get("passed"))
            .and_then(|v| v.as_bool().ok())
            .unwrap_or(false);
        let message = map.get("message").map(text).unwrap_or_default();
        // Unnamed results are numbered among the results kept.
        let name = map
            .get("name")
            .map(text)
            .unwrap_or_else(|| format!("Test {}", criteria.len() + 1));
        criteria.push(Criterion::new(name, passed, message));
    }
    criteria
}

fn text(value: &Dynamic) -> String {
    value
        .clone()
        .into_string()
        .unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegym_domain::EvaluationStrategy;

    const ADD_TESTS: &str = r#"
        fn run_tests() {
            [
                #{ name: "adds", pass: add(2, 3) == 5, message: "2 + 3 = 5" },
                #{ passed: add(-1, 1) == 0, message: "-1 + 1 = 0" }
            ]
        }
    "#;

    fn spec(tests: &str) -> ExerciseSpec {
        ExerciseSpec::with_tests("rhai-test", EvaluationStrategy::InterpretedTests, tests)
    }

    fn quick_limits() -> InterpreterLimits {
        InterpreterLimits {
            timeout_ms: 2_000,
            ..InterpreterLimits::default()
        }
    }

    #[tokio::test]
    async fn test_passing_submission() {
        let v = validate("fn add(a, b) { a + b }", &spec(ADD_TESTS), &quick_limits())
            .await
            .unwrap();
        assert!(v.success, "{v:?}");
        assert_eq!(v.criteria.len(), 2);
        assert_eq!(v.criteria[0].name, "adds");
        assert_eq!(v.criteria[1].name, "Test 2");
        assert_eq!(v.summary, "All 2 test(s) passed!");
    }

    #[tokio::test]
    async fn test_failing_submission_keeps_order() {
        let v = validate("fn add(a, b) { a * b }", &spec(ADD_TESTS), &quick_limits())
            .await
            .unwrap();
        assert!(!v.success);
        assert!(!v.criteria[0].passed);
        assert!(!v.criteria[1].passed);
        assert_eq!(v.summary, "0 of 2 test(s) passed.");
    }

    #[tokio::test]
    async fn test_syntax_error_is_submission_failure() {
        let tests = r#"print("tests ran"); fn run_tests() { [] }"#;
        let v = validate("fn add(a, b) { a + }", &spec(tests), &quick_limits())
            .await
            .unwrap();
        assert!(!v.success);
        assert!(v.compile_diagnostics.is_some());
        assert_eq!(v.criteria.len(), 1);
        assert_eq!(v.criteria[0].name, "submission execution");
        assert_eq!(v.failure, Some(FailureKind::Submission));
        assert!(v.captured_output.is_none());
    }

    #[tokio::test]
    async fn test_runtime_error_stops_before_tests() {
        let tests = r#"print("tests ran"); fn run_tests() { [] }"#;
        let v = validate(r#"print("before"); throw "boom";"#, &spec(tests), &quick_limits())
            .await
            .unwrap();
        assert_eq!(v.criteria[0].name, "submission execution");
        assert!(v.compile_diagnostics.unwrap().contains("boom"));
        assert_eq!(v.captured_output.as_deref(), Some("before"));
    }

    #[tokio::test]
    async fn test_broken_test_script_is_configuration_error() {
        let v = validate("fn add(a, b) { a + b }", &spec("fn run_tests( {"), &quick_limits())
            .await
            .unwrap();
        assert!(!v.success);
        assert_eq!(v.failure, Some(FailureKind::Configuration));
        assert!(v.summary.contains("exercise tests"));
        assert_ne!(v.criteria[0].name, "submission execution");
    }

    #[tokio::test]
    async fn test_missing_entry_point() {
        let v = validate("let x = 1;", &spec("fn helper() { [] }"), &quick_limits())
            .await
            .unwrap();
        assert_eq!(v.failure, Some(FailureKind::Configuration));
        assert!(v.summary.contains("run_tests"));
        assert!(v.criteria.is_empty());
    }

    #[tokio::test]
    async fn test_missing_entry_point_keeps_output() {
        let tests = r#"print("loaded tests"); fn helper() { [] }"#;
        let v = validate(r#"print("hello");"#, &spec(tests), &quick_limits())
            .await
            .unwrap();
        assert_eq!(v.failure, Some(FailureKind::Configuration));
        assert_eq!(v.captured_output.as_deref(), Some("hello\nloaded tests"));
    }

    #[tokio::test]
    async fn test_empty_results_is_failure() {
        let v = validate("let x = 1;", &spec("fn run_tests() { [] }"), &quick_limits())
            .await
            .unwrap();
        assert!(!v.success);
        assert!(v.criteria.is_empty());
        assert!(v.summary.contains("no results"));
    }

    #[tokio::test]
    async fn test_non_map_items_are_skipped() {
        let tests = r#"fn run_tests() { [42, #{ pass: true, message: "ok" }, #{ pass: true }] }"#;
        let v = validate("let x = 1;", &spec(tests), &quick_limits()).await.unwrap();
        assert_eq!(v.criteria.len(), 2);
        assert_eq!(v.criteria[0].name, "Test 1");
        assert_eq!(v.criteria[1].name, "Test 2");
        assert!(v.success);
    }

    #[tokio::test]
    async fn test_error_inside_entry_is_test_execution_failure() {
        let tests = r#"fn run_tests() { [#{ pass: missing_fn(1), message: "" }] }"#;
        let v = validate("let x = 1;", &spec(tests), &quick_limits()).await.unwrap();
        assert!(!v.success);
        assert_eq!(v.criteria[0].name, "test execution");
        assert_eq!(v.failure, Some(FailureKind::Submission));
    }

    #[tokio::test]
    async fn test_tight_loop_hits_operation_ceiling() {
        let v = validate("let x = 0; loop { x += 1; }", &spec(ADD_TESTS), &quick_limits())
            .await
            .unwrap();
        assert!(v.timed_out);
        assert!(!v.success);
        assert_eq!(v.failure, Some(FailureKind::ResourceLimit));
    }

    #[tokio::test]
    async fn test_wall_clock_ceiling() {
        let limits = InterpreterLimits {
            max_operations: u64::MAX,
            timeout_ms: 200,
            ..InterpreterLimits::default()
        };
        let started = Instant::now();
        let v = validate("loop { }", &spec(ADD_TESTS), &limits).await.unwrap();
        assert!(v.timed_out);
        assert!(v.criteria[0].message.contains("200 ms"));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_recursion_ceiling() {
        let v = validate("fn f(n) { f(n + 1) } f(0);", &spec(ADD_TESTS), &quick_limits())
            .await
            .unwrap();
        assert!(!v.timed_out);
        assert_eq!(v.failure, Some(FailureKind::ResourceLimit));
        assert!(v.summary.contains("Recursion"));
    }

    #[tokio::test]
    async fn test_heap_ceiling() {
        let limits = InterpreterLimits {
            heap_bytes: 1024,
            ..quick_limits()
        };
        let v = validate(r#"let s = "x"; loop { s += s; }"#, &spec(ADD_TESTS), &limits)
            .await
            .unwrap();
        assert!(!v.timed_out);
        assert!(v.summary.contains("Memory limit"));
    }

    #[tokio::test]
    async fn test_heap_ceiling_counts_all_live_values() {
        let limits = InterpreterLimits {
            heap_bytes: 1024,
            ..quick_limits()
        };
        // Each string is well under the ceiling; together they are not.
        let code = r#"
            let base = "";
            for i in 0..200 { base += "x"; }
            let a = base + "1";
            let b = base + "2";
            let c = base + "3";
            let d = base + "4";
            let e = base + "5";
            let f = base + "6";
            let g = base + "7";
            let h = base + "8";
        "#;
        let v = validate(code, &spec(ADD_TESTS), &limits).await.unwrap();
        assert!(!v.timed_out);
        assert_eq!(v.failure, Some(FailureKind::ResourceLimit));
        assert!(v.summary.contains("Memory limit"));
        assert!(v.criteria[0].message.contains("Live data"));
    }

    #[test]
    fn test_charge_walks_nested_containers() {
        let mut map = Map::new();
        map.insert("k".into(), Dynamic::from("abcd".to_string()));
        let nested = Dynamic::from_array(vec![Dynamic::from(1_i64), Dynamic::from_map(map)]);

        let mut budget = 1_000;
        assert!(charge(&nested, &mut budget, 0));
        // array slot, int slot, map slot, key byte, string slot + 4 bytes
        assert_eq!(budget, 1_000 - (SLOT_BYTES * 4 + 1 + 4));

        let mut tight = SLOT_BYTES * 2;
        assert!(!charge(&nested, &mut tight, 0));
    }

    #[tokio::test]
    async fn test_output_capped_at_line_limit() {
        let limits = InterpreterLimits {
            max_output_lines: 3,
            ..quick_limits()
        };
        let code = "fn add(a, b) { a + b } for i in 0..10 { print(i); }";
        let v = validate(code, &spec(ADD_TESTS), &limits).await.unwrap();
        assert_eq!(v.captured_output.as_deref(), Some("0\n1\n2"));
    }

    #[tokio::test]
    async fn test_top_level_submission_variables_visible_to_test_script() {
        let tests = r#"
            let expected = greeting;
            fn run_tests() { [#{ pass: true, message: "ran" }] }
        "#;
        let v = validate(r#"let greeting = "hi";"#, &spec(tests), &quick_limits())
            .await
            .unwrap();
        assert!(v.success, "{v:?}");
    }
}
