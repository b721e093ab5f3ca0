//! Evaluation strategies.
//!
//! One module per [`EvaluationStrategy`](codegym_domain::EvaluationStrategy):
//!
//! | module        | tag                | evaluates                            |
//! |---------------|--------------------|--------------------------------------|
//! | `compiled`    | `compiled-tests`   | WebAssembly text against a test module |
//! | `interpreted` | `interpreted-tests`| Rhai scripts against a test script   |
//! | `markup`      | `markup-rules`     | HTML against selector rules          |
//! | `stylesheet`  | `stylesheet-rules` | CSS against property rules           |
//!
//! Every validator builds its engine state per call and returns a `Verdict`.
//! The executing validators also return `RunnerError` for engine failures.

pub mod compiled;
pub mod interpreted;
pub mod markup;
pub mod stylesheet;
