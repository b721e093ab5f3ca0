//! Compiled-language validator (WebAssembly text).
//!
//! The submission and the test module are spliced into one module behind a
//! host prelude, compiled in memory with wasmtime and loaded into a fresh
//! store. The test code exports `run_tests: () -> ()` and reports each test
//! through the imported `host.report` function:
//!
//! ```text
//! (import "host" "report" (func $report (param name_ptr name_len passed msg_ptr msg_len)))
//! (import "host" "print"  (func $print  (param ptr len)))
//! (memory (export "memory") 1)
//! ```
//!
//! Pipeline: parse, compile, load, discover, invoke, collect. The first
//! failing stage decides the verdict.

use anyhow::anyhow;
use codegym_domain::{Criterion, CriterionUnit, ExerciseSpec, FailureKind, Verdict};
use tracing::debug;
use wasmtime::{
    Caller, Config, Engine, Extern, InstancePre, Linker, Module, Store, StoreLimits,
    StoreLimitsBuilder, Trap,
};

use crate::config::CompiledLimits;
use crate::error::{RunnerError, RunnerResult};
use crate::output::OutputBuffer;

/// Conventional test entry export.
pub const ENTRY_POINT: &str = "run_tests";

const HOST_MODULE: &str = "host";
const MAX_DIAGNOSTICS: usize = 10;

const PRELUDE: &str = r#"  (import "host" "report" (func $report (param i32 i32 i32 i32 i32)))
  (import "host" "print" (func $print (param i32 i32)))
  (memory (export "memory") 1)"#;

/// Per-call host state owned by the store.
struct HarnessState {
    results: Vec<Criterion>,
    output: OutputBuffer,
    limits: StoreLimits,
}

/// A compiled unit ready to be loaded and run.
struct Prepared {
    store: Store<HarnessState>,
    pre: InstancePre<HarnessState>,
}

enum Stage {
    Ready(Engine, Prepared),
    Done(Verdict),
}

/// Splice submission and tests into one module text.
pub fn translation_unit(submission: &str, tests: &str) -> String {
    format!("(module\n{PRELUDE}\n  ;; submission\n{submission}\n  ;; tests\n{tests}\n)\n")
}

/// Validate a WebAssembly text submission against the exercise's test module.
pub async fn validate(
    code: &str,
    spec: &ExerciseSpec,
    limits: &CompiledLimits,
) -> RunnerResult<Verdict> {
    let Some(test_source) = spec.test_source() else {
        return Ok(Verdict::configuration_invalid("no test module found"));
    };

    let unit = translation_unit(code, test_source);
    let build_limits = limits.clone();
    let (engine, prepared) =
        match tokio::task::spawn_blocking(move || prepare(&unit, &build_limits)).await?? {
            Stage::Ready(engine, prepared) => (engine, prepared),
            Stage::Done(verdict) => return Ok(verdict),
        };

    // Held across the await so a dropped or aborted call still stops the guest.
    let _interrupt = InterruptOnDrop(engine);
    let worker = tokio::task::spawn_blocking(move || invoke(prepared));
    match tokio::time::timeout(limits.timeout(), worker).await {
        Ok(joined) => Ok(joined?),
        Err(_) => Ok(time_limit_verdict(limits)),
    }
}

/// Bumps the engine epoch when dropped. The guest traps at its next epoch
/// check and the blocking worker exits.
struct InterruptOnDrop(Engine);

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        self.0.increment_epoch();
    }
}

fn prepare(unit: &str, limits: &CompiledLimits) -> RunnerResult<Stage> {
    let binary = match wat::parse_str(unit) {
        Ok(binary) => binary,
        Err(err) => return Ok(Stage::Done(compile_failure(vec![err.to_string()]))),
    };

    let mut config = Config::new();
    config.epoch_interruption(true);
    let engine = Engine::new(&config).map_err(|e| RunnerError::EngineSetup(e.to_string()))?;

    let module = match Module::from_binary(&engine, &binary) {
        Ok(module) => module,
        Err(err) => return Ok(Stage::Done(compile_failure(diagnostics(&err)))),
    };
    debug!(bytes = binary.len(), "module compiled");

    let linker = host_linker(&engine).map_err(|e| RunnerError::EngineSetup(e.to_string()))?;
    let pre = match linker.instantiate_pre(&module) {
        Ok(pre) => pre,
        Err(err) => return Ok(Stage::Done(compile_failure(diagnostics(&err)))),
    };

    let state = HarnessState {
        results: Vec::new(),
        output: OutputBuffer::new(limits.output_cap_bytes),
        limits: StoreLimitsBuilder::new()
            .memory_size(limits.memory_bytes)
            .instances(1)
            .build(),
    };
    let mut store = Store::new(&engine, state);
    store.limiter(|state| &mut state.limits);
    store.set_epoch_deadline(1);
    store.epoch_deadline_trap();

    Ok(Stage::Ready(engine, Prepared { store, pre }))
}

fn invoke(prepared: Prepared) -> Verdict {
    let Prepared { mut store, pre } = prepared;

    let outcome = pre.instantiate(&mut store).and_then(|instance| {
        match instance.get_typed_func::<(), ()>(&mut store, ENTRY_POINT) {
            Ok(entry) => entry.call(&mut store, ()).map(|()| true),
            Err(_) => Ok(false),
        }
    });

    let state = store.into_data();
    let output = state.output.finish();
    match outcome {
        Ok(true) => {
            debug!(results = state.results.len(), "test entry point returned");
            Verdict::from_criteria(state.results, CriterionUnit::Tests).with_output(output)
        }
        Ok(false) => Verdict::failure(
            FailureKind::Configuration,
            format!("Internal error: test entry point `{ENTRY_POINT}: () -> ()` not found."),
        ),
        Err(err) if matches!(err.downcast_ref::<Trap>(), Some(Trap::Interrupt)) => {
            Verdict::timed_out("Time limit exceeded. Check your code for infinite loops.")
                .with_output(output)
        }
        Err(err) => Verdict::failure(FailureKind::Submission, "Error while running your code.")
            .with_criterion(Criterion::fail(
                "execution",
                format!("Error: {}", err.root_cause()),
            ))
            .with_output(output),
    }
}

fn time_limit_verdict(limits: &CompiledLimits) -> Verdict {
    Verdict::timed_out("Time limit exceeded. Check your code for infinite loops.").with_criterion(
        Criterion::fail(
            "execution",
            format!("Execution exceeded {} ms.", limits.timeout_ms),
        ),
    )
}

fn host_linker(engine: &Engine) -> anyhow::Result<Linker<HarnessState>> {
    let mut linker = Linker::new(engine);
    linker.func_wrap(
        HOST_MODULE,
        "report",
        |mut caller: Caller<'_, HarnessState>,
         name_ptr: i32,
         name_len: i32,
         passed: i32,
         msg_ptr: i32,
         msg_len: i32|
         -> anyhow::Result<()> {
            let name = read_guest_str(&mut caller, name_ptr, name_len)?;
            let message = read_guest_str(&mut caller, msg_ptr, msg_len)?;
            caller
                .data_mut()
                .results
                .push(Criterion::new(name, passed != 0, message));
            Ok(())
        },
    )?;
    linker.func_wrap(
        HOST_MODULE,
        "print",
        |mut caller: Caller<'_, HarnessState>, ptr: i32, len: i32| -> anyhow::Result<()> {
            let text = read_guest_str(&mut caller, ptr, len)?;
            caller.data_mut().output.push(&text);
            Ok(())
        },
    )?;
    Ok(linker)
}

fn read_guest_str(
    caller: &mut Caller<'_, HarnessState>,
    ptr: i32,
    len: i32,
) -> anyhow::Result<String> {
    let memory = caller
        .get_export("memory")
        .and_then(Extern::into_memory)
        .ok_or_else(|| anyhow!("module does not export `memory`"))?;
    let start = usize::try_from(ptr).map_err(|_| anyhow!("negative string pointer {ptr}"))?;
    let len = usize::try_from(len).map_err(|_| anyhow!("negative string length {len}"))?;
    let bytes = start
        .checked_add(len)
        .and_then(|end| memory.data(&*caller).get(start..end))
        .ok_or_else(|| anyhow!("string at {start} (+{len} bytes) is out of bounds"))?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn diagnostics(err: &anyhow::Error) -> Vec<String> {
    let mut lines: Vec<String> = err.chain().map(|cause| cause.to_string()).collect();
    lines.dedup();
    lines
}

fn compile_failure(errors: Vec<String>) -> Verdict {
    let shown = errors
        .iter()
        .take(MAX_DIAGNOSTICS)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");
    Verdict::failure(
        FailureKind::Submission,
        "Compilation failed. Check your code for errors.",
    )
    .with_compile_diagnostics(errors.join("\n"))
    .with_criterion(Criterion::fail("compilation", format!("Errors found:\n{shown}")))
}
