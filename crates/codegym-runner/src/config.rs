//! Resource limits for validation calls.
//!
//! Limits are plain values carried by each `Dispatcher` and passed down to
//! the validators on every call. Nothing here is global or mutable.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RunnerError, RunnerResult};

const MB: usize = 1024 * 1024;

/// Limits for the compiled-language validator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompiledLimits {
    /// Wall-clock budget for the `run_tests` invocation (milliseconds).
    pub timeout_ms: u64,
    /// Maximum captured output (bytes) before truncation.
    pub output_cap_bytes: usize,
    /// Maximum guest linear memory (bytes).
    pub memory_bytes: usize,
}

impl Default for CompiledLimits {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            output_cap_bytes: 10 * 1024,
            memory_bytes: 50 * MB,
        }
    }
}

impl CompiledLimits {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Limits for the dynamic-language validator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterpreterLimits {
    /// Maximum interpreter operations per evaluation.
    pub max_operations: u64,
    /// Maximum function call depth.
    pub max_call_depth: usize,
    /// Wall-clock budget for the whole call (milliseconds).
    pub timeout_ms: u64,
    /// Heap ceiling (bytes), applied to strings, arrays and maps.
    pub heap_bytes: usize,
    /// Maximum captured output lines.
    pub max_output_lines: usize,
}

impl Default for InterpreterLimits {
    fn default() -> Self {
        Self {
            max_operations: 100_000,
            max_call_depth: 100,
            timeout_ms: 10_000,
            heap_bytes: 50 * MB,
            max_output_lines: 100,
        }
    }
}

impl InterpreterLimits {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// All limits applied by one dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineLimits {
    /// Outer deadline for any validator (milliseconds).
    pub outer_timeout_ms: u64,
    pub compiled: CompiledLimits,
    pub interpreted: InterpreterLimits,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            outer_timeout_ms: 30_000,
            compiled: CompiledLimits::default(),
            interpreted: InterpreterLimits::default(),
        }
    }
}

impl EngineLimits {
    pub fn outer_timeout(&self) -> Duration {
        Duration::from_millis(self.outer_timeout_ms)
    }

    /// Reject limits that would make every call fail or run unbounded.
    pub fn validate(&self) -> RunnerResult<()> {
        let zero = [
            ("outer_timeout_ms", self.outer_timeout_ms == 0),
            ("compiled.timeout_ms", self.compiled.timeout_ms == 0),
            ("compiled.output_cap_bytes", self.compiled.output_cap_bytes == 0),
            ("compiled.memory_bytes", self.compiled.memory_bytes == 0),
            ("interpreted.max_operations", self.interpreted.max_operations == 0),
            ("interpreted.max_call_depth", self.interpreted.max_call_depth == 0),
            ("interpreted.timeout_ms", self.interpreted.timeout_ms == 0),
            ("interpreted.heap_bytes", self.interpreted.heap_bytes == 0),
            ("interpreted.max_output_lines", self.interpreted.max_output_lines == 0),
        ];
        match zero.iter().find(|(_, is_zero)| *is_zero) {
            Some((name, _)) => Err(RunnerError::InvalidLimits(format!(
                "{name} must be greater than zero"
            ))),
            None => Ok(()),
        }
    }
}
