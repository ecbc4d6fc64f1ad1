//! Mutation/instrumentation statistics (ambient logging stack, spec §7:
//! "non-fatal classes never abort the process; they increment
//! counters"). Not a global — owned by whatever hosts the fuzzer engine
//! and updated via `tracing` spans so the counters can be correlated
//! with structured log output.

use std::collections::HashMap;

use crate::external::ExecutionOutcome;
use crate::mutation::MutationOutcome;
use crate::mutation::runtime_assisted::InstrumentationOutcome;

#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub mutations_produced: u64,
    pub mutations_not_applicable: u64,
    pub mutations_failed: u64,
    pub instrumentation_outcomes: HashMap<&'static str, u64>,
    pub execution_outcomes: HashMap<&'static str, u64>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_mutation(&mut self, outcome: &MutationOutcome) {
        match outcome {
            MutationOutcome::Produced(_) => {
                self.mutations_produced += 1;
                tracing::debug!(target: "fuzzil_core::mutation", "mutation produced a new program");
            }
            MutationOutcome::NotApplicable => {
                self.mutations_not_applicable += 1;
                tracing::trace!(target: "fuzzil_core::mutation", "mutation not applicable");
            }
            MutationOutcome::Failed(err) => {
                self.mutations_failed += 1;
                tracing::debug!(target: "fuzzil_core::mutation", error = %err, "mutation failed");
            }
        }
    }

    pub fn record_instrumentation(&mut self, outcome: InstrumentationOutcome) {
        let key = outcome.as_str();
        *self.instrumentation_outcomes.entry(key).or_insert(0) += 1;
        tracing::debug!(target: "fuzzil_core::runtime_assisted", outcome = key, "instrumentation cycle complete");
    }

    pub fn record_execution(&mut self, outcome: ExecutionOutcome) {
        let key = match outcome {
            ExecutionOutcome::Succeeded => "succeeded",
            ExecutionOutcome::Failed(_) => "failed",
            ExecutionOutcome::TimedOut => "timed_out",
            ExecutionOutcome::Crashed(_) => "crashed",
        };
        *self.execution_outcomes.entry(key).or_insert(0) += 1;
        if matches!(outcome, ExecutionOutcome::Crashed(_)) {
            tracing::warn!(target: "fuzzil_core::executor", "target crashed");
        }
    }
}
