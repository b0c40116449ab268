//! Predecessor outputs exposed to a step, with strictness enforcement.

use crate::errors::UndeclaredDependencyError;
use std::collections::{HashMap, HashSet};

/// An immutable view of predecessor outputs.
///
/// The executor populates one per step invocation with the values of every
/// predecessor that succeeded along a taken edge. In strict mode, reading a
/// producer the step never declared raises an error.
#[derive(Debug, Clone, Default)]
pub struct StepInputs {
    /// Output value per succeeded predecessor.
    outputs: HashMap<String, serde_json::Value>,
    /// The full declared predecessor set (including skipped ones).
    declared: HashSet<String>,
    /// The consuming step, for error messages.
    step_name: String,
    /// Whether undeclared reads are rejected.
    strict: bool,
}

impl StepInputs {
    /// Creates new step inputs.
    #[must_use]
    pub fn new(
        outputs: HashMap<String, serde_json::Value>,
        declared: HashSet<String>,
        step_name: impl Into<String>,
        strict: bool,
    ) -> Self {
        Self {
            outputs,
            declared,
            step_name: step_name.into(),
            strict,
        }
    }

    /// Creates permissive inputs where every present output is readable.
    #[must_use]
    pub fn permissive(
        outputs: HashMap<String, serde_json::Value>,
        step_name: impl Into<String>,
    ) -> Self {
        Self {
            declared: outputs.keys().cloned().collect(),
            outputs,
            step_name: step_name.into(),
            strict: false,
        }
    }

    /// Gets the output of a predecessor.
    ///
    /// Returns `None` for a declared predecessor that produced no value
    /// (skipped, failed, or cut off by a branch decision).
    ///
    /// # Errors
    ///
    /// Returns `UndeclaredDependencyError` in strict mode when the producer
    /// was never declared as a predecessor.
    pub fn get(&self, producer: &str) -> Result<Option<&serde_json::Value>, UndeclaredDependencyError> {
        if self.strict && !self.declared.contains(producer) {
            return Err(UndeclaredDependencyError::new(&self.step_name, producer));
        }
        Ok(self.outputs.get(producer))
    }

    /// Gets the output of a predecessor without the strictness check.
    #[must_use]
    pub fn get_unchecked(&self, producer: &str) -> Option<&serde_json::Value> {
        self.outputs.get(producer)
    }

    /// Returns true if the predecessor produced a value.
    #[must_use]
    pub fn contains(&self, producer: &str) -> bool {
        self.outputs.contains_key(producer)
    }

    /// Returns the declared predecessor set.
    #[must_use]
    pub fn declared(&self) -> &HashSet<String> {
        &self.declared
    }

    /// Returns whether strict mode is enabled.
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Returns how many predecessors produced a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// Returns true if no predecessor produced a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}
