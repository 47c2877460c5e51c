//! ASH-004: Run-scoped shared recipe context.
//!
//! One `RecipeContext` exists per run. Steps that declare `recipe_context`
//! get a mutable borrow of it; whatever they write stays visible to every
//! later step, including partial writes made before a step aborted.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// Metadata key: 1-based index of the step running or just completed.
pub const CURRENT_STEP: &str = "current_step";
/// Metadata key: number of steps in the recipe.
pub const STEP_COUNT: &str = "step_count";
/// Metadata key: attempt number of the current step.
pub const ATTEMPT: &str = "attempt";

/// Shared key-value state for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecipeContext {
    /// Free-form data passed between steps
    pub variables: IndexMap<String, Value>,

    /// Engine bookkeeping plus recipe-declared informational fields
    pub metadata: IndexMap<String, Value>,
}

impl RecipeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from seed variables, which must be a JSON object.
    pub fn from_seed(seed: &Value) -> Result<Self, String> {
        match seed {
            Value::Object(m) => Ok(Self {
                variables: m.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                metadata: IndexMap::new(),
            }),
            Value::Null => Ok(Self::new()),
            other => Err(format!("context variables must be an object, got {}", other)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.variables.insert(key.to_string(), value);
    }

    /// Copy recipe-declared metadata in without touching engine keys.
    pub fn seed_metadata(&mut self, declared: &IndexMap<String, Value>) {
        for (key, value) in declared {
            if is_engine_key(key) {
                continue;
            }
            self.metadata.insert(key.clone(), value.clone());
        }
    }

    /// Record the position marker for a step entering RUNNING.
    pub fn mark_position(&mut self, step: usize, step_count: usize, attempt: u32) {
        self.metadata.insert(CURRENT_STEP.to_string(), Value::from(step));
        self.metadata
            .insert(STEP_COUNT.to_string(), Value::from(step_count));
        self.metadata.insert(ATTEMPT.to_string(), Value::from(attempt));
    }

    /// 1-based index of the step running or just completed.
    pub fn current_step(&self) -> Option<usize> {
        self.metadata
            .get(CURRENT_STEP)
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
    }
}

fn is_engine_key(key: &str) -> bool {
    matches!(key, CURRENT_STEP | STEP_COUNT | ATTEMPT)
}
