//! ASH-001: Recipe, step, run report, and journal event types.
//!
//! The canonical in-memory form every schema version normalizes into, plus
//! the records the executor produces. Document-facing types derive
//! Serialize so they can be journaled and rendered back to JSON.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Schema version every recipe is normalized to.
pub const CURRENT_VERSION: &str = "1.1";

/// Known schema versions: (version, description, features).
pub const VERSION_HISTORY: &[(&str, &str, &[&str])] = &[
    (
        "1.0",
        "Original format (array-based)",
        &["basic_steps", "function_calls", "prompt_for"],
    ),
    (
        "1.1",
        "Recipe context support + flat step format",
        &[
            "basic_steps",
            "function_calls",
            "prompt_for",
            "recipe_context",
            "flat_format",
        ],
    ),
];

// ============================================================================
// Recipe
// ============================================================================

/// A normalized recipe. Immutable once produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    /// Always [`CURRENT_VERSION`] after normalization
    pub version: String,

    /// Display title (may be empty)
    pub title: String,

    /// Display description (may be empty)
    pub description: String,

    /// Color hints and unknown top-level properties, opaque to the engine
    pub display_options: IndexMap<String, Value>,

    /// Recipe-declared informational fields, seeded into the run context
    pub metadata: IndexMap<String, Value>,

    /// Ordered steps (1-indexed for display)
    pub steps: Vec<Step>,
}

impl Recipe {
    /// Title for display, falling back when the recipe declares none.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "Untitled Recipe"
        } else {
            &self.title
        }
    }
}

/// One unit of guided action.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Step {
    /// Human-readable instruction
    pub statement: String,

    /// Callable to invoke; `None` for a text-only step
    pub function_name: Option<String>,

    /// Literal arguments supplied by the recipe
    pub call_params: IndexMap<String, Value>,

    /// Arguments collected from the user, in prompt order
    pub prompt_for: IndexMap<String, String>,
}

impl Step {
    /// A text-only step with just a statement.
    pub fn text(statement: &str) -> Self {
        Self {
            statement: statement.to_string(),
            ..Self::default()
        }
    }

    pub fn is_text_only(&self) -> bool {
        self.function_name.is_none()
    }
}

/// Document shapes the normalizer accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaShape {
    /// v1.0: `[metadata, step, step, ...]`
    LegacyArray,
    /// v1.1: `{"version": "1.1", "step1": {...}, ...}`
    FlatObject,
    /// early v1.1: `{"version": "1.1", "steps": [...]}`
    NestedSteps,
}

impl SchemaShape {
    /// Schema version tag the shape corresponds to.
    pub fn version(&self) -> &'static str {
        match self {
            Self::LegacyArray => "1.0",
            Self::FlatObject | Self::NestedSteps => "1.1",
        }
    }

    /// Whether documents of this shape get rewritten to canonical form.
    pub fn is_legacy(&self) -> bool {
        !matches!(self, Self::FlatObject)
    }
}

impl fmt::Display for SchemaShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LegacyArray => write!(f, "v1.0 (array)"),
            Self::FlatObject => write!(f, "v1.1"),
            Self::NestedSteps => write!(f, "v1.1 (steps array)"),
        }
    }
}

// ============================================================================
// Run report
// ============================================================================

/// Terminal outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Skipped,
    Aborted,
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Skipped => write!(f, "SKIPPED"),
            Self::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// Per-step record kept by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    /// 1-based step index
    pub index: usize,
    pub outcome: StepOutcome,
    /// Number of times the step entered RUNNING
    pub attempts: u32,
}

/// Overall result reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Aborted {
        step_index: usize,
        statement: String,
        reason: String,
    },
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "COMPLETED"),
            Self::Aborted {
                step_index,
                statement,
                reason,
            } => write!(
                f,
                "ABORTED at step {} ({}): {}",
                step_index, statement, reason
            ),
        }
    }
}

/// Result of a whole run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub status: RunStatus,
    pub steps: Vec<StepRecord>,
    pub total_duration: std::time::Duration,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Count of steps that ended with the given outcome.
    pub fn count(&self, outcome: &StepOutcome) -> usize {
        self.steps.iter().filter(|s| &s.outcome == outcome).count()
    }
}

// ============================================================================
// Journal events
// ============================================================================

/// Event for the JSONL run journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        recipe: String,
        run_id: String,
        step_count: usize,
        ash_version: String,
    },
    StepStarted {
        run_id: String,
        step: usize,
        attempt: u32,
    },
    StepSucceeded {
        run_id: String,
        step: usize,
        attempts: u32,
        duration_seconds: f64,
    },
    StepRetried {
        run_id: String,
        step: usize,
        attempt: u32,
    },
    StepSkipped {
        run_id: String,
        step: usize,
    },
    StepAborted {
        run_id: String,
        step: usize,
        reason: String,
    },
    RunCompleted {
        run_id: String,
        steps_succeeded: usize,
        steps_skipped: usize,
        total_seconds: f64,
    },
    RunAborted {
        run_id: String,
        step: usize,
        reason: String,
        total_seconds: f64,
    },
    RecipeUpgraded {
        recipe: String,
        from_version: String,
        to_version: String,
        source_hash: String,
        backup: Option<String>,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: RunEvent,
}

// ============================================================================
// Value helper
// ============================================================================

/// Render a JSON value as plain text: strings unquoted, null empty.
pub fn value_to_text(val: &Value) -> String {
    match val {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
