//! ASH-009: Step state machine for a recipe run.
//!
//! Steps run strictly in order. Each step goes
//! `Pending → Running → {Succeeded, Retry, Skipped, Aborted}`; `Retry`
//! re-enters `Running` with a fresh argument resolution, `Aborted` ends the
//! run. Every transition is appended to the journal when one is configured.

use super::capability::{CapabilityRegistry, InputSource, UserInput};
use super::error::EngineError;
use super::function::{Call, FunctionTable, StepSignal};
use super::injector::{resolve_arguments, Resolution};
use super::types::*;
use crate::journal::eventlog;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::Instant;

const CONTINUE_PROMPT: &str = "\nPress Enter to continue...";
const RETRY_PROMPT: &str = "Press Enter to retry the step...";

/// Run-level behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Wait for an acknowledgment between steps
    pub pause: bool,

    /// Ask before re-running a step that requested a retry
    pub confirm_retry: bool,

    /// Retries allowed per step; `None` retries until the step resolves
    pub max_retries: Option<u32>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            pause: true,
            confirm_retry: true,
            max_retries: None,
        }
    }
}

/// Configuration for one run.
pub struct ExecuteConfig<'a> {
    pub recipe: &'a Recipe,
    /// Journal key, normally the recipe file stem
    pub recipe_name: &'a str,
    pub functions: &'a FunctionTable,
    pub options: EngineOptions,
    /// Journal directory; `None` disables the journal
    pub journal_dir: Option<&'a Path>,
}

/// Terminal state of a single step.
enum StepExit {
    Succeeded,
    Skipped,
    Aborted(String),
}

/// Result of one attempt of a function step.
enum Attempt {
    Done(StepExit),
    Retry,
}

/// Execute the recipe to completion or abort.
pub fn execute(
    cfg: &ExecuteConfig,
    registry: &mut CapabilityRegistry,
    input: &mut dyn InputSource,
) -> RunReport {
    let start = Instant::now();
    let run_id = eventlog::generate_run_id();
    let total = cfg.recipe.steps.len();

    registry.context_mut().seed_metadata(&cfg.recipe.metadata);
    log_event(
        cfg,
        RunEvent::RunStarted {
            recipe: cfg.recipe_name.to_string(),
            run_id: run_id.clone(),
            step_count: total,
            ash_version: env!("CARGO_PKG_VERSION").to_string(),
        },
    );
    show_header(registry, cfg.recipe);

    let mut records = Vec::with_capacity(total);
    let mut skip_next = false;
    for (i, step) in cfg.recipe.steps.iter().enumerate() {
        let index = i + 1;
        let step_start = Instant::now();
        let (exit, attempts) = if std::mem::take(&mut skip_next) {
            (StepExit::Skipped, 0)
        } else {
            run_step(cfg, &run_id, index, step, registry, input)
        };

        match exit {
            StepExit::Succeeded => {
                records.push(StepRecord {
                    index,
                    outcome: StepOutcome::Succeeded,
                    attempts,
                });
                log_event(
                    cfg,
                    RunEvent::StepSucceeded {
                        run_id: run_id.clone(),
                        step: index,
                        attempts,
                        duration_seconds: step_start.elapsed().as_secs_f64(),
                    },
                );
                if !step.prompt_for.is_empty() {
                    registry
                        .console()
                        .print(&format!("Step {} completed successfully!", index));
                }
                // A lost acknowledgment does not undo a completed step; a
                // skip typed here applies to the next step.
                if !step.is_text_only() && cfg.options.pause && index < total {
                    skip_next = matches!(input.read_line(CONTINUE_PROMPT), Ok(UserInput::Skip));
                }
            }
            StepExit::Skipped => {
                records.push(StepRecord {
                    index,
                    outcome: StepOutcome::Skipped,
                    attempts,
                });
                log_event(
                    cfg,
                    RunEvent::StepSkipped {
                        run_id: run_id.clone(),
                        step: index,
                    },
                );
                registry.console().print(&format!("Step {} skipped.", index));
            }
            StepExit::Aborted(reason) => {
                records.push(StepRecord {
                    index,
                    outcome: StepOutcome::Aborted,
                    attempts,
                });
                log_event(
                    cfg,
                    RunEvent::StepAborted {
                        run_id: run_id.clone(),
                        step: index,
                        reason: reason.clone(),
                    },
                );
                log_event(
                    cfg,
                    RunEvent::RunAborted {
                        run_id: run_id.clone(),
                        step: index,
                        reason: reason.clone(),
                        total_seconds: start.elapsed().as_secs_f64(),
                    },
                );
                registry.console().print(&format!(
                    "Recipe execution aborted at step {}: {}",
                    index, reason
                ));
                return RunReport {
                    run_id,
                    status: RunStatus::Aborted {
                        step_index: index,
                        statement: step.statement.clone(),
                        reason,
                    },
                    steps: records,
                    total_duration: start.elapsed(),
                };
            }
        }
    }

    let report = RunReport {
        run_id: run_id.clone(),
        status: RunStatus::Completed,
        steps: records,
        total_duration: start.elapsed(),
    };
    log_event(
        cfg,
        RunEvent::RunCompleted {
            run_id,
            steps_succeeded: report.count(&StepOutcome::Succeeded),
            steps_skipped: report.count(&StepOutcome::Skipped),
            total_seconds: report.total_duration.as_secs_f64(),
        },
    );
    registry.console().print("\n--- Recipe Complete ---");
    report
}

/// Drive one step until it leaves the Running/Retry loop.
fn run_step(
    cfg: &ExecuteConfig,
    run_id: &str,
    index: usize,
    step: &Step,
    registry: &mut CapabilityRegistry,
    input: &mut dyn InputSource,
) -> (StepExit, u32) {
    let total = cfg.recipe.steps.len();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        registry.context_mut().mark_position(index, total, attempt);
        log_event(
            cfg,
            RunEvent::StepStarted {
                run_id: run_id.to_string(),
                step: index,
                attempt,
            },
        );
        show_step(registry, index, step);

        let Some(name) = step.function_name.as_deref() else {
            return (finish_text_step(cfg, index, input), attempt);
        };

        match attempt_call(cfg, index, name, step, registry, input) {
            Attempt::Done(exit) => return (exit, attempt),
            Attempt::Retry => {
                if let Some(max) = cfg.options.max_retries {
                    if attempt > max {
                        return (
                            StepExit::Aborted(format!(
                                "step did not succeed after {} attempts",
                                attempt
                            )),
                            attempt,
                        );
                    }
                }
                log_event(
                    cfg,
                    RunEvent::StepRetried {
                        run_id: run_id.to_string(),
                        step: index,
                        attempt,
                    },
                );
                registry
                    .console()
                    .print("The step failed. Please review the output and try again.");
                if cfg.options.confirm_retry {
                    match input.read_line(RETRY_PROMPT) {
                        Ok(UserInput::Text(_)) => {}
                        Ok(UserInput::Skip) => return (StepExit::Skipped, attempt),
                        Err(e) => return (StepExit::Aborted(e.to_string()), attempt),
                    }
                }
            }
        }
    }
}

/// Text-only steps need an acknowledgment when pausing, except the last.
fn finish_text_step(cfg: &ExecuteConfig, index: usize, input: &mut dyn InputSource) -> StepExit {
    if !cfg.options.pause || index == cfg.recipe.steps.len() {
        return StepExit::Succeeded;
    }
    match input.read_line(CONTINUE_PROMPT) {
        Ok(UserInput::Text(_)) => StepExit::Succeeded,
        Ok(UserInput::Skip) => StepExit::Skipped,
        Err(e) => StepExit::Aborted(e.to_string()),
    }
}

/// Resolve arguments and invoke the callable once.
fn attempt_call(
    cfg: &ExecuteConfig,
    index: usize,
    name: &str,
    step: &Step,
    registry: &mut CapabilityRegistry,
    input: &mut dyn InputSource,
) -> Attempt {
    let Some(function) = cfg.functions.get(name) else {
        let err = EngineError::MissingCallable {
            step_index: index,
            function: name.to_string(),
        };
        return Attempt::Done(StepExit::Aborted(err.to_string()));
    };

    let args = match resolve_arguments(index, name, function.signature(), step, registry, input) {
        Ok(Resolution::Bound(args)) => args,
        Ok(Resolution::Skipped) => return Attempt::Done(StepExit::Skipped),
        Err(e) => return Attempt::Done(StepExit::Aborted(e.to_string())),
    };

    let (console, dialogs, context) = registry.parts_mut();
    let mut call = Call::new(name, function.signature(), &args, console, dialogs, context);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| function.call(&mut call)));

    match outcome {
        Ok(Ok(StepSignal::Success)) => Attempt::Done(StepExit::Succeeded),
        Ok(Ok(StepSignal::Retry)) => Attempt::Retry,
        Ok(Ok(StepSignal::Abort(reason))) if reason.trim().is_empty() => Attempt::Done(
            StepExit::Aborted(format!("function '{}' requested abort", name)),
        ),
        Ok(Ok(StepSignal::Abort(reason))) => Attempt::Done(StepExit::Aborted(reason)),
        Ok(Err(fault)) => Attempt::Done(StepExit::Aborted(format!(
            "function '{}' failed: {}",
            name, fault
        ))),
        Err(payload) => Attempt::Done(StepExit::Aborted(format!(
            "function '{}' panicked: {}",
            name,
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn show_header(registry: &CapabilityRegistry, recipe: &Recipe) {
    let console = registry.console();
    console.print(&format!("--- Starting Recipe {} ---", recipe.display_title()));
    if !recipe.description.is_empty() {
        console.print(&recipe.description);
    }
    console.print(&"-".repeat(25));
}

fn show_step(registry: &CapabilityRegistry, index: usize, step: &Step) {
    let console = registry.console();
    console.print(&format!("\n[Step {}]", index));
    console.print(&step.statement);
}

/// Append an event when journaling is enabled. Journal failures never stop a run.
fn log_event(cfg: &ExecuteConfig, event: RunEvent) {
    if let Some(dir) = cfg.journal_dir {
        let _ = eventlog::append_event(dir, cfg.recipe_name, event);
    }
}
