//! ASH-006: Capability registry and terminal I/O.
//!
//! A run gets exactly three injectable capabilities, looked up by the
//! parameter name a callable declares:
//!
//! | name              | capability                   |
//! |-------------------|------------------------------|
//! | `console`         | [`OutputSink`]               |
//! | `run_dialog`      | [`DialogRunner`]             |
//! | `recipe_context`  | the run's [`RecipeContext`]  |
//!
//! `run_tk_dialog` is accepted as an alias of `run_dialog`.

use super::context::RecipeContext;
use super::dialog::{DialogHost, DialogRunner};
use super::error::EngineError;
use serde_json::Value;
use std::io::{BufRead, Write};

pub const CONSOLE: &str = "console";
pub const RUN_DIALOG: &str = "run_dialog";
pub const RECIPE_CONTEXT: &str = "recipe_context";

/// Legacy parameter names and the capability they resolve to.
const ALIASES: &[(&str, CapabilityKind)] = &[("run_tk_dialog", CapabilityKind::Dialog)];

/// The closed set of injectable capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Console,
    Dialog,
    Context,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 3] = [Self::Console, Self::Dialog, Self::Context];

    /// Canonical parameter name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Console => CONSOLE,
            Self::Dialog => RUN_DIALOG,
            Self::Context => RECIPE_CONTEXT,
        }
    }

    /// Look up a capability by parameter name, aliases included.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == name)
            .or_else(|| {
                ALIASES
                    .iter()
                    .find(|(alias, _)| *alias == name)
                    .map(|(_, kind)| *kind)
            })
    }
}

// ============================================================================
// Output
// ============================================================================

/// Where step text and callable output go.
pub trait OutputSink {
    fn print(&self, text: &str);
}

/// Writes to stdout.
#[derive(Debug, Default)]
pub struct TerminalConsole;

impl OutputSink for TerminalConsole {
    fn print(&self, text: &str) {
        println!("{}", text);
    }
}

// ============================================================================
// Input
// ============================================================================

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    Text(String),
    /// The user typed the skip token.
    Skip,
}

/// Source of prompt answers and acknowledgments.
pub trait InputSource {
    /// Show `prompt` and block for one line. End of input is
    /// [`EngineError::InputClosed`].
    fn read_line(&mut self, prompt: &str) -> Result<UserInput, EngineError>;
}

/// Reads answers from stdin.
#[derive(Debug)]
pub struct StdinInput {
    skip_token: String,
}

impl StdinInput {
    pub fn new(skip_token: &str) -> Self {
        Self {
            skip_token: skip_token.to_string(),
        }
    }
}

impl InputSource for StdinInput {
    fn read_line(&mut self, prompt: &str) -> Result<UserInput, EngineError> {
        print!("{}", prompt);
        std::io::stdout()
            .flush()
            .map_err(|e| EngineError::Io(format!("cannot write prompt: {}", e)))?;
        let mut line = String::new();
        let n = std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| EngineError::Io(format!("cannot read input: {}", e)))?;
        if n == 0 {
            return Err(EngineError::InputClosed);
        }
        Ok(classify_line(&line, &self.skip_token))
    }
}

/// Strip the line terminator and recognize the skip token.
pub fn classify_line(line: &str, skip_token: &str) -> UserInput {
    let text = line.trim_end_matches(['\n', '\r']);
    if !skip_token.is_empty() && text.trim() == skip_token {
        UserInput::Skip
    } else {
        UserInput::Text(text.to_string())
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Per-run inputs to the registry.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Seed for `context.variables`; must be a JSON object or null.
    pub variables: Value,
}

/// Capabilities for one run. Built fresh per run, never shared.
pub struct CapabilityRegistry {
    console: Box<dyn OutputSink>,
    dialogs: DialogRunner,
    context: RecipeContext,
}

impl CapabilityRegistry {
    /// Construct every capability. Fails only when the context seed is unusable.
    pub fn build(
        config: RunConfig,
        console: Box<dyn OutputSink>,
        dialog_host: Box<dyn DialogHost>,
    ) -> Result<Self, EngineError> {
        let context = RecipeContext::from_seed(&config.variables).map_err(EngineError::Capability)?;
        Ok(Self {
            console,
            dialogs: DialogRunner::new(dialog_host),
            context,
        })
    }

    /// Capability registered under `name`, if any.
    pub fn lookup(&self, name: &str) -> Option<CapabilityKind> {
        CapabilityKind::from_name(name)
    }

    /// Canonical names of all registered capabilities.
    pub fn names(&self) -> Vec<&'static str> {
        CapabilityKind::ALL.iter().map(|k| k.name()).collect()
    }

    pub fn console(&self) -> &dyn OutputSink {
        self.console.as_ref()
    }

    pub fn dialogs(&self) -> &DialogRunner {
        &self.dialogs
    }

    pub fn context(&self) -> &RecipeContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut RecipeContext {
        &mut self.context
    }

    /// Split borrow used while a callable runs.
    pub fn parts_mut(&mut self) -> (&dyn OutputSink, &DialogRunner, &mut RecipeContext) {
        (self.console.as_ref(), &self.dialogs, &mut self.context)
    }

    pub fn into_context(self) -> RecipeContext {
        self.context
    }
}
