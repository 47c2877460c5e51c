//! ASH-015: Script-backed step functions.
//!
//! A recipe's callables live in `<stem>.functions.yaml`:
//!
//! ```yaml
//! functions:
//!   greet:
//!     params:
//!       - name
//!       - { name: greeting, default: "hello" }
//!       - recipe_context
//!     script: |
//!       echo "$ASH_ARG_GREETING, $ASH_ARG_NAME"
//!       echo "::set greeted=$ASH_ARG_NAME"
//! ```
//!
//! Inputs are exported as `ASH_ARG_<NAME>`. With `recipe_context` declared,
//! context variables are exported as `ASH_VAR_<KEY>` and `::set key=value`
//! lines on stdout write back to the context. Exit status 0 succeeds, 1
//! retries, 2 aborts with stderr as the reason; anything else is a fault.

pub mod local;

use crate::core::capability::{CapabilityKind, CONSOLE};
use crate::core::dialog::terminal_path_prompt;
use crate::core::function::{Call, FunctionTable, StepFunction, StepResult, StepSignal};
use crate::core::injector::{ParamKind, ParamSpec, Signature};
use crate::core::types::value_to_text;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Output from running a script.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Top level of a functions file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptFile {
    #[serde(default)]
    pub functions: IndexMap<String, ScriptDef>,
}

/// One function declaration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptDef {
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub params: Vec<ParamDecl>,

    /// Title of a file-selection dialog run before the script
    #[serde(default)]
    pub dialog: Option<String>,

    pub script: String,
}

/// Parameter as written in YAML: a bare name or a name with a default.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ParamDecl {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        default: Option<serde_yaml_ng::Value>,
    },
}

impl ParamDecl {
    fn to_spec(&self) -> Result<ParamSpec, String> {
        match self {
            Self::Name(name) => Ok(ParamSpec::required(name)),
            Self::Full { name, default: None } => Ok(ParamSpec::required(name)),
            Self::Full {
                name,
                default: Some(raw),
            } => {
                let value = serde_json::to_value(raw)
                    .map_err(|e| format!("default of '{}' is not representable: {}", name, e))?;
                Ok(ParamSpec::optional(name, value))
            }
        }
    }
}

/// A function whose body is a bash script.
#[derive(Debug)]
pub struct ScriptFunction {
    name: String,
    signature: Signature,
    script: String,
    dialog: Option<String>,
    workdir: Option<PathBuf>,
}

impl ScriptFunction {
    /// Build a function from its declaration. `console` is always bound so
    /// script output reaches the user.
    pub fn from_def(name: &str, def: &ScriptDef, workdir: Option<&Path>) -> Result<Self, String> {
        let mut specs = def
            .params
            .iter()
            .map(ParamDecl::to_spec)
            .collect::<Result<Vec<_>, _>>()?;
        if !specs
            .iter()
            .any(|s| CapabilityKind::from_name(&s.name) == Some(CapabilityKind::Console))
        {
            specs.push(ParamSpec::required(CONSOLE));
        }
        let signature =
            Signature::new(specs).map_err(|e| format!("function '{}': {}", name, e))?;

        if def.dialog.is_some() {
            let has_dialog = signature
                .params()
                .any(|(_, k)| k == ParamKind::Capability(CapabilityKind::Dialog));
            if !has_dialog {
                return Err(format!(
                    "function '{}' opens a dialog but does not declare run_dialog",
                    name
                ));
            }
        }

        Ok(Self {
            name: name.to_string(),
            signature,
            script: def.script.clone(),
            dialog: def.dialog.clone(),
            workdir: workdir.map(Path::to_path_buf),
        })
    }

    fn environment(&self, call: &mut Call<'_>) -> Vec<(String, String)> {
        let mut env: Vec<(String, String)> = call
            .inputs()
            .into_iter()
            .map(|(name, value)| (format!("ASH_ARG_{}", env_name(&name)), value_to_text(&value)))
            .collect();

        if let Some(title) = self.dialog.as_deref() {
            let picked = call
                .dialogs()
                .and_then(|d| d.run_blocking_dialog(terminal_path_prompt(title)));
            env.push(("ASH_DIALOG_RESULT".to_string(), picked.unwrap_or_default()));
        }

        if let Some(ctx) = call.context() {
            for (key, value) in &ctx.variables {
                env.push((format!("ASH_VAR_{}", env_name(key)), value_to_text(value)));
            }
            if let Some(step) = ctx.current_step() {
                env.push(("ASH_STEP".to_string(), step.to_string()));
            }
        }
        env
    }
}

impl StepFunction for ScriptFunction {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn call(&self, call: &mut Call<'_>) -> StepResult {
        let env = self.environment(call);
        let out = local::exec_local(&self.script, &env, self.workdir.as_deref())?;

        let mut output = Vec::new();
        for line in out.stdout.lines() {
            match parse_set(line) {
                Some((key, value)) => match call.context() {
                    Some(ctx) => ctx.set(key, Value::String(value.to_string())),
                    None => output.push(line),
                },
                None => output.push(line),
            }
        }
        if let Some(console) = call.console() {
            for line in output {
                console.print(line);
            }
            if !out.success() {
                for line in out.stderr.lines() {
                    console.print(line);
                }
            }
        }

        match out.exit_code {
            0 => Ok(StepSignal::Success),
            1 => Ok(StepSignal::Retry),
            2 => {
                let reason = out.stderr.trim();
                Ok(StepSignal::Abort(if reason.is_empty() {
                    format!("script '{}' requested abort", self.name)
                } else {
                    reason.to_string()
                }))
            }
            code => Err(format!("exit code {}: {}", code, out.stderr.trim())),
        }
    }
}

/// `::set key=value` directive.
fn parse_set(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.strip_prefix("::set ")?.split_once('=')?;
    let key = key.trim();
    (!key.is_empty()).then_some((key, value))
}

/// Upper-case a name for use in an environment variable.
fn env_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Parse a functions file into a table. Scripts run in `workdir` when given.
pub fn parse_functions(yaml: &str, workdir: Option<&Path>) -> Result<FunctionTable, String> {
    let file: ScriptFile =
        serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))?;
    let mut table = FunctionTable::new();
    for (name, def) in &file.functions {
        let function = ScriptFunction::from_def(name, def, workdir)?;
        table
            .register(name, Box::new(function))
            .map_err(|e| e.to_string())?;
    }
    Ok(table)
}

/// Load a functions file; scripts run in the file's directory.
pub fn load_functions(path: &Path) -> Result<FunctionTable, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    parse_functions(&content, path.parent())
        .map_err(|e| format!("invalid functions file {}: {}", path.display(), e))
}
