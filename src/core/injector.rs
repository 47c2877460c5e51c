//! ASH-007: Dependency injection for step callables.
//!
//! Every parameter a callable declares is bound from exactly one source,
//! first match wins:
//!
//! 1. a registered capability of the same name
//! 2. a literal from the step's `call_params`
//! 3. an answer to the step's `prompt_for` question
//! 4. the parameter's declared default (the binding is omitted)
//!
//! A parameter matching none of these is an [`EngineError::UnresolvedParameter`].
//! Prompts are only issued for declared parameters, after every other
//! parameter is known to be resolvable, in the step's `prompt_for` order.

use super::capability::{CapabilityKind, CapabilityRegistry, InputSource, UserInput};
use super::error::EngineError;
use super::types::Step;
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

/// Declared parameter of a step callable.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required(name: &str) -> Self {
        Self {
            name: name.to_string(),
            default: None,
        }
    }

    pub fn optional(name: &str, default: Value) -> Self {
        Self {
            name: name.to_string(),
            default: Some(default),
        }
    }
}

/// How a declared parameter is satisfied, fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Capability(CapabilityKind),
    Input,
}

/// Validated parameter list of a callable.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    params: Vec<(ParamSpec, ParamKind)>,
}

impl Signature {
    /// Classify and validate a parameter list.
    pub fn new(params: Vec<ParamSpec>) -> Result<Self, EngineError> {
        let mut seen = IndexSet::new();
        let mut classified = Vec::with_capacity(params.len());
        for spec in params {
            if spec.name.trim().is_empty() {
                return Err(EngineError::Registration(
                    "parameter name must not be empty".to_string(),
                ));
            }
            if !seen.insert(spec.name.clone()) {
                return Err(EngineError::Registration(format!(
                    "duplicate parameter '{}'",
                    spec.name
                )));
            }
            let kind = match CapabilityKind::from_name(&spec.name) {
                Some(cap) => {
                    if spec.default.is_some() {
                        return Err(EngineError::Registration(format!(
                            "capability parameter '{}' cannot have a default",
                            spec.name
                        )));
                    }
                    ParamKind::Capability(cap)
                }
                None => ParamKind::Input,
            };
            classified.push((spec, kind));
        }
        Ok(Self { params: classified })
    }

    /// Signature taking no parameters.
    pub fn empty() -> Self {
        Self { params: Vec::new() }
    }

    pub fn params(&self) -> impl Iterator<Item = (&ParamSpec, ParamKind)> {
        self.params.iter().map(|(s, k)| (s, *k))
    }

    pub fn get(&self, name: &str) -> Option<(&ParamSpec, ParamKind)> {
        self.params().find(|(s, _)| s.name == name)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn default_of(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(|(s, _)| s.default.as_ref())
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Source a parameter was bound from.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Capability(CapabilityKind),
    Literal(Value),
    Prompted(String),
}

/// Bindings for one invocation, in declaration order. Parameters left to
/// their defaults are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedArgs {
    bindings: IndexMap<String, Binding>,
}

impl ResolvedArgs {
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Outcome of argument resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Bound(ResolvedArgs),
    /// The user asked to skip the step at a prompt.
    Skipped,
}

enum Pending {
    Ready(Binding),
    Prompt,
    Defaulted,
}

/// Bind every parameter of `signature` for `step`.
pub fn resolve_arguments(
    step_index: usize,
    function: &str,
    signature: &Signature,
    step: &Step,
    registry: &CapabilityRegistry,
    input: &mut dyn InputSource,
) -> Result<Resolution, EngineError> {
    let mut pending: IndexMap<&str, Pending> = IndexMap::new();
    for (spec, _) in signature.params() {
        let name = spec.name.as_str();
        let source = if let Some(cap) = registry.lookup(name) {
            Pending::Ready(Binding::Capability(cap))
        } else if let Some(literal) = step.call_params.get(name) {
            Pending::Ready(Binding::Literal(literal.clone()))
        } else if step.prompt_for.contains_key(name) {
            Pending::Prompt
        } else if spec.default.is_some() {
            Pending::Defaulted
        } else {
            return Err(EngineError::UnresolvedParameter {
                step_index,
                function: function.to_string(),
                parameter: name.to_string(),
            });
        };
        pending.insert(name, source);
    }

    for (name, question) in &step.prompt_for {
        let Some(slot) = pending.get_mut(name.as_str()) else {
            continue;
        };
        if !matches!(slot, Pending::Prompt) {
            continue;
        }
        match input.read_line(&format!("{}: ", question))? {
            UserInput::Text(answer) => *slot = Pending::Ready(Binding::Prompted(answer)),
            UserInput::Skip => return Ok(Resolution::Skipped),
        }
    }

    let bindings = pending
        .into_iter()
        .filter_map(|(name, p)| match p {
            Pending::Ready(b) => Some((name.to_string(), b)),
            Pending::Prompt | Pending::Defaulted => None,
        })
        .collect();
    Ok(Resolution::Bound(ResolvedArgs { bindings }))
}
