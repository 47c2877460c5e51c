//! ASH-008: Step callables and the function table.
//!
//! A callable carries an explicit [`Signature`] and receives a [`Call`] that
//! hands out exactly the arguments the injector bound. It reports back with
//! a tagged [`StepSignal`]; an `Err` is a fault and aborts the run like
//! `StepSignal::Abort`.

use super::capability::{CapabilityKind, OutputSink};
use super::context::RecipeContext;
use super::dialog::DialogRunner;
use super::error::EngineError;
use super::injector::{Binding, ParamSpec, ResolvedArgs, Signature};
use super::types::value_to_text;
use indexmap::IndexMap;
use serde_json::Value;

/// What a callable asks the engine to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepSignal {
    Success,
    Retry,
    Abort(String),
}

/// Result type of every step callable.
pub type StepResult = Result<StepSignal, String>;

/// Arguments and capabilities for one invocation.
pub struct Call<'a> {
    function: &'a str,
    signature: &'a Signature,
    args: &'a ResolvedArgs,
    console: &'a dyn OutputSink,
    dialogs: &'a DialogRunner,
    context: &'a mut RecipeContext,
}

impl<'a> Call<'a> {
    pub fn new(
        function: &'a str,
        signature: &'a Signature,
        args: &'a ResolvedArgs,
        console: &'a dyn OutputSink,
        dialogs: &'a DialogRunner,
        context: &'a mut RecipeContext,
    ) -> Self {
        Self {
            function,
            signature,
            args,
            console,
            dialogs,
            context,
        }
    }

    pub fn function(&self) -> &str {
        self.function
    }

    /// Value of an input parameter: literal, prompt answer, or declared default.
    pub fn value(&self, name: &str) -> Option<Value> {
        match self.args.get(name) {
            Some(Binding::Literal(v)) => Some(v.clone()),
            Some(Binding::Prompted(s)) => Some(Value::String(s.clone())),
            Some(Binding::Capability(_)) => None,
            None => self.signature.default_of(name).cloned(),
        }
    }

    /// [`Call::value`] rendered as text.
    pub fn text(&self, name: &str) -> Option<String> {
        self.value(name).as_ref().map(value_to_text)
    }

    /// Input parameters with a value, in declaration order.
    pub fn inputs(&self) -> Vec<(String, Value)> {
        self.signature
            .params()
            .filter_map(|(spec, _)| self.value(&spec.name).map(|v| (spec.name.clone(), v)))
            .collect()
    }

    fn granted(&self, kind: CapabilityKind) -> bool {
        self.args
            .names()
            .any(|n| self.args.get(n) == Some(&Binding::Capability(kind)))
    }

    /// Console sink, when the callable declared `console`.
    pub fn console(&self) -> Option<&dyn OutputSink> {
        self.granted(CapabilityKind::Console).then_some(self.console)
    }

    /// Dialog runner, when the callable declared `run_dialog`.
    pub fn dialogs(&self) -> Option<&DialogRunner> {
        self.granted(CapabilityKind::Dialog).then_some(self.dialogs)
    }

    /// Shared context, when the callable declared `recipe_context`.
    pub fn context(&mut self) -> Option<&mut RecipeContext> {
        if self.granted(CapabilityKind::Context) {
            Some(&mut *self.context)
        } else {
            None
        }
    }
}

/// A named step callable.
pub trait StepFunction {
    fn signature(&self) -> &Signature;

    fn call(&self, call: &mut Call<'_>) -> StepResult;
}

/// Closure-backed callable.
pub struct FnStep<F> {
    signature: Signature,
    body: F,
}

impl<F> FnStep<F>
where
    F: Fn(&mut Call<'_>) -> StepResult,
{
    pub fn new(params: Vec<ParamSpec>, body: F) -> Result<Self, EngineError> {
        Ok(Self {
            signature: Signature::new(params)?,
            body,
        })
    }
}

impl<F> StepFunction for FnStep<F>
where
    F: Fn(&mut Call<'_>) -> StepResult,
{
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn call(&self, call: &mut Call<'_>) -> StepResult {
        (self.body)(call)
    }
}

/// Callables a recipe can name, keyed by function name.
#[derive(Default)]
pub struct FunctionTable {
    functions: IndexMap<String, Box<dyn StepFunction>>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callable. Names must be non-empty and unique.
    pub fn register(
        &mut self,
        name: &str,
        function: Box<dyn StepFunction>,
    ) -> Result<(), EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::Registration(
                "function name must not be empty".to_string(),
            ));
        }
        if self.functions.contains_key(name) {
            return Err(EngineError::Registration(format!(
                "function '{}' registered twice",
                name
            )));
        }
        self.functions.insert(name.to_string(), function);
        Ok(())
    }

    /// Register a closure with the given parameter list.
    pub fn register_fn<F>(
        &mut self,
        name: &str,
        params: Vec<ParamSpec>,
        body: F,
    ) -> Result<(), EngineError>
    where
        F: Fn(&mut Call<'_>) -> StepResult + 'static,
    {
        self.register(name, Box::new(FnStep::new(params, body)?))
    }

    pub fn get(&self, name: &str) -> Option<&dyn StepFunction> {
        self.functions.get(name).map(|f| f.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl std::fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.functions.keys()).finish()
    }
}
