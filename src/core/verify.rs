//! ASH-012: Static recipe verification against a function table.
//!
//! Catches wiring mistakes before step 1 runs:
//! - steps naming functions that are not registered
//! - `prompt_for` entries the function does not declare
//! - `call_params` entries the function does not declare
//! - required parameters with no capability, literal, or prompt behind them

use super::capability::CapabilityKind;
use super::function::FunctionTable;
use super::injector::ParamKind;
use super::types::Recipe;

/// Verification error for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyError {
    /// 1-based step index
    pub step: usize,
    pub message: String,
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "step {}: {}", self.step, self.message)
    }
}

/// Verify a recipe. Returns a list of errors (empty = valid).
pub fn verify_recipe(recipe: &Recipe, functions: &FunctionTable) -> Vec<VerifyError> {
    let mut errors = Vec::new();

    for (i, step) in recipe.steps.iter().enumerate() {
        let index = i + 1;
        let Some(name) = step.function_name.as_deref() else {
            continue;
        };
        let Some(function) = functions.get(name) else {
            errors.push(VerifyError {
                step: index,
                message: format!("function '{}' not found", name),
            });
            continue;
        };
        let signature = function.signature();

        for key in step.prompt_for.keys() {
            if !signature.declares(key) {
                errors.push(VerifyError {
                    step: index,
                    message: format!(
                        "prompts for '{}', but '{}' has no such parameter",
                        key, name
                    ),
                });
            }
        }

        for key in step.call_params.keys() {
            if key.starts_with('_') || CapabilityKind::from_name(key).is_some() {
                continue;
            }
            if !signature.declares(key) {
                errors.push(VerifyError {
                    step: index,
                    message: format!(
                        "passes '{}', but '{}' has no such parameter",
                        key, name
                    ),
                });
            }
        }

        for (spec, kind) in signature.params() {
            if kind != ParamKind::Input || spec.default.is_some() {
                continue;
            }
            let supplied = step.call_params.contains_key(&spec.name)
                || step.prompt_for.contains_key(&spec.name);
            if !supplied {
                errors.push(VerifyError {
                    step: index,
                    message: format!(
                        "parameter '{}' of '{}' has no value source",
                        spec.name, name
                    ),
                });
            }
        }
    }

    errors
}
