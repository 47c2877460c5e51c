//! ASH-003: Schema normalization.
//!
//! Converts every supported recipe encoding into one canonical [`Recipe`]:
//! - v1.0 legacy array: `[metadata, step, step, ...]`
//! - v1.1 flat object: `{"version": "1.1", "step1": {...}, "step2": {...}}`
//! - early v1.1 nested: `{"version": "1.1", "steps": [...]}`
//!
//! Each shape has its own parser; [`normalize`] detects the shape and
//! dispatches. Legacy shapes produce an [`Upgrade`] carrying the canonical
//! document so the store can rewrite the file.

use super::error::EngineError;
use super::types::{Recipe, SchemaShape, Step, CURRENT_VERSION};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// `step` followed by a positive integer without leading zeros.
static STEP_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^step([1-9][0-9]*)$").expect("static step key pattern"));

/// Step properties that are not folded into `call_params`.
const STEP_FIELDS: &[&str] = &["statement", "function_name", "prompt_for", "call_params"];

/// Top-level properties with fixed meaning in object-shaped documents.
const RESERVED_KEYS: &[&str] = &["version", "title", "description", "metadata", "steps"];

/// Display hints that may also live inside `metadata` in older v1.1 files.
const COLOR_KEYS: &[&str] = &["color", "color_end"];

/// Upgrade signal for the persistence collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Upgrade {
    /// Version the document was written in
    pub from_version: String,
    /// The document rewritten in canonical v1.1 form
    pub canonical: Value,
}

/// Output of [`normalize`].
#[derive(Debug, Clone)]
pub struct Normalized {
    pub recipe: Recipe,
    pub shape: SchemaShape,
    pub upgrade: Option<Upgrade>,
}

impl Normalized {
    pub fn was_upgraded(&self) -> bool {
        self.upgrade.is_some()
    }
}

/// Normalize an anonymous document.
pub fn normalize(raw: &Value) -> Result<Normalized, EngineError> {
    normalize_named("<document>", raw)
}

/// Normalize a document, naming it `origin` in any format error.
pub fn normalize_named(origin: &str, raw: &Value) -> Result<Normalized, EngineError> {
    let shape = detect_shape(origin, raw)?;
    let recipe = match (shape, raw) {
        (SchemaShape::LegacyArray, Value::Array(items)) => parse_legacy_array(origin, items)?,
        (SchemaShape::FlatObject, Value::Object(obj)) => parse_flat_object(origin, obj)?,
        (SchemaShape::NestedSteps, Value::Object(obj)) => parse_nested_steps(origin, obj)?,
        _ => return Err(EngineError::format(origin, "document shape changed during detection")),
    };

    let upgrade = shape.is_legacy().then(|| Upgrade {
        from_version: shape.version().to_string(),
        canonical: canonical_document(&recipe),
    });

    Ok(Normalized {
        recipe,
        shape,
        upgrade,
    })
}

/// Classify a raw document into one of the supported shapes.
pub fn detect_shape(origin: &str, raw: &Value) -> Result<SchemaShape, EngineError> {
    match raw {
        Value::Array(items) if items.is_empty() => Err(EngineError::format(
            origin,
            "legacy recipe array is empty (expected a metadata element)",
        )),
        Value::Array(_) => Ok(SchemaShape::LegacyArray),
        Value::Object(obj) => {
            let version = match obj.get("version") {
                Some(Value::String(v)) => v.as_str(),
                Some(other) => {
                    return Err(EngineError::format(
                        origin,
                        format!("version must be a string, got {}", other),
                    ))
                }
                None => {
                    return Err(EngineError::format(
                        origin,
                        "object recipe has no \"version\" field",
                    ))
                }
            };
            if version != CURRENT_VERSION {
                return Err(EngineError::format(
                    origin,
                    format!(
                        "unsupported recipe version \"{}\" (supported: 1.0 array, 1.1 object)",
                        version
                    ),
                ));
            }
            if obj.contains_key("steps") {
                if obj.keys().any(|k| STEP_KEY.is_match(k)) {
                    return Err(EngineError::format(
                        origin,
                        "recipe declares both a \"steps\" array and stepN properties",
                    ));
                }
                Ok(SchemaShape::NestedSteps)
            } else {
                Ok(SchemaShape::FlatObject)
            }
        }
        other => Err(EngineError::format(
            origin,
            format!("expected a JSON array or object, got {}", type_name(other)),
        )),
    }
}

// ============================================================================
// Parser variants
// ============================================================================

/// v1.0: first element is metadata, the rest are steps in order.
fn parse_legacy_array(origin: &str, items: &[Value]) -> Result<Recipe, EngineError> {
    let (head, rest) = items
        .split_first()
        .ok_or_else(|| EngineError::format(origin, "legacy recipe array is empty"))?;
    let head = head.as_object().ok_or_else(|| {
        EngineError::format(origin, "first element of a legacy recipe must be an object")
    })?;

    let mut display_options = IndexMap::new();
    let mut metadata = IndexMap::new();
    for (key, value) in head {
        match key.as_str() {
            "title" | "description" => {}
            "metadata" => {
                if let Value::Object(m) = value {
                    metadata.extend(m.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
            // Names with a fixed meaning in v1.1 would be reinterpreted
            // after the rewrite, so they are kept out of the top level.
            k if RESERVED_KEYS.contains(&k) || STEP_KEY.is_match(k) => {
                metadata.insert(key.clone(), value.clone());
            }
            _ => {
                display_options.insert(key.clone(), value.clone());
            }
        }
    }
    metadata.insert(
        "original_version".to_string(),
        Value::String("1.0".to_string()),
    );
    inherit_colors(&metadata, &mut display_options);

    let steps = rest
        .iter()
        .enumerate()
        .map(|(i, raw)| parse_step(origin, &format!("step {}", i + 1), raw))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Recipe {
        version: CURRENT_VERSION.to_string(),
        title: non_empty(string_field(origin, head, "title")?)
            .or(non_empty(metadata_string(&metadata, "title")))
            .unwrap_or_default(),
        description: non_empty(string_field(origin, head, "description")?)
            .or(non_empty(metadata_string(&metadata, "description")))
            .unwrap_or_default(),
        display_options,
        metadata,
        steps,
    })
}

/// v1.1 flat: `stepN` properties ordered by the numeric value of N.
fn parse_flat_object(origin: &str, obj: &Map<String, Value>) -> Result<Recipe, EngineError> {
    let mut numbered: Vec<(u64, &String, &Value)> = Vec::new();
    for (key, value) in obj {
        if let Some(caps) = STEP_KEY.captures(key) {
            let n: u64 = caps[1].parse().map_err(|_| {
                EngineError::format(origin, format!("step number out of range: {}", key))
            })?;
            numbered.push((n, key, value));
        }
    }
    numbered.sort_by_key(|(n, _, _)| *n);

    let steps = numbered
        .into_iter()
        .map(|(_, key, raw)| parse_step(origin, key, raw))
        .collect::<Result<Vec<_>, _>>()?;

    recipe_from_object(origin, obj, steps)
}

/// Early v1.1: steps nested in an explicit array, otherwise identical.
fn parse_nested_steps(origin: &str, obj: &Map<String, Value>) -> Result<Recipe, EngineError> {
    let items = match obj.get("steps") {
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(EngineError::format(
                origin,
                format!("\"steps\" must be an array, got {}", type_name(other)),
            ))
        }
        None => return Err(EngineError::format(origin, "missing \"steps\" array")),
    };

    let steps = items
        .iter()
        .enumerate()
        .map(|(i, raw)| parse_step(origin, &format!("steps[{}]", i), raw))
        .collect::<Result<Vec<_>, _>>()?;

    recipe_from_object(origin, obj, steps)
}

/// Shared top-level handling for the object shapes.
fn recipe_from_object(
    origin: &str,
    obj: &Map<String, Value>,
    steps: Vec<Step>,
) -> Result<Recipe, EngineError> {
    let metadata: IndexMap<String, Value> = match obj.get("metadata") {
        None | Some(Value::Null) => IndexMap::new(),
        Some(Value::Object(m)) => m.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Some(other) => {
            return Err(EngineError::format(
                origin,
                format!("\"metadata\" must be an object, got {}", type_name(other)),
            ))
        }
    };

    let mut display_options = IndexMap::new();
    for (key, value) in obj {
        if RESERVED_KEYS.contains(&key.as_str()) || STEP_KEY.is_match(key) {
            continue;
        }
        display_options.insert(key.clone(), value.clone());
    }
    inherit_colors(&metadata, &mut display_options);

    let title = non_empty(string_field(origin, obj, "title")?)
        .or(non_empty(metadata_string(&metadata, "title")))
        .unwrap_or_default();
    let description = non_empty(string_field(origin, obj, "description")?)
        .or(non_empty(metadata_string(&metadata, "description")))
        .unwrap_or_default();

    Ok(Recipe {
        version: CURRENT_VERSION.to_string(),
        title,
        description,
        display_options,
        metadata,
        steps,
    })
}

/// Parse and validate one step object.
fn parse_step(origin: &str, label: &str, raw: &Value) -> Result<Step, EngineError> {
    let obj = raw.as_object().ok_or_else(|| {
        EngineError::format(origin, format!("{} must be an object", label))
    })?;

    let statement = match obj.get("statement") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(EngineError::format(
                origin,
                format!("{}: statement must be a string, got {}", label, type_name(other)),
            ))
        }
        None => {
            return Err(EngineError::format(
                origin,
                format!("{}: missing statement", label),
            ))
        }
    };

    let function_name = match obj.get("function_name") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => {
            return Err(EngineError::format(
                origin,
                format!("{}: function_name cannot be an empty string", label),
            ))
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            return Err(EngineError::format(
                origin,
                format!("{}: function_name must be a string, got {}", label, type_name(other)),
            ))
        }
    };

    let mut prompt_for = IndexMap::new();
    match obj.get("prompt_for") {
        None | Some(Value::Null) => {}
        Some(Value::Object(m)) => {
            for (name, text) in m {
                let Value::String(text) = text else {
                    return Err(EngineError::format(
                        origin,
                        format!("{}: prompt text for '{}' must be a string", label, name),
                    ));
                };
                prompt_for.insert(name.clone(), text.clone());
            }
        }
        Some(other) => {
            return Err(EngineError::format(
                origin,
                format!("{}: prompt_for must be an object, got {}", label, type_name(other)),
            ))
        }
    }

    let mut call_params: IndexMap<String, Value> = match obj.get("call_params") {
        None | Some(Value::Null) => IndexMap::new(),
        Some(Value::Object(m)) => m.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Some(other) => {
            return Err(EngineError::format(
                origin,
                format!("{}: call_params must be an object, got {}", label, type_name(other)),
            ))
        }
    };
    for (key, value) in obj {
        if STEP_FIELDS.contains(&key.as_str()) {
            continue;
        }
        if call_params.contains_key(key) {
            return Err(EngineError::format(
                origin,
                format!(
                    "{}: parameter '{}' is given both in call_params and as a step property",
                    label, key
                ),
            ));
        }
        call_params.insert(key.clone(), value.clone());
    }

    if let Some(name) = call_params.keys().find(|k| prompt_for.contains_key(*k)) {
        return Err(EngineError::format(
            origin,
            format!(
                "{}: parameter '{}' is both a literal and a prompt (ambiguous binding)",
                label, name
            ),
        ));
    }

    Ok(Step {
        statement,
        function_name,
        call_params,
        prompt_for,
    })
}

// ============================================================================
// Canonical rendering
// ============================================================================

/// Render a recipe as a canonical flat v1.1 document.
///
/// Steps are renumbered densely from `step1`; literals are written under an
/// explicit `call_params` object.
pub fn canonical_document(recipe: &Recipe) -> Value {
    let mut doc = Map::new();
    doc.insert("version".to_string(), Value::String(CURRENT_VERSION.to_string()));
    doc.insert("title".to_string(), Value::String(recipe.title.clone()));
    doc.insert(
        "description".to_string(),
        Value::String(recipe.description.clone()),
    );
    for (key, value) in &recipe.display_options {
        doc.insert(key.clone(), value.clone());
    }
    if !recipe.metadata.is_empty() {
        doc.insert("metadata".to_string(), to_object(&recipe.metadata));
    }

    for (i, step) in recipe.steps.iter().enumerate() {
        let mut s = Map::new();
        s.insert("statement".to_string(), Value::String(step.statement.clone()));
        if let Some(ref f) = step.function_name {
            s.insert("function_name".to_string(), Value::String(f.clone()));
        }
        if !step.prompt_for.is_empty() {
            let prompts = step
                .prompt_for
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            s.insert("prompt_for".to_string(), Value::Object(prompts));
        }
        if !step.call_params.is_empty() {
            s.insert("call_params".to_string(), to_object(&step.call_params));
        }
        doc.insert(format!("step{}", i + 1), Value::Object(s));
    }

    Value::Object(doc)
}

/// A new recipe in the current version with two starter steps.
pub fn template_document(title: &str, description: &str) -> Value {
    serde_json::json!({
        "version": CURRENT_VERSION,
        "title": title,
        "description": description,
        "step1": {
            "statement": "Welcome to your new recipe! Edit this step to get started."
        },
        "step2": {
            "statement": "Add more steps by creating step3, step4, etc."
        }
    })
}

// ============================================================================
// Helpers
// ============================================================================

fn string_field(
    origin: &str,
    obj: &Map<String, Value>,
    key: &str,
) -> Result<Option<String>, EngineError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(EngineError::format(
            origin,
            format!("{} must be a string, got {}", key, type_name(other)),
        )),
    }
}

fn inherit_colors(metadata: &IndexMap<String, Value>, display_options: &mut IndexMap<String, Value>) {
    for key in COLOR_KEYS {
        if !display_options.contains_key(*key) {
            if let Some(v) = metadata.get(*key) {
                display_options.insert(key.to_string(), v.clone());
            }
        }
    }
}

fn metadata_string(metadata: &IndexMap<String, Value>, key: &str) -> Option<String> {
    metadata.get(key).and_then(Value::as_str).map(str::to_string)
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

fn to_object(map: &IndexMap<String, Value>) -> Value {
    Value::Object(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn legacy_doc() -> Value {
        json!([
            {"title": "Backup", "description": "Nightly backup", "color": "green"},
            {"statement": "Plug in the drive"},
            {"statement": "Pick a folder", "function_name": "pick", "prompt_for": {"folder": "Folder?"}},
            {"statement": "Copy", "function_name": "copy", "verbose": true}
        ])
    }

    #[test]
    fn test_ash003_detect_legacy_array() {
        assert_eq!(
            detect_shape("t", &legacy_doc()).unwrap(),
            SchemaShape::LegacyArray
        );
    }

    #[test]
    fn test_ash003_detect_flat_and_nested() {
        let flat = json!({"version": "1.1", "step1": {"statement": "a"}});
        let nested = json!({"version": "1.1", "steps": [{"statement": "a"}]});
        assert_eq!(detect_shape("t", &flat).unwrap(), SchemaShape::FlatObject);
        assert_eq!(detect_shape("t", &nested).unwrap(), SchemaShape::NestedSteps);
    }

    #[test]
    fn test_ash003_reject_unsupported_shapes() {
        for doc in [
            json!("recipe"),
            json!(42),
            json!(null),
            json!([]),
            json!({"title": "no version"}),
            json!({"version": "2.0"}),
            json!({"version": 1.1}),
        ] {
            let err = normalize(&doc).unwrap_err();
            assert!(err.is_format(), "expected format error for {}", doc);
        }
    }

    #[test]
    fn test_ash003_legacy_steps_in_order() {
        let n = normalize(&legacy_doc()).unwrap();
        let r = &n.recipe;
        assert_eq!(r.version, "1.1");
        assert_eq!(r.title, "Backup");
        assert_eq!(r.steps.len(), 3);
        assert_eq!(r.steps[0].statement, "Plug in the drive");
        assert_eq!(r.steps[1].function_name.as_deref(), Some("pick"));
        assert_eq!(r.steps[2].call_params["verbose"], json!(true));
        assert_eq!(r.display_options["color"], json!("green"));
        assert_eq!(r.metadata["original_version"], json!("1.0"));
    }

    #[test]
    fn test_ash003_legacy_emits_upgrade() {
        let n = normalize(&legacy_doc()).unwrap();
        let up = n.upgrade.as_ref().unwrap();
        assert_eq!(up.from_version, "1.0");
        assert_eq!(up.canonical["version"], json!("1.1"));
        assert_eq!(up.canonical["step3"]["call_params"]["verbose"], json!(true));
        assert!(n.was_upgraded());
    }

    #[test]
    fn test_ash003_legacy_defaults_empty_title() {
        let n = normalize(&json!([{}, {"statement": "only"}])).unwrap();
        assert_eq!(n.recipe.title, "");
        assert_eq!(n.recipe.description, "");
        assert_eq!(n.recipe.steps.len(), 1);
    }

    #[test]
    fn test_ash003_flat_numeric_order() {
        let doc = json!({
            "version": "1.1",
            "title": "T",
            "step2": {"statement": "two"},
            "step10": {"statement": "ten"},
            "step1": {"statement": "one"},
            "step9": {"statement": "nine"}
        });
        let n = normalize(&doc).unwrap();
        let order: Vec<_> = n.recipe.steps.iter().map(|s| s.statement.as_str()).collect();
        assert_eq!(order, vec!["one", "two", "nine", "ten"]);
        assert!(n.upgrade.is_none());
    }

    #[test]
    fn test_ash003_nested_steps_unwrapped() {
        let doc = json!({
            "version": "1.1",
            "title": "Nested",
            "steps": [{"statement": "a"}, {"statement": "b", "function_name": "f"}]
        });
        let n = normalize(&doc).unwrap();
        assert_eq!(n.shape, SchemaShape::NestedSteps);
        assert_eq!(n.recipe.steps.len(), 2);
        assert_eq!(n.upgrade.as_ref().unwrap().from_version, "1.1");
        assert_eq!(
            n.upgrade.unwrap().canonical["step2"]["function_name"],
            json!("f")
        );
    }

    #[test]
    fn test_ash003_steps_and_step_keys_ambiguous() {
        let doc = json!({
            "version": "1.1",
            "steps": [{"statement": "a"}],
            "step1": {"statement": "b"}
        });
        assert!(normalize(&doc).unwrap_err().is_format());
    }

    #[test]
    fn test_ash003_zero_steps_valid() {
        let n = normalize(&json!({"version": "1.1", "title": "Empty"})).unwrap();
        assert!(n.recipe.steps.is_empty());
        let legacy = normalize(&json!([{"title": "Empty"}])).unwrap();
        assert!(legacy.recipe.steps.is_empty());
    }

    #[test]
    fn test_ash003_unknown_top_level_preserved() {
        let doc = json!({
            "version": "1.1",
            "color": "red",
            "color_end": "blue",
            "author": "ops",
            "step0": "not a step",
            "step1": {"statement": "s"}
        });
        let r = normalize(&doc).unwrap().recipe;
        assert_eq!(r.display_options["author"], json!("ops"));
        assert_eq!(r.display_options["color_end"], json!("blue"));
        assert_eq!(r.display_options["step0"], json!("not a step"));
        assert_eq!(r.steps.len(), 1);
    }

    #[test]
    fn test_ash003_metadata_fallbacks() {
        let doc = json!({
            "version": "1.1",
            "metadata": {"title": "From meta", "description": "Meta desc", "color": "cyan"},
            "step1": {"statement": "s"}
        });
        let r = normalize(&doc).unwrap().recipe;
        assert_eq!(r.title, "From meta");
        assert_eq!(r.description, "Meta desc");
        assert_eq!(r.display_options["color"], json!("cyan"));
    }

    #[test]
    fn test_ash003_missing_statement_rejected() {
        let doc = json!({"version": "1.1", "step1": {"function_name": "f"}});
        let err = normalize_named("broken.json", &doc).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
        assert!(err.to_string().contains("missing statement"));
    }

    #[test]
    fn test_ash003_empty_function_name_rejected() {
        let doc = json!([{}, {"statement": "s", "function_name": ""}]);
        assert!(normalize(&doc).unwrap_err().to_string().contains("empty string"));
    }

    #[test]
    fn test_ash003_null_function_name_is_text_only() {
        let doc = json!([{}, {"statement": "s", "function_name": null}]);
        assert!(normalize(&doc).unwrap().recipe.steps[0].is_text_only());
    }

    #[test]
    fn test_ash003_literal_prompt_collision() {
        let doc = json!({
            "version": "1.1",
            "step1": {
                "statement": "s",
                "function_name": "f",
                "call_params": {"path": "/tmp"},
                "prompt_for": {"path": "Where?"}
            }
        });
        let err = normalize(&doc).unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn test_ash003_folded_property_collides_with_prompt() {
        let doc = json!([{}, {"statement": "s", "function_name": "f", "path": "/tmp", "prompt_for": {"path": "?"}}]);
        assert!(normalize(&doc).unwrap_err().is_format());
    }

    #[test]
    fn test_ash003_folded_property_collides_with_call_params() {
        let doc = json!([{}, {"statement": "s", "call_params": {"a": 1}, "a": 2}]);
        assert!(normalize(&doc).unwrap_err().is_format());
    }

    #[test]
    fn test_ash003_prompt_order_preserved() {
        let doc = json!({
            "version": "1.1",
            "step1": {"statement": "s", "function_name": "f", "prompt_for": {"zeta": "Z?", "alpha": "A?"}}
        });
        let r = normalize(&doc).unwrap().recipe;
        let names: Vec<_> = r.steps[0].prompt_for.keys().cloned().collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_ash003_canonical_idempotent() {
        for doc in [
            legacy_doc(),
            json!({"version": "1.1", "title": "T", "step3": {"statement": "x", "a": 1}, "step1": {"statement": "y"}}),
            json!({"version": "1.1", "steps": [{"statement": "z", "prompt_for": {"n": "N?"}, "function_name": "g"}]}),
        ] {
            let first = normalize(&doc).unwrap().recipe;
            let again = normalize(&canonical_document(&first)).unwrap();
            assert_eq!(again.recipe, first);
            assert!(again.upgrade.is_none());
        }
    }

    #[test]
    fn test_ash003_canonical_renumbers_densely() {
        let doc = json!({"version": "1.1", "step5": {"statement": "b"}, "step2": {"statement": "a"}});
        let canon = canonical_document(&normalize(&doc).unwrap().recipe);
        assert_eq!(canon["step1"]["statement"], json!("a"));
        assert_eq!(canon["step2"]["statement"], json!("b"));
        assert!(canon.get("step5").is_none());
    }

    #[test]
    fn test_ash003_legacy_reserved_keys_kept_in_metadata() {
        let doc = json!([{"title": "T", "version": "0.9", "step1": "odd"}, {"statement": "s"}]);
        let r = normalize(&doc).unwrap().recipe;
        assert_eq!(r.metadata["version"], json!("0.9"));
        assert!(!r.display_options.contains_key("step1"));
        let again = normalize(&canonical_document(&r)).unwrap().recipe;
        assert_eq!(again, r);
    }

    #[test]
    fn test_ash003_template_is_canonical() {
        let doc = template_document("New", "Desc");
        let n = normalize(&doc).unwrap();
        assert_eq!(n.recipe.steps.len(), 2);
        assert!(n.upgrade.is_none());
    }

    proptest! {
        /// Legacy arrays with N step elements normalize to exactly N steps in order.
        #[test]
        fn prop_ash003_legacy_count_and_order(statements in prop::collection::vec("[a-z ]{1,12}", 0..20)) {
            let mut items = vec![json!({"title": "P"})];
            items.extend(statements.iter().map(|s| json!({"statement": s})));
            let r = normalize(&Value::Array(items)).unwrap().recipe;
            let got: Vec<_> = r.steps.iter().map(|s| s.statement.clone()).collect();
            prop_assert_eq!(got, statements);
        }

        /// stepN keys sort numerically regardless of insertion order.
        #[test]
        fn prop_ash003_numeric_order(nums in prop::collection::btree_set(1u64..500, 1..25)) {
            let mut shuffled: Vec<u64> = nums.iter().copied().collect();
            shuffled.reverse();
            let half = shuffled.len() / 2;
            shuffled.rotate_left(half);
            let mut doc = Map::new();
            doc.insert("version".to_string(), json!("1.1"));
            for n in &shuffled {
                doc.insert(format!("step{}", n), json!({"statement": n.to_string()}));
            }
            let r = normalize(&Value::Object(doc)).unwrap().recipe;
            let got: Vec<u64> = r.steps.iter().map(|s| s.statement.parse().unwrap()).collect();
            let want: Vec<u64> = nums.into_iter().collect();
            prop_assert_eq!(got, want);
        }

        /// Any name shared by call_params and prompt_for is a format error.
        #[test]
        fn prop_ash003_collision_always_rejected(name in "[a-z_]{1,10}", literal in any::<i64>()) {
            let doc = json!({
                "version": "1.1",
                "step1": {
                    "statement": "s",
                    "function_name": "f",
                    "call_params": {name.clone(): literal},
                    "prompt_for": {name: "?"}
                }
            });
            prop_assert!(normalize(&doc).unwrap_err().is_format());
        }
    }
}
