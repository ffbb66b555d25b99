//! Validator engine.
//!
//! Walks a schema and a value together and returns pass/fail with a
//! structured diagnostic tree: `null` where a node is fine, `{error, value}`
//! at failing leaves, keyed aggregates for object-shaped failures, and a
//! ranked candidate list where no union alternative matched. Validation
//! failures are ordinary return values; only a malformed schema is an error.

use crate::schema::{
    classify, combine_and, compile_regex, object_properties, unescape_key, Node, Scope,
    SchemaError, SimpleKind,
};
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{json, Map, Value};

/// Largest integer exactly representable as an f64 (JSON's safe-integer bound).
pub(crate) const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ValidationResult {
    pub result: Outcome,
    pub output: Diagnostic,
}

impl ValidationResult {
    pub fn passed(&self) -> bool {
        self.result == Outcome::Pass
    }
}

/// One node of the diagnostic tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// No error at this node; serializes to `null`.
    Ok,
    Leaf {
        error: String,
        value: Value,
        /// Traversal depth at which the failure occurred. Used for union
        /// ranking only; not serialized.
        depth: usize,
    },
    /// Object/map/array/tuple failure, keyed by property name or index.
    Aggregate {
        results: IndexMap<String, Diagnostic>,
        error_count: usize,
        depth: usize,
    },
    /// No union alternative matched; candidates ranked best-first.
    Union { value: Value, output: Vec<Diagnostic> },
}

impl Diagnostic {
    pub fn is_ok(&self) -> bool {
        matches!(self, Diagnostic::Ok)
    }

    /// Number of failing leaves beneath (and including) this node.
    pub fn error_count(&self) -> usize {
        match self {
            Diagnostic::Ok => 0,
            Diagnostic::Leaf { .. } => 1,
            Diagnostic::Aggregate { error_count, .. } => *error_count,
            Diagnostic::Union { .. } => 1,
        }
    }

    /// The deepest point this diagnostic reached, a proxy for how close the
    /// value came to matching.
    fn deepest(&self) -> usize {
        match self {
            Diagnostic::Ok => 0,
            Diagnostic::Leaf { depth, .. } => *depth,
            Diagnostic::Aggregate { results, depth, .. } => results
                .values()
                .map(Diagnostic::deepest)
                .max()
                .unwrap_or(*depth),
            Diagnostic::Union { output, .. } => {
                output.iter().map(Diagnostic::deepest).max().unwrap_or(0)
            }
        }
    }
}

impl Serialize for Diagnostic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Diagnostic::Ok => serializer.serialize_none(),
            Diagnostic::Leaf { error, value, .. } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("error", error)?;
                map.serialize_entry("value", value)?;
                map.end()
            }
            Diagnostic::Aggregate {
                results,
                error_count,
                depth,
            } => {
                let mut map = serializer.serialize_map(Some(4))?;
                map.serialize_entry("error", "objectResult")?;
                map.serialize_entry("objectResults", results)?;
                map.serialize_entry("errorCount", error_count)?;
                map.serialize_entry("depth", depth)?;
                map.end()
            }
            Diagnostic::Union { value, output } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("error", "Did not match any from the listed types")?;
                map.serialize_entry("value", value)?;
                map.serialize_entry("output", output)?;
                map.end()
            }
        }
    }
}

/// Echo a value into a diagnostic, redacting object-shaped data to keep
/// error payloads small. Absence serializes as `null`.
fn redact(value: Option<&Value>) -> Value {
    match value {
        None | Some(Value::Null) => Value::Null,
        Some(Value::Object(_)) | Some(Value::Array(_)) => json!("[object omitted]"),
        Some(other) => other.clone(),
    }
}

fn leaf(error: impl Into<String>, value: Option<&Value>, depth: usize) -> Diagnostic {
    Diagnostic::Leaf {
        error: error.into(),
        value: redact(value),
        depth,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ENTRY POINT
// ————————————————————————————————————————————————————————————————————————————

/// Validate `value` against `schema`.
pub fn validate(schema: &Value, value: &Value) -> Result<ValidationResult, SchemaError> {
    let scope = Scope::root().enter(schema);
    let output = validate_node(schema, Some(value), &scope, value, 0)?;
    Ok(ValidationResult {
        result: if output.is_ok() {
            Outcome::Pass
        } else {
            Outcome::Fail
        },
        output,
    })
}

fn validate_node(
    schema: &Value,
    value: Option<&Value>,
    scope: &Scope<'_>,
    root: &Value,
    depth: usize,
) -> Result<Diagnostic, SchemaError> {
    let scope = scope.enter(schema);

    match classify(schema)? {
        Node::Simple(kind) => Ok(validate_simple(kind, value, depth)),
        Node::CustomRef(name) => match scope.get(name) {
            Some(resolved) => validate_node(resolved, value, &scope, root, depth),
            None => Err(SchemaError::UnknownValidator(name.to_string())),
        },
        Node::Union(alternatives) => validate_union(alternatives, value, &scope, root, depth),
        Node::Object(map) => validate_object(map, value, &scope, root, depth),
        Node::Array {
            element,
            min_length,
            max_length,
        } => validate_array(element, min_length, max_length, value, &scope, root, depth),
        Node::Map {
            value: value_schema,
            key,
            key_specific,
            min_length,
            max_length,
        } => validate_map(
            value_schema,
            key,
            key_specific,
            min_length,
            max_length,
            value,
            &scope,
            root,
            depth,
        ),
        Node::Enum(words) => Ok(validate_enum(&words, value, depth)),
        Node::Literal(expected) => Ok(validate_literal(expected, value, depth)),
        Node::Tuple(members) => validate_tuple(members, value, &scope, root, depth),
        Node::Number { min, max, integer } => Ok(validate_number(min, max, integer, value, depth)),
        Node::StringConstraint {
            min_length,
            max_length,
            regex,
        } => validate_string_constraint(min_length, max_length, regex, value, depth),
        Node::Meta(inner) => validate_node(inner, value, &scope, root, depth),
        Node::And(members) => {
            let merged = combine_and(members, &scope)?;
            validate_object(&merged, value, &scope, root, depth)
        }
        Node::KeyOf { path, value_type } => {
            validate_key_of(&path, value_type, value, &scope, root, depth)
        }
        Node::PropertyPath { only_objects } => {
            Ok(validate_property_path(only_objects, value, root, depth))
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PER-KIND CHECKS
// ————————————————————————————————————————————————————————————————————————————

pub(crate) fn is_safe_integer(value: &Value) -> bool {
    match value.as_f64() {
        Some(n) => n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER,
        None => false,
    }
}

fn validate_simple(kind: SimpleKind, value: Option<&Value>, depth: usize) -> Diagnostic {
    let failed = |message: &str| leaf(message, value, depth);
    match kind {
        SimpleKind::Any => Diagnostic::Ok,
        SimpleKind::Optional => match value {
            None => Diagnostic::Ok,
            Some(_) => failed("Value is not undefined"),
        },
        SimpleKind::Null => match value {
            Some(Value::Null) => Diagnostic::Ok,
            _ => failed("Value is not null"),
        },
        SimpleKind::String => match value {
            Some(Value::String(_)) => Diagnostic::Ok,
            _ => failed("Value is not a string"),
        },
        SimpleKind::Boolean => match value {
            Some(Value::Bool(_)) => Diagnostic::Ok,
            _ => failed("Value is not a boolean"),
        },
        SimpleKind::Number => match value {
            Some(Value::Number(_)) => Diagnostic::Ok,
            _ => failed("Value is not a number"),
        },
        SimpleKind::Integer => match value {
            Some(v) if is_safe_integer(v) => Diagnostic::Ok,
            _ => failed("Value is not an integer"),
        },
    }
}

/// Try each alternative in order; first pass wins. On total failure, rank the
/// candidates by how deep they got (then by how few errors they carry) and
/// report the best first.
fn validate_union(
    alternatives: &[Value],
    value: Option<&Value>,
    scope: &Scope<'_>,
    root: &Value,
    depth: usize,
) -> Result<Diagnostic, SchemaError> {
    let mut candidates: Vec<Diagnostic> = Vec::with_capacity(alternatives.len());
    for alternative in alternatives {
        let result = validate_node(alternative, value, scope, root, depth)?;
        if result.is_ok() {
            return Ok(Diagnostic::Ok);
        }
        // Flatten nested union failures into one candidate list.
        match result {
            Diagnostic::Union { output, .. } => candidates.extend(output),
            other => candidates.push(other),
        }
    }

    candidates.sort_by(|a, b| {
        b.deepest()
            .cmp(&a.deepest())
            .then(a.error_count().cmp(&b.error_count()))
    });

    Ok(Diagnostic::Union {
        value: redact(value),
        output: candidates,
    })
}

/// Closed-shape object validation: every data key must exist on the schema,
/// every schema key is checked (absent ones against `undefined`).
fn validate_object(
    schema_map: &Map<String, Value>,
    value: Option<&Value>,
    scope: &Scope<'_>,
    root: &Value,
    depth: usize,
) -> Result<Diagnostic, SchemaError> {
    let Some(Value::Object(data)) = value else {
        return Ok(leaf("Value is not an Object", value, depth));
    };

    let mut results: IndexMap<String, Diagnostic> = IndexMap::new();
    let properties: IndexMap<&str, &Value> = object_properties(schema_map).collect();

    // serde_json maps are plain data with no prototype chain, so iterating
    // them is already an ownership-only view of the input.
    for (key, item) in data {
        match properties.get(key.as_str()) {
            None => {
                results.insert(
                    key.clone(),
                    leaf("Key does not exist on validator", Some(item), depth + 1),
                );
            }
            Some(&property_schema) => {
                let diagnostic =
                    validate_node(property_schema, Some(item), scope, root, depth + 1)?;
                results.insert(key.clone(), diagnostic);
            }
        }
    }

    for (key, property_schema) in properties {
        if !results.contains_key(key) {
            let diagnostic = validate_node(property_schema, data.get(key), scope, root, depth + 1)?;
            results.insert(key.to_string(), diagnostic);
        }
    }

    Ok(aggregate(results, depth))
}

fn aggregate(results: IndexMap<String, Diagnostic>, depth: usize) -> Diagnostic {
    let error_count = results.values().map(Diagnostic::error_count).sum();
    if error_count == 0 {
        return Diagnostic::Ok;
    }
    Diagnostic::Aggregate {
        results,
        error_count,
        depth,
    }
}

fn validate_array(
    element: &Value,
    min_length: Option<usize>,
    max_length: Option<usize>,
    value: Option<&Value>,
    scope: &Scope<'_>,
    root: &Value,
    depth: usize,
) -> Result<Diagnostic, SchemaError> {
    let Some(Value::Array(items)) = value else {
        return Ok(leaf("Value is not an Array", value, depth));
    };

    if items.len() < min_length.unwrap_or(0) {
        return Ok(leaf(
            "Array is shorter than the required minimum length",
            value,
            depth,
        ));
    }
    if let Some(max) = max_length {
        if items.len() > max {
            return Ok(leaf(
                "Array is longer than the required maximum length",
                value,
                depth,
            ));
        }
    }

    let mut results: IndexMap<String, Diagnostic> = IndexMap::new();
    for (index, item) in items.iter().enumerate() {
        let diagnostic = validate_node(element, Some(item), scope, root, depth + 1)?;
        results.insert(index.to_string(), diagnostic);
    }
    Ok(aggregate(results, depth))
}

#[allow(clippy::too_many_arguments)]
fn validate_map(
    value_schema: &Value,
    key_schema: Option<&Value>,
    key_specific: Option<&Value>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    value: Option<&Value>,
    scope: &Scope<'_>,
    root: &Value,
    depth: usize,
) -> Result<Diagnostic, SchemaError> {
    let Some(Value::Object(data)) = value else {
        return Ok(leaf("Value is not an Object", value, depth));
    };

    if data.len() < min_length.unwrap_or(0) {
        return Ok(leaf(
            "Map has fewer keys than the required minimum length",
            value,
            depth,
        ));
    }
    if let Some(max) = max_length {
        if data.len() > max {
            return Ok(leaf(
                "Map has more keys than the required maximum length",
                value,
                depth,
            ));
        }
    }

    let specific = resolve_key_specific(key_specific, scope)?;
    let mut results: IndexMap<String, Diagnostic> = IndexMap::new();

    // keySpecificType keys are mandatory and validated by name.
    if let Some(specific_map) = specific {
        for (raw_key, property_schema) in specific_map {
            if raw_key == "$types" {
                continue;
            }
            let key = unescape_key(raw_key);
            let diagnostic =
                validate_node(property_schema, data.get(key), scope, root, depth + 1)?;
            results.insert(key.to_string(), diagnostic);
        }
    }

    for (key, item) in data {
        if results.contains_key(key.as_str()) {
            continue;
        }
        if let Some(key_schema) = key_schema {
            let key_value = Value::String(key.clone());
            let key_diagnostic =
                validate_node(key_schema, Some(&key_value), scope, root, depth + 1)?;
            if !key_diagnostic.is_ok() {
                results.insert(key.clone(), key_diagnostic);
                continue;
            }
        }
        let diagnostic = validate_node(value_schema, Some(item), scope, root, depth + 1)?;
        results.insert(key.clone(), diagnostic);
    }

    Ok(aggregate(results, depth))
}

/// `keySpecificType` may be given as a (chain of) custom-type reference(s);
/// anything that doesn't bottom out at an object is a schema error.
fn resolve_key_specific<'a>(
    key_specific: Option<&'a Value>,
    scope: &Scope<'a>,
) -> Result<Option<&'a Map<String, Value>>, SchemaError> {
    let Some(mut current) = key_specific else {
        return Ok(None);
    };
    for _ in 0..64 {
        match current {
            Value::String(name) => {
                if !name.starts_with('$') {
                    return Err(SchemaError::InvalidKeySpecificType(name.clone()));
                }
                current = scope
                    .get(name)
                    .ok_or_else(|| SchemaError::InvalidKeySpecificType(name.clone()))?;
            }
            Value::Object(map) => return Ok(Some(map)),
            other => {
                return Err(SchemaError::InvalidKeySpecificType(
                    serde_json::to_string(other).unwrap_or_default(),
                ));
            }
        }
    }
    Err(SchemaError::InvalidKeySpecificType(
        "cyclic reference chain".into(),
    ))
}

fn validate_enum(words: &[&str], value: Option<&Value>, depth: usize) -> Diagnostic {
    let Some(Value::String(s)) = value else {
        return leaf("Value is not a string", value, depth);
    };
    if words.iter().any(|w| w == s) {
        Diagnostic::Ok
    } else {
        leaf(
            format!(
                "Value needs to be one of the following: [{}]",
                words.join(", ")
            ),
            value,
            depth,
        )
    }
}

fn validate_literal(expected: &Value, value: Option<&Value>, depth: usize) -> Diagnostic {
    match value {
        Some(v) if v == expected => Diagnostic::Ok,
        _ => leaf(
            format!(
                "Value does not equal the literal: {}",
                serde_json::to_string(expected).unwrap_or_default()
            ),
            value,
            depth,
        ),
    }
}

/// A tuple value may be no longer than the tuple; surplus schema positions
/// are validated against absence (so only optional tails may be omitted).
fn validate_tuple(
    members: &[Value],
    value: Option<&Value>,
    scope: &Scope<'_>,
    root: &Value,
    depth: usize,
) -> Result<Diagnostic, SchemaError> {
    let Some(Value::Array(items)) = value else {
        return Ok(leaf("Value is not an Array", value, depth));
    };
    if items.len() > members.len() {
        return Ok(leaf("Value is longer than the tuple", value, depth));
    }

    let mut results: IndexMap<String, Diagnostic> = IndexMap::new();
    for (index, member) in members.iter().enumerate() {
        let diagnostic = validate_node(member, items.get(index), scope, root, depth + 1)?;
        results.insert(index.to_string(), diagnostic);
    }
    Ok(aggregate(results, depth))
}

fn validate_number(
    min: Option<f64>,
    max: Option<f64>,
    integer: bool,
    value: Option<&Value>,
    depth: usize,
) -> Diagnostic {
    let Some(v @ Value::Number(_)) = value else {
        return leaf("Value is not a number", value, depth);
    };
    let n = v.as_f64().unwrap_or(f64::NAN);
    if integer && !is_safe_integer(v) {
        return leaf("Value is not an integer", value, depth);
    }
    if let Some(min) = min {
        if n < min {
            return leaf("Value is smaller than the required minimum", value, depth);
        }
    }
    if let Some(max) = max {
        if n > max {
            return leaf("Value is bigger than the required maximum", value, depth);
        }
    }
    Diagnostic::Ok
}

fn validate_string_constraint(
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<&str>,
    value: Option<&Value>,
    depth: usize,
) -> Result<Diagnostic, SchemaError> {
    let Some(Value::String(s)) = value else {
        return Ok(leaf("Value is not a string", value, depth));
    };
    let length = s.chars().count();
    if let Some(min) = min_length {
        if length < min {
            return Ok(leaf(
                "String is shorter than the required minimum length",
                value,
                depth,
            ));
        }
    }
    if let Some(max) = max_length {
        if length > max {
            return Ok(leaf(
                "String is longer than the required maximum length",
                value,
                depth,
            ));
        }
    }
    if let Some(pattern) = pattern {
        let compiled = compile_regex(pattern)?;
        if !compiled.is_match(s) {
            return Ok(leaf("String did not match required regex", value, depth));
        }
    }
    Ok(Diagnostic::Ok)
}

/// Walk `path` from the document root and return the object found there, if
/// any. Key-references and property paths resolve against the data, never
/// the schema.
fn lookup_path<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Map<String, Value>> {
    let mut current = root;
    for segment in path {
        current = current.as_object()?.get(*segment)?;
    }
    current.as_object()
}

fn validate_key_of(
    path: &[&str],
    value_type: Option<&Value>,
    value: Option<&Value>,
    scope: &Scope<'_>,
    root: &Value,
    depth: usize,
) -> Result<Diagnostic, SchemaError> {
    let Some(target) = lookup_path(root, path) else {
        return Ok(leaf(
            format!("KeyOf path not found in data: [{}]", path.join(", ")),
            value,
            depth,
        ));
    };
    if target.is_empty() {
        return Ok(leaf(
            format!("KeyOf path has no keys: [{}]", path.join(", ")),
            value,
            depth,
        ));
    }

    let Some(Value::String(key)) = value else {
        return Ok(leaf("Value is not a string", value, depth));
    };
    let Some(referenced) = target.get(key) else {
        return Ok(leaf(
            format!(
                "Value is not a key of the referenced path: [{}]",
                path.join(", ")
            ),
            value,
            depth,
        ));
    };

    match value_type {
        Some(value_type) => validate_node(value_type, Some(referenced), scope, root, depth + 1),
        None => Ok(Diagnostic::Ok),
    }
}

fn validate_property_path(
    only_objects: bool,
    value: Option<&Value>,
    root: &Value,
    depth: usize,
) -> Diagnostic {
    let Some(Value::Array(segments)) = value else {
        return leaf("Value is not an Array", value, depth);
    };

    let mut current = root;
    for segment in segments {
        let Some(key) = segment.as_str() else {
            return leaf("Property path segments must be strings", value, depth);
        };
        let next = current.as_object().and_then(|map| map.get(key));
        match next {
            Some(found) => current = found,
            None => return leaf("Property path does not exist in data", value, depth),
        }
    }

    if only_objects && !current.is_object() {
        return leaf("Property path must point to an object", value, depth);
    }
    Diagnostic::Ok
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(schema: Value, value: Value) -> ValidationResult {
        validate(&schema, &value).expect("schema is well formed")
    }

    #[test]
    fn passes_correct_simple_values() {
        assert!(check(json!("string"), json!("hello")).passed());
        assert!(check(json!("integer"), json!(123)).passed());
        assert!(check(json!("number"), json!(123.3)).passed());
        assert!(check(json!("boolean"), json!(true)).passed());
        assert!(check(json!("null"), json!(null)).passed());
        assert!(check(json!("any"), json!(233)).passed());
        assert!(check(json!({ "$type": "string" }), json!("desert")).passed());
    }

    #[test]
    fn fails_incorrect_simple_values() {
        assert!(!check(json!("string"), json!(234)).passed());
        assert!(!check(json!("integer"), json!(123.4)).passed());
        assert!(!check(json!("integer"), json!("123")).passed());
        assert!(!check(json!("number"), json!("123.4")).passed());
        assert!(!check(json!("boolean"), json!("true")).passed());
        assert!(!check(json!("null"), json!("no")).passed());
        // Not a safe integer above 2^53.
        assert!(!check(json!("integer"), json!(12332323423445323000.0)).passed());
    }

    #[test]
    fn integers_represented_as_floats_still_count() {
        assert!(check(json!("integer"), json!(123.0)).passed());
    }

    #[test]
    fn passes_objects_with_correct_values() {
        assert!(check(json!({}), json!({})).passed());
        assert!(check(json!({ "myNumber": "number" }), json!({ "myNumber": 12.3 })).passed());
        assert!(check(
            json!({ "num": "number", "int": "integer", "str": "string", "bool": "boolean" }),
            json!({ "num": 12.3, "int": 12, "str": "Hello", "bool": false })
        )
        .passed());
    }

    #[test]
    fn fails_objects_with_missing_properties() {
        assert!(!check(json!({ "myNumber": "number" }), json!({})).passed());
    }

    #[test]
    fn fails_non_object_values_for_object_schemas() {
        assert!(!check(json!({}), json!(null)).passed());
        assert!(!check(json!({ "num": "number" }), json!("{\"num\": 3}")).passed());
    }

    #[test]
    fn rejects_objects_with_additional_keys() {
        let result = check(json!({ "myValue": "integer" }), json!({ "myValue": 2, "extra": 3 }));
        assert!(!result.passed());
        let Diagnostic::Aggregate { results, .. } = &result.output else {
            panic!("expected an aggregate");
        };
        assert!(matches!(
            &results["extra"],
            Diagnostic::Leaf { error, .. } if error == "Key does not exist on validator"
        ));
    }

    #[test]
    fn handles_unions() {
        assert!(check(json!(["integer", "string"]), json!("hello")).passed());
        assert!(check(json!(["integer", "string"]), json!(123)).passed());
        assert!(!check(json!(["integer", "string"]), json!({})).passed());
    }

    #[test]
    fn handles_optional_values_via_unions() {
        let schema = json!({ "myValue": ["integer", "string", "?"] });
        assert!(check(schema.clone(), json!({ "myValue": 123 })).passed());
        assert!(check(schema.clone(), json!({ "myValue": "abc" })).passed());
        assert!(check(schema, json!({})).passed());
    }

    #[test]
    fn union_failure_ranks_the_closest_alternative_first() {
        let schema = json!([{ "a": "string", "b": "number" }, { "c": "string" }]);
        let result = check(schema, json!({ "a": "x" }));
        assert!(!result.passed());
        let Diagnostic::Union { output, .. } = &result.output else {
            panic!("expected a union diagnostic");
        };
        // First branch misses only `b`; second rejects `a` and misses `c`.
        assert_eq!(output[0].error_count(), 1);
        assert!(output[0].error_count() < output[1].error_count());
    }

    #[test]
    fn handles_arrays_with_length_bounds() {
        assert!(check(json!({ "$array": "string" }), json!(["hello", "abc"])).passed());
        assert!(check(json!({ "$array": "string" }), json!([])).passed());
        assert!(!check(json!({ "$array": "string" }), json!([2])).passed());
        assert!(!check(json!({ "$array": "string" }), json!("hello")).passed());
        assert!(!check(json!({ "$array": "string", "minLength": 3 }), json!(["a", "b"])).passed());
        assert!(
            !check(json!({ "$array": "string", "maxLength": 3 }), json!(["a", "b", "c", "d"]))
                .passed()
        );
        assert!(
            check(json!({ "$array": "string", "minLength": 1, "maxLength": 3 }), json!(["a", "b"]))
                .passed()
        );
    }

    #[test]
    fn handles_enums() {
        let schema = json!({ "$enum": ["ts", "typescript"] });
        assert!(check(schema.clone(), json!("ts")).passed());
        assert!(check(schema.clone(), json!("typescript")).passed());
        assert!(!check(schema.clone(), json!("javascript")).passed());
        assert!(!check(schema, json!(["ts"])).passed());
    }

    #[test]
    fn handles_literals() {
        assert!(check(json!({ "$literal": "doge" }), json!("doge")).passed());
        assert!(!check(json!({ "$literal": "doge" }), json!("cate")).passed());
        assert!(check(json!({ "$literal": 42 }), json!(42)).passed());
        assert!(check(json!({ "$literal": null }), json!(null)).passed());
    }

    #[test]
    fn handles_tuples() {
        let schema = json!({ "$tuple": ["string", "number"] });
        assert!(check(schema.clone(), json!(["a", 1])).passed());
        assert!(!check(schema.clone(), json!([1, "a"])).passed());
        assert!(!check(schema.clone(), json!(["a", 1, true])).passed());
        // A short value leaves the surplus position validated against absence.
        assert!(!check(schema, json!(["a"])).passed());
        let optional_tail = json!({ "$tuple": ["string", ["?", "number"]] });
        assert!(check(optional_tail, json!(["a"])).passed());
    }

    #[test]
    fn validates_string_length_and_regex() {
        let schema = json!({ "$string": { "minLength": 4, "maxLength": 6 } });
        assert!(!check(schema.clone(), json!("abc")).passed());
        assert!(!check(schema.clone(), json!("Lorem ipsum")).passed());
        assert!(check(schema, json!("hello")).passed());

        let regex = json!({ "$string": { "regex": "hello \\w+" } });
        assert!(!check(regex.clone(), json!("abc")).passed());
        assert!(check(regex, json!("hello world")).passed());
    }

    #[test]
    fn enforces_number_bounds() {
        let schema = json!({ "$number": { "min": 1, "max": 66 } });
        assert!(!check(schema.clone(), json!(0)).passed());
        assert!(!check(schema.clone(), json!(67)).passed());
        assert!(check(schema, json!(44)).passed());
        assert!(!check(json!({ "$number": { "integer": true } }), json!(1.5)).passed());
    }

    #[test]
    fn validates_maps_with_bounds_and_key_schema() {
        let schema = json!({ "$map": "number" });
        assert!(check(schema.clone(), json!({ "x": 3, "y": 4 })).passed());
        assert!(!check(schema, json!({ "x": 3, "y": "4" })).passed());

        assert!(
            !check(json!({ "$map": "string", "minLength": 3 }), json!({ "a": "x", "b": "y" }))
                .passed()
        );
        assert!(!check(
            json!({ "$map": "string", "maxLength": 3 }),
            json!({ "a": "1", "b": "2", "c": "3", "d": "4" })
        )
        .passed());

        let keyed = json!({ "$map": "number", "key": { "$string": { "regex": "^ab[a-z]" } } });
        assert!(check(keyed.clone(), json!({ "abx": 3, "aby": 4 })).passed());
        assert!(!check(keyed, json!({ "x": 3 })).passed());
    }

    #[test]
    fn map_key_specific_types_are_mandatory() {
        let schema = json!({ "$map": "string", "keySpecificType": { "a": "number" } });
        assert!(check(schema.clone(), json!({ "a": 1, "other": "x" })).passed());
        assert!(!check(schema.clone(), json!({ "a": "not a number" })).passed());
        assert!(!check(schema, json!({ "other": "x" })).passed());
    }

    #[test]
    fn key_specific_type_reference_must_resolve() {
        let schema = json!({ "$map": "string", "keySpecificType": "notARef" });
        assert!(matches!(
            validate(&schema, &json!({ "a": "x" })),
            Err(SchemaError::InvalidKeySpecificType(_))
        ));
    }

    #[test]
    fn can_use_type_definitions() {
        let schema = json!({
            "$types": { "$range": { "$number": { "min": 1, "max": 99 } } },
            "a": "number",
            "b": "$range"
        });
        assert!(check(schema.clone(), json!({ "a": 2, "b": 43 })).passed());
        assert!(!check(schema.clone(), json!({ "a": 2, "b": 101 })).passed());
        assert!(!check(schema, json!({ "a": 2, "b": 0 })).passed());
    }

    #[test]
    fn type_definitions_can_reference_each_other() {
        let schema = json!({
            "$types": {
                "$myObject": { "itsRange": "$range", "name": "string" },
                "$range": { "$number": { "min": 1, "max": 99 } }
            },
            "a": "$myObject",
            "b": "$range"
        });
        assert!(check(schema.clone(), json!({ "a": { "name": "abc", "itsRange": 22 }, "b": 43 }))
            .passed());
        assert!(!check(schema.clone(), json!({ "a": { "name": "abc", "itsRange": 101 }, "b": 43 }))
            .passed());
        assert!(!check(schema, json!({ "a": 2, "b": 0 })).passed());
    }

    #[test]
    fn validates_recursive_data_structures() {
        let schema = json!({
            "$types": { "$tree": { "value": "string", "left": ["?", "$tree"], "right": ["?", "$tree"] } },
            "root": "$tree"
        });
        let data = json!({
            "root": {
                "value": "a",
                "left": { "value": "b", "left": { "value": "c" } },
                "right": { "value": "d" }
            }
        });
        assert!(check(schema, data).passed());
    }

    #[test]
    fn root_can_be_a_custom_type_via_meta() {
        let schema = json!({
            "$types": { "$customType": { "value": "string", "nodes": { "$array": "$customType" } } },
            "$type": "$customType"
        });
        let data = json!({ "value": "abc", "nodes": [{ "value": "xyz", "nodes": [] }] });
        assert!(check(schema, data).passed());
    }

    #[test]
    fn escaped_dollar_keys_validate_data_keys() {
        let schema = json!({ "myNumber": "number", "\\$escapedDollar": "string" });
        assert!(check(schema.clone(), json!({ "myNumber": 12.3, "$escapedDollar": "value" }))
            .passed());
        let failed = check(schema, json!({ "myNumber": 12.3, "$escapedDollar": 234 }));
        assert!(!failed.passed());
        let Diagnostic::Aggregate { results, .. } = &failed.output else {
            panic!("expected an aggregate");
        };
        assert!(!results["$escapedDollar"].is_ok());
    }

    #[test]
    fn and_merges_objects_and_custom_types() {
        let schema = json!({
            "$types": {
                "$myObject": { "value": "string" },
                "$otherObject": { "num": "number" }
            },
            "$and": [{ "valueA": "string" }, "$myObject", { "$type": "$otherObject" }]
        });
        assert!(check(schema.clone(), json!({ "valueA": "a", "value": "b", "num": 88 })).passed());
        assert!(!check(schema, json!({ "valueA": "a" })).passed());
    }

    #[test]
    fn and_with_non_object_member_is_a_schema_error() {
        let schema = json!({ "$and": [{ "valueA": "string" }, "string"] });
        assert!(matches!(
            validate(&schema, &json!({ "valueA": "x" })),
            Err(SchemaError::AndMemberNotObject(_))
        ));
    }

    #[test]
    fn unknown_validators_are_schema_errors() {
        assert!(matches!(
            validate(&json!({ "myValue": "bigFlout" }), &json!({ "myValue": 2 })),
            Err(SchemaError::UnknownValidator(_))
        ));
        assert!(matches!(
            validate(&json!({ "$whatever": "bigFloat" }), &json!({})),
            Err(SchemaError::UnknownValidator(_))
        ));
        assert!(matches!(
            validate(&json!({ "myValue": [] }), &json!({ "myValue": 2 })),
            Err(SchemaError::EmptyUnion)
        ));
    }

    #[test]
    fn key_of_validates_against_keys_in_the_data() {
        let schema = json!({
            "keyA": "number",
            "keyB": "number",
            "myRes": { "$map": "string", "key": { "$keyOf": [] } }
        });
        assert!(check(
            schema.clone(),
            json!({ "keyA": 1, "keyB": 2, "myRes": { "keyA": "x" } })
        )
        .passed());
        assert!(!check(
            schema,
            json!({ "keyA": 1, "keyB": 2, "myRes": { "somewhereElse": "x" } })
        )
        .passed());
    }

    #[test]
    fn key_of_with_value_type_checks_the_referenced_entry() {
        let schema = json!({
            "numbers": { "$map": "number" },
            "pick": { "$keyOf": ["numbers"], "valueType": { "$number": { "min": 10 } } }
        });
        assert!(check(schema.clone(), json!({ "numbers": { "big": 11 }, "pick": "big" })).passed());
        assert!(!check(schema, json!({ "numbers": { "small": 2 }, "pick": "small" })).passed());
    }

    #[test]
    fn key_of_fails_when_the_path_has_no_keys() {
        let schema = json!({ "empty": { "$map": "string", "minLength": 0 }, "pick": ["?", { "$keyOf": ["empty"] }] });
        assert!(!check(schema, json!({ "empty": {}, "pick": "anything" })).passed());
    }

    #[test]
    fn property_path_walks_the_validated_data() {
        let schema = json!({
            "a": { "b": { "c": "string" } },
            "path": { "$propertyPath": {} }
        });
        assert!(check(
            schema.clone(),
            json!({ "a": { "b": { "c": "x" } }, "path": ["a", "b", "c"] })
        )
        .passed());
        assert!(!check(
            schema.clone(),
            json!({ "a": { "b": { "c": "x" } }, "path": ["a", "nope"] })
        )
        .passed());
        assert!(!check(schema, json!({ "a": { "b": { "c": "x" } }, "path": "a.b.c" })).passed());
    }

    #[test]
    fn property_path_only_objects_rejects_leaf_terminals() {
        let schema = json!({
            "a": { "b": { "c": "string" } },
            "path": { "$propertyPath": { "onlyObjects": true } }
        });
        assert!(check(
            schema.clone(),
            json!({ "a": { "b": { "c": "x" } }, "path": ["a", "b"] })
        )
        .passed());
        assert!(!check(
            schema,
            json!({ "a": { "b": { "c": "x" } }, "path": ["a", "b", "c"] })
        )
        .passed());
    }

    #[test]
    fn diagnostics_redact_object_values() {
        let result = check(json!("string"), json!({ "big": "payload" }));
        let Diagnostic::Leaf { value, .. } = &result.output else {
            panic!("expected a leaf");
        };
        assert_eq!(value, &json!("[object omitted]"));
    }

    #[test]
    fn diagnostic_serialization_shapes() {
        let result = check(json!({ "num": "number" }), json!({ "num": "abc" }));
        let serialized = serde_json::to_value(&result).unwrap();
        assert_eq!(serialized["result"], "fail");
        assert_eq!(serialized["output"]["error"], "objectResult");
        assert_eq!(serialized["output"]["errorCount"], 1);
        assert_eq!(
            serialized["output"]["objectResults"]["num"]["error"],
            "Value is not a number"
        );

        let passed = check(json!({ "num": "number" }), json!({ "num": 1 }));
        assert_eq!(serde_json::to_value(&passed).unwrap()["output"], json!(null));
    }
}
