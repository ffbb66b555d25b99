//! Schema value model.
//!
//! Schemas are plain `serde_json::Value` documents using reserved `$`-prefixed
//! keys. Rather than scattering duck-typed predicate checks through every
//! engine, [`classify`] computes a closed [`Node`] tag once per node; the
//! engines match on it exhaustively. Custom types declared in `$types` blocks
//! are carried down the traversal in a [`Scope`] (lexical: inner blocks shadow
//! outer names).

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Errors in the schema itself (the author's mistake, never the data's).
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unknown validator: {0}")]
    UnknownValidator(String),

    #[error("one of type needs at least one type")]
    EmptyUnion,

    #[error("$and must only contain objects, got: {0}")]
    AndMemberNotObject(String),

    #[error("invalid keySpecificType reference: {0}")]
    InvalidKeySpecificType(String),

    #[error("invalid regex `{pattern}`: {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("malformed {key} node: {detail}")]
    Malformed { key: &'static str, detail: String },

    #[error("failed to parse schema JSON: {0}")]
    Parse(String),
}

// ————————————————————————————————————————————————————————————————————————————
// CLASSIFICATION
// ————————————————————————————————————————————————————————————————————————————

/// The seven built-in leaf kinds a bare string can denote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleKind {
    String,
    Boolean,
    Number,
    Integer,
    Null,
    /// The `?` optional/undefined marker.
    Optional,
    Any,
}

impl SimpleKind {
    pub fn parse(word: &str) -> Option<Self> {
        match word {
            "string" => Some(Self::String),
            "boolean" => Some(Self::Boolean),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "null" => Some(Self::Null),
            "?" => Some(Self::Optional),
            "any" => Some(Self::Any),
            _ => None,
        }
    }
}

/// Closed structural tag for one schema node. Borrows from the schema value.
#[derive(Debug, Clone)]
pub enum Node<'a> {
    Simple(SimpleKind),
    /// A string that is not a reserved word: resolved against the scope.
    CustomRef(&'a str),
    /// A JSON array of alternatives. Non-empty by construction.
    Union(&'a Vec<Value>),
    /// A plain object: property name → schema. `$types` is not a property.
    Object(&'a Map<String, Value>),
    Array {
        element: &'a Value,
        min_length: Option<usize>,
        max_length: Option<usize>,
    },
    Map {
        value: &'a Value,
        key: Option<&'a Value>,
        key_specific: Option<&'a Value>,
        min_length: Option<usize>,
        max_length: Option<usize>,
    },
    Enum(Vec<&'a str>),
    Literal(&'a Value),
    Tuple(&'a Vec<Value>),
    Number {
        min: Option<f64>,
        max: Option<f64>,
        integer: bool,
    },
    StringConstraint {
        min_length: Option<usize>,
        max_length: Option<usize>,
        regex: Option<&'a str>,
    },
    /// The `$type` wrapper, transparent apart from attaching metadata.
    Meta(&'a Value),
    And(&'a Vec<Value>),
    KeyOf {
        path: Vec<&'a str>,
        value_type: Option<&'a Value>,
    },
    PropertyPath {
        only_objects: bool,
    },
}

/// Reserved keys that decide a node kind, in discrimination order.
const RESERVED: &[&str] = &[
    "$enum",
    "$array",
    "$map",
    "$string",
    "$number",
    "$type",
    "$and",
    "$literal",
    "$tuple",
    "$keyOf",
    "$propertyPath",
];

fn node_json(schema: &Value) -> String {
    serde_json::to_string(schema).unwrap_or_else(|_| "<unprintable>".into())
}

fn length_bound(map: &Map<String, Value>, key: &str) -> Option<usize> {
    map.get(key).and_then(Value::as_u64).map(|n| n as usize)
}

/// Decide which node kind an arbitrary schema value is.
///
/// A node-level `$types` block is ignored here; callers extract it with
/// [`Scope::enter`] before classifying.
pub fn classify(schema: &Value) -> Result<Node<'_>, SchemaError> {
    match schema {
        Value::String(word) => Ok(match SimpleKind::parse(word) {
            Some(kind) => Node::Simple(kind),
            None => Node::CustomRef(word),
        }),
        Value::Array(alternatives) => {
            if alternatives.is_empty() {
                return Err(SchemaError::EmptyUnion);
            }
            Ok(Node::Union(alternatives))
        }
        Value::Object(map) => classify_object(schema, map),
        other => Err(SchemaError::UnknownValidator(node_json(other))),
    }
}

fn classify_object<'a>(
    schema: &'a Value,
    map: &'a Map<String, Value>,
) -> Result<Node<'a>, SchemaError> {
    let tags: Vec<&str> = RESERVED
        .iter()
        .copied()
        .filter(|key| map.contains_key(*key))
        .collect();
    if tags.len() > 1 {
        return Err(SchemaError::Malformed {
            key: "schema",
            detail: format!("ambiguous node, multiple reserved keys: {}", tags.join(", ")),
        });
    }

    let Some(tag) = tags.first().copied() else {
        // No reserved key at all: a plain object, unless some other
        // `$`-prefixed key sneaked in ($types and escaped keys aside).
        if map
            .keys()
            .any(|k| k.starts_with('$') && k != "$types")
        {
            return Err(SchemaError::UnknownValidator(node_json(schema)));
        }
        return Ok(Node::Object(map));
    };

    // Unreserved `$`-keys next to the tag are a hard error too.
    if map
        .keys()
        .any(|k| k.starts_with('$') && k.as_str() != tag && k != "$types")
    {
        return Err(SchemaError::UnknownValidator(node_json(schema)));
    }

    match tag {
        "$enum" => {
            let Some(items) = map.get("$enum").and_then(Value::as_array) else {
                return Err(SchemaError::Malformed {
                    key: "$enum",
                    detail: "expected an array of strings".into(),
                });
            };
            let mut words = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(word) => words.push(word),
                    None => {
                        return Err(SchemaError::Malformed {
                            key: "$enum",
                            detail: format!("non-string member: {}", node_json(item)),
                        });
                    }
                }
            }
            Ok(Node::Enum(words))
        }
        "$array" => Ok(Node::Array {
            element: &map["$array"],
            min_length: length_bound(map, "minLength"),
            max_length: length_bound(map, "maxLength"),
        }),
        "$map" => Ok(Node::Map {
            value: &map["$map"],
            key: map.get("key"),
            key_specific: map.get("keySpecificType"),
            min_length: length_bound(map, "minLength"),
            max_length: length_bound(map, "maxLength"),
        }),
        "$string" => {
            let Some(body) = map.get("$string").and_then(Value::as_object) else {
                return Err(SchemaError::Malformed {
                    key: "$string",
                    detail: "expected an object".into(),
                });
            };
            Ok(Node::StringConstraint {
                min_length: length_bound(body, "minLength"),
                max_length: length_bound(body, "maxLength"),
                regex: body.get("regex").and_then(Value::as_str),
            })
        }
        "$number" => {
            let Some(body) = map.get("$number").and_then(Value::as_object) else {
                return Err(SchemaError::Malformed {
                    key: "$number",
                    detail: "expected an object".into(),
                });
            };
            Ok(Node::Number {
                min: body.get("min").and_then(Value::as_f64),
                max: body.get("max").and_then(Value::as_f64),
                integer: body.get("integer").and_then(Value::as_bool).unwrap_or(false),
            })
        }
        "$type" => Ok(Node::Meta(&map["$type"])),
        "$and" => {
            let Some(members) = map.get("$and").and_then(Value::as_array) else {
                return Err(SchemaError::Malformed {
                    key: "$and",
                    detail: "expected an array".into(),
                });
            };
            Ok(Node::And(members))
        }
        "$literal" => Ok(Node::Literal(&map["$literal"])),
        "$tuple" => {
            let Some(members) = map.get("$tuple").and_then(Value::as_array) else {
                return Err(SchemaError::Malformed {
                    key: "$tuple",
                    detail: "expected an array".into(),
                });
            };
            Ok(Node::Tuple(members))
        }
        "$keyOf" => {
            let Some(segments) = map.get("$keyOf").and_then(Value::as_array) else {
                return Err(SchemaError::Malformed {
                    key: "$keyOf",
                    detail: "expected an array of path segments".into(),
                });
            };
            let mut path = Vec::with_capacity(segments.len());
            for segment in segments {
                match segment.as_str() {
                    Some(s) => path.push(s),
                    None => {
                        return Err(SchemaError::Malformed {
                            key: "$keyOf",
                            detail: format!("non-string path segment: {}", node_json(segment)),
                        });
                    }
                }
            }
            Ok(Node::KeyOf {
                path,
                value_type: map.get("valueType"),
            })
        }
        "$propertyPath" => {
            let only_objects = map
                .get("$propertyPath")
                .and_then(Value::as_object)
                .and_then(|body| body.get("onlyObjects"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Ok(Node::PropertyPath { only_objects })
        }
        _ => unreachable!("tag is drawn from RESERVED"),
    }
}

/// Strip the leading escape from `\$...` property names. Schema authors must
/// escape literal `$`-prefixed data keys so they don't collide with reserved
/// keys; a backslash before anything else is an ordinary key character.
pub fn unescape_key(raw: &str) -> &str {
    if raw.starts_with("\\$") {
        &raw[1..]
    } else {
        raw
    }
}

/// Iterate a plain object's properties as `(data key, schema)`, skipping the
/// `$types` block.
pub fn object_properties<'a>(
    map: &'a Map<String, Value>,
) -> impl Iterator<Item = (&'a str, &'a Value)> {
    map.iter()
        .filter(|(key, _)| key.as_str() != "$types")
        .map(|(key, schema)| (unescape_key(key), schema))
}

// ————————————————————————————————————————————————————————————————————————————
// CUSTOM-TYPE SCOPE
// ————————————————————————————————————————————————————————————————————————————

/// The set of custom-type names visible at a point in the traversal.
#[derive(Debug, Clone, Default)]
pub struct Scope<'a> {
    types: IndexMap<&'a str, &'a Value>,
}

impl<'a> Scope<'a> {
    pub fn root() -> Self {
        Self::default()
    }

    /// Extend the scope with a node's `$types` block, if it has one. Inner
    /// declarations shadow outer ones of the same name.
    pub fn enter(&self, schema: &'a Value) -> Self {
        let Some(types) = schema.get("$types").and_then(Value::as_object) else {
            return self.clone();
        };
        let mut merged = self.types.clone();
        for (name, ty) in types {
            merged.insert(name.as_str(), ty);
        }
        Scope { types: merged }
    }

    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.types.get(name).copied()
    }
}

/// Follow custom-type references and `$type` wrappers down to a concrete node.
pub fn resolve_indirection<'a>(
    schema: &'a Value,
    scope: &Scope<'a>,
) -> Result<&'a Value, SchemaError> {
    let mut current = schema;
    // Bounded: a reference chain longer than this is necessarily cyclic.
    for _ in 0..64 {
        match classify(current)? {
            Node::CustomRef(name) => match scope.get(name) {
                Some(resolved) => current = resolved,
                None => return Err(SchemaError::UnknownValidator(name.to_string())),
            },
            Node::Meta(inner) => current = inner,
            _ => return Ok(current),
        }
    }
    Err(SchemaError::Malformed {
        key: "schema",
        detail: "cyclic custom-type reference chain".into(),
    })
}

/// Shallow-merge the members of an `$and` node into one effective object.
/// Every member must resolve to a plain object; later members override
/// earlier properties of the same name.
pub fn combine_and(
    members: &[Value],
    scope: &Scope<'_>,
) -> Result<Map<String, Value>, SchemaError> {
    let mut merged = Map::new();
    for member in members {
        let resolved = resolve_indirection(member, scope)?;
        match classify(resolved)? {
            Node::Object(map) => {
                for (key, schema) in map {
                    if key == "$types" {
                        continue;
                    }
                    merged.insert(key.clone(), schema.clone());
                }
            }
            _ => return Err(SchemaError::AndMemberNotObject(node_json(resolved))),
        }
    }
    Ok(merged)
}

// ————————————————————————————————————————————————————————————————————————————
// REGEX CACHE + LOADING
// ————————————————————————————————————————————————————————————————————————————

static REGEX_CACHE: Lazy<Mutex<HashMap<String, regex::Regex>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Compile (or fetch) the regex for a schema pattern. Patterns are matched
/// unanchored and unicode-aware, the same semantics the validator promises.
pub fn compile_regex(pattern: &str) -> Result<regex::Regex, SchemaError> {
    let mut cache = REGEX_CACHE.lock().expect("regex cache poisoned");
    if let Some(compiled) = cache.get(pattern) {
        return Ok(compiled.clone());
    }
    let compiled = regex::Regex::new(pattern).map_err(|err| SchemaError::InvalidRegex {
        pattern: pattern.to_string(),
        message: err.to_string(),
    })?;
    cache.insert(pattern.to_string(), compiled.clone());
    Ok(compiled)
}

/// Parse a schema document from JSON text, with JSON-path context on parse
/// errors, and strip the cosmetic root `$schema` key. No structural checks;
/// callers wanting that validate the document against a schema-of-schemas.
pub fn load_schema_str(src: &str) -> Result<Value, SchemaError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    let value: Value = serde_path_to_error::deserialize(de).map_err(|err| {
        let path = err.path().to_string();
        SchemaError::Parse(format!("at JSON path {path} → {}", err.into_inner()))
    })?;
    Ok(load_schema(value))
}

/// Strip the root `$schema` metadata key from an already-parsed document.
pub fn load_schema(mut value: Value) -> Value {
    if let Some(map) = value.as_object_mut() {
        map.shift_remove("$schema");
    }
    value
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strings_classify_as_simple_or_custom_ref() {
        assert!(matches!(
            classify(&json!("string")),
            Ok(Node::Simple(SimpleKind::String))
        ));
        assert!(matches!(classify(&json!("?")), Ok(Node::Simple(SimpleKind::Optional))));
        assert!(matches!(classify(&json!("$tree")), Ok(Node::CustomRef("$tree"))));
    }

    #[test]
    fn empty_union_is_a_schema_error() {
        assert!(matches!(classify(&json!([])), Err(SchemaError::EmptyUnion)));
    }

    #[test]
    fn unknown_reserved_key_is_rejected() {
        let err = classify(&json!({ "$whatever": "bigFloat" })).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownValidator(_)));
    }

    #[test]
    fn ambiguous_node_is_rejected() {
        let err = classify(&json!({ "$array": "string", "$enum": ["a"] })).unwrap_err();
        assert!(matches!(err, SchemaError::Malformed { .. }));
    }

    #[test]
    fn plain_object_with_escaped_dollar_key_is_an_object() {
        let schema = json!({ "\\$escapedDollar": "string", "myNumber": "number" });
        let Node::Object(map) = classify(&schema).unwrap() else {
            panic!("expected an object node");
        };
        let keys: Vec<&str> = object_properties(map).map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["$escapedDollar", "myNumber"]);
    }

    #[test]
    fn only_dollar_escapes_are_stripped() {
        assert_eq!(unescape_key("\\$escapedDollar"), "$escapedDollar");
        assert_eq!(unescape_key("\\x"), "\\x");
        assert_eq!(unescape_key("plain"), "plain");
    }

    #[test]
    fn types_block_does_not_disturb_classification() {
        let schema = json!({ "$types": { "$x": "string" }, "a": "$x" });
        assert!(matches!(classify(&schema), Ok(Node::Object(_))));
        let scope = Scope::root().enter(&schema);
        assert_eq!(scope.get("$x"), Some(&json!("string")));
    }

    #[test]
    fn inner_types_shadow_outer_ones() {
        let outer = json!({ "$types": { "$x": "string", "$y": "number" } });
        let inner = json!({ "$types": { "$x": "boolean" } });
        let scope = Scope::root().enter(&outer).enter(&inner);
        assert_eq!(scope.get("$x"), Some(&json!("boolean")));
        assert_eq!(scope.get("$y"), Some(&json!("number")));
    }

    #[test]
    fn combine_and_merges_through_refs_and_meta() {
        let root = json!({
            "$types": {
                "$myObject": { "value": "string" },
                "$otherObject": { "num": "number" }
            }
        });
        let scope = Scope::root().enter(&root);
        let members = vec![
            json!({ "valueA": "string" }),
            json!("$myObject"),
            json!({ "$type": "$otherObject" }),
        ];
        let merged = combine_and(&members, &scope).unwrap();
        let keys: Vec<&String> = merged.keys().collect();
        assert_eq!(keys, vec!["valueA", "value", "num"]);
    }

    #[test]
    fn combine_and_rejects_non_objects() {
        let err = combine_and(&[json!({ "a": "string" }), json!("string")], &Scope::root())
            .unwrap_err();
        assert!(matches!(err, SchemaError::AndMemberNotObject(_)));
    }

    #[test]
    fn load_schema_strips_schema_key() {
        let loaded = load_schema_str(r#"{ "$schema": "draft", "a": "string" }"#).unwrap();
        assert_eq!(loaded, json!({ "a": "string" }));
    }
}
