//! Type-signature deriver.
//!
//! Renders a schema as the TypeScript-style type its valid values inhabit.
//! Constraints vanish (`$string` bounds become plain `string`, `integer`
//! becomes `number`), custom types are expanded inline, and recursion bottoms
//! out as `any` past a fixed depth.

use crate::schema::{
    classify, combine_and, object_properties, Node, Scope, SchemaError, SimpleKind,
};
use serde_json::{Map, Value};

/// Expansion depth at which recursive custom types collapse to `any`.
const TYPE_DEPTH_CEILING: usize = 32;

pub fn derive_type(schema: &Value) -> Result<String, SchemaError> {
    type_of(schema, &Scope::root(), 0)
}

fn type_of(schema: &Value, scope: &Scope<'_>, depth: usize) -> Result<String, SchemaError> {
    if depth > TYPE_DEPTH_CEILING {
        return Ok("any".into());
    }
    let scope = scope.enter(schema);

    match classify(schema)? {
        Node::Simple(kind) => Ok(simple_type(kind).into()),
        Node::CustomRef(name) => match scope.get(name) {
            Some(resolved) => type_of(resolved, &scope, depth + 1),
            None => Err(SchemaError::UnknownValidator(name.to_string())),
        },
        Node::Union(alternatives) => {
            let parts = alternatives
                .iter()
                .map(|alt| type_of(alt, &scope, depth + 1))
                .collect::<Result<Vec<String>, SchemaError>>()?;
            Ok(parts.join(" | "))
        }
        Node::Object(map) => object_type(map, &scope, depth),
        Node::Array { element, .. } => {
            let inner = type_of(element, &scope, depth + 1)?;
            let needs_parens = matches!(element, Value::Array(alts) if alts.len() > 1)
                || inner.contains('|');
            Ok(if needs_parens {
                format!("({inner})[]")
            } else {
                format!("{inner}[]")
            })
        }
        Node::Map {
            value, key_specific, ..
        } => {
            let base = format!("{{ [key: string] : {}}}", type_of(value, &scope, depth + 1)?);
            match key_specific {
                None => Ok(base),
                Some(specific) => {
                    let resolved = crate::schema::resolve_indirection(specific, &scope)?;
                    let Node::Object(specific_map) = classify(resolved)? else {
                        return Err(SchemaError::InvalidKeySpecificType(
                            serde_json::to_string(resolved).unwrap_or_default(),
                        ));
                    };
                    Ok(format!(
                        "{base} & {}",
                        object_type(specific_map, &scope, depth)?
                    ))
                }
            }
        }
        Node::Enum(words) => Ok(words
            .iter()
            .map(|word| format!("\"{word}\""))
            .collect::<Vec<String>>()
            .join(" | ")),
        Node::Literal(value) => Ok(literal_type(value)),
        Node::Tuple(members) => {
            let parts = members
                .iter()
                .map(|member| type_of(member, &scope, depth + 1))
                .collect::<Result<Vec<String>, SchemaError>>()?;
            Ok(format!("[{}]", parts.join(", ")))
        }
        Node::Number { .. } => Ok("number".into()),
        Node::StringConstraint { .. } => Ok("string".into()),
        Node::Meta(inner) => type_of(inner, &scope, depth + 1),
        Node::And(members) => {
            let merged = combine_and(members, &scope)?;
            object_type(&merged, &scope, depth)
        }
        // Key references are plain strings at the type level; paths are
        // segment lists.
        Node::KeyOf { .. } => Ok("string".into()),
        Node::PropertyPath { .. } => Ok("string[]".into()),
    }
}

fn simple_type(kind: SimpleKind) -> &'static str {
    match kind {
        SimpleKind::String => "string",
        SimpleKind::Number | SimpleKind::Integer => "number",
        SimpleKind::Boolean => "boolean",
        SimpleKind::Null => "null",
        SimpleKind::Optional => "undefined",
        SimpleKind::Any => "any",
    }
}

fn literal_type(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{s}\""),
        other => serde_json::to_string(other).unwrap_or_else(|_| "never".into()),
    }
}

/// `?` anywhere in a member's schema marks the member optional.
fn contains_optional(schema: &Value) -> bool {
    match schema {
        Value::String(word) => word == "?",
        Value::Array(alternatives) => alternatives.iter().any(|alt| alt == "?"),
        _ => false,
    }
}

fn object_type(
    map: &Map<String, Value>,
    scope: &Scope<'_>,
    depth: usize,
) -> Result<String, SchemaError> {
    let mut parts = Vec::new();
    let mut all_optional = true;
    for (key, member) in object_properties(map) {
        let optional = contains_optional(member);
        all_optional &= optional;
        let postfix = if optional { "?" } else { "" };
        parts.push(format!(
            "{key}{postfix}: {}",
            type_of(member, scope, depth + 1)?
        ));
    }
    let body = format!("{{ {} }}", parts.join("; "));
    Ok(if all_optional {
        format!("{body} | undefined")
    } else {
        body
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn derive(schema: Value) -> String {
        derive_type(&schema).expect("schema is well formed")
    }

    #[test]
    fn simple_types() {
        assert_eq!(derive(json!("?")), "undefined");
        assert_eq!(derive(json!("null")), "null");
        assert_eq!(derive(json!("any")), "any");
        assert_eq!(derive(json!("boolean")), "boolean");
        assert_eq!(derive(json!("number")), "number");
        assert_eq!(derive(json!("integer")), "number");
        assert_eq!(derive(json!("string")), "string");
    }

    #[test]
    fn union_types() {
        assert_eq!(derive(json!(["?", "boolean"])), "undefined | boolean");
        assert_eq!(derive(json!(["any", "number"])), "any | number");
        assert_eq!(
            derive(json!(["integer", "boolean", "string", "?"])),
            "number | boolean | string | undefined"
        );
    }

    #[test]
    fn objects_of_simple_types() {
        let schema = json!({
            "string": "string",
            "number": "number",
            "any": "any",
            "optional": "?",
            "boolean": "boolean",
            "integer": "integer"
        });
        assert_eq!(
            derive(schema),
            "{ string: string; number: number; any: any; \
             optional?: undefined; boolean: boolean; integer: number }"
        );
    }

    #[test]
    fn array_types_parenthesize_unions() {
        let schema = json!({
            "stringOrNumber": { "$array": ["string", "number"] },
            "objArray": { "$array": { "hello": "string", "world": "number" } }
        });
        assert_eq!(
            derive(schema),
            "{ stringOrNumber: (string | number)[]; \
             objArray: { hello: string; world: number }[] }"
        );
    }

    #[test]
    fn enum_types() {
        assert_eq!(
            derive(json!({ "$enum": ["lorem", "ipsum", "santa", "domine"] })),
            "\"lorem\" | \"ipsum\" | \"santa\" | \"domine\""
        );
        assert_eq!(
            derive(json!({ "$array": { "$enum": ["lorem", "ipsum"] } })),
            "(\"lorem\" | \"ipsum\")[]"
        );
    }

    #[test]
    fn all_optional_objects_union_with_undefined() {
        let schema = json!({
            "prop1": ["?", "string"],
            "prop2": ["?", "number"]
        });
        assert_eq!(
            derive(schema),
            "{ prop1?: undefined | string; prop2?: undefined | number } | undefined"
        );
    }

    #[test]
    fn constraints_are_erased() {
        assert_eq!(derive(json!({ "$string": { "minLength": 4, "maxLength": 16 } })), "string");
        assert_eq!(derive(json!({ "$number": { "min": 3, "max": 9 } })), "number");
    }

    #[test]
    fn map_types() {
        assert_eq!(derive(json!({ "$map": "number" })), "{ [key: string] : number}");
        assert_eq!(
            derive(json!({ "$map": ["number", "string"] })),
            "{ [key: string] : number | string}"
        );
        assert_eq!(
            derive(json!({ "$map": ["number", { "$array": ["string", "?"] }] })),
            "{ [key: string] : number | (string | undefined)[]}"
        );
    }

    #[test]
    fn map_key_specific_types_intersect() {
        assert_eq!(
            derive(json!({ "$map": "string", "keySpecificType": { "a": "number", "x": "string" } })),
            "{ [key: string] : string} & { a: number; x: string }"
        );
    }

    #[test]
    fn custom_types_expand_inline() {
        let schema = json!({
            "$types": { "$person": { "name": "string", "height": "number" } },
            "string": "string",
            "person": "$person",
            "number": "number"
        });
        assert_eq!(
            derive(schema),
            "{ string: string; person: { name: string; height: number }; number: number }"
        );
    }

    #[test]
    fn escaped_dollar_keys_lose_the_escape() {
        assert_eq!(
            derive(json!({ "myNumber": "number", "\\$escapedDollar": "string" })),
            "{ myNumber: number; $escapedDollar: string }"
        );
    }

    #[test]
    fn literal_types() {
        assert_eq!(derive(json!({ "literalProp": { "$literal": "doge" } })), "{ literalProp: \"doge\" }");
        assert_eq!(derive(json!({ "$literal": 42 })), "42");
        assert_eq!(derive(json!({ "$literal": true })), "true");
    }

    #[test]
    fn tuple_types() {
        assert_eq!(
            derive(json!({ "tupleProp": { "$tuple": ["string", "number", { "innerObject": "number" }] } })),
            "{ tupleProp: [string, number, { innerObject: number }] }"
        );
    }

    #[test]
    fn key_of_is_a_string_at_the_type_level() {
        assert_eq!(
            derive(json!({ "keyOfProp": { "$keyOf": ["somewhere"] } })),
            "{ keyOfProp: string }"
        );
    }

    #[test]
    fn property_paths_are_string_arrays() {
        assert_eq!(derive(json!({ "$propertyPath": {} })), "string[]");
    }

    #[test]
    fn and_renders_the_merged_object() {
        let schema = json!({
            "$types": {
                "$myObject": { "value": "string" },
                "$otherObject": { "num": "number" },
                "$myMetaObject": { "value2": "string" }
            },
            "$and": [{ "valueA": "string" }, "$myObject", "$myMetaObject", "$otherObject"]
        });
        assert_eq!(
            derive(schema),
            "{ valueA: string; value: string; value2: string; num: number }"
        );
    }

    #[test]
    fn invalid_and_errors() {
        let schema = json!({ "$and": [{ "valueA": "string" }, "myObject"] });
        assert!(derive_type(&schema).is_err());
    }

    #[test]
    fn unknown_types_error() {
        assert!(derive_type(&json!({ "$stringss": { "minLength": 77 } })).is_err());
        assert!(derive_type(&json!({ "something": "magicRune" })).is_err());
    }

    #[test]
    fn recursive_types_collapse_to_any_at_the_ceiling() {
        let schema = json!({
            "$types": { "$tree": { "value": "string", "left": ["?", "$tree"], "right": ["?", "$tree"] } },
            "root": "$tree"
        });
        let derived = derive(schema);
        assert!(derived.contains("any"));
    }

    #[test]
    fn deriving_is_deterministic() {
        let schema = json!({
            "$types": { "$id": { "$string": { "regex": "[a-f0-9]+" } } },
            "id": "$id",
            "tags": { "$array": { "$enum": ["a", "b"] } },
            "meta": ["?", { "$map": "string" }]
        });
        assert_eq!(derive(schema.clone()), derive(schema));
    }
}
