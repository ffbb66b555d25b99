//! Static depth analysis.
//!
//! [`min_termination_depth`] answers: starting from this node, how many more
//! levels of nesting does the smallest possible value require? The generator
//! uses it past the soft depth limit to steer union choices toward the branch
//! that can finish soonest.

use crate::schema::{classify, combine_and, Node, Scope, SchemaError, SimpleKind};
use serde_json::Value;

/// Recursion guard. A chain of references deeper than this is treated as
/// unterminating and reported as this ceiling, which no finite branch beats.
pub const DEPTH_GUARD: usize = 99;

pub fn min_termination_depth(
    schema: &Value,
    scope: &Scope<'_>,
    guard: usize,
) -> Result<usize, SchemaError> {
    if guard > DEPTH_GUARD {
        return Ok(DEPTH_GUARD);
    }
    let scope = scope.enter(schema);

    let depth = match classify(schema)? {
        Node::Simple(SimpleKind::Optional) => 0,
        Node::Simple(_)
        | Node::Enum(_)
        | Node::Literal(_)
        | Node::Number { .. }
        | Node::StringConstraint { .. }
        | Node::KeyOf { .. }
        | Node::PropertyPath { .. } => 0,
        Node::CustomRef(name) => match scope.get(name) {
            Some(resolved) => min_termination_depth(resolved, &scope, guard + 1)?,
            None => return Err(SchemaError::UnknownValidator(name.to_string())),
        },
        Node::Union(alternatives) => {
            let mut best = DEPTH_GUARD;
            for alternative in alternatives {
                best = best.min(min_termination_depth(alternative, &scope, guard + 1)?);
            }
            best
        }
        Node::Object(map) => {
            let mut deepest = 0;
            for (_, property) in crate::schema::object_properties(map) {
                deepest = deepest.max(min_termination_depth(property, &scope, guard + 1)?);
            }
            1 + deepest
        }
        Node::Array {
            element,
            min_length,
            ..
        } => {
            // An empty array terminates immediately when allowed.
            if min_length.unwrap_or(0) == 0 {
                0
            } else {
                1 + min_termination_depth(element, &scope, guard + 1)?
            }
        }
        Node::Map {
            value,
            key_specific,
            min_length,
            ..
        } => {
            if min_length.unwrap_or(0) == 0 && key_specific.is_none() {
                0
            } else {
                1 + min_termination_depth(value, &scope, guard + 1)?
            }
        }
        Node::Tuple(members) => {
            let mut deepest = 0;
            for member in members {
                deepest = deepest.max(min_termination_depth(member, &scope, guard + 1)?);
            }
            1 + deepest
        }
        Node::Meta(inner) => min_termination_depth(inner, &scope, guard + 1)?,
        Node::And(members) => {
            let merged = combine_and(members, &scope)?;
            let merged = Value::Object(merged);
            min_termination_depth(&merged, &scope, guard + 1)?
        }
    };
    Ok(depth.min(DEPTH_GUARD))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn depth_of(schema: Value) -> usize {
        let scope = Scope::root().enter(&schema);
        min_termination_depth(&schema, &scope, 0).unwrap()
    }

    #[test]
    fn leaves_terminate_immediately() {
        assert_eq!(depth_of(json!("string")), 0);
        assert_eq!(depth_of(json!("?")), 0);
        assert_eq!(depth_of(json!({ "$enum": ["a"] })), 0);
        assert_eq!(depth_of(json!({ "$number": { "min": 1 } })), 0);
    }

    #[test]
    fn objects_add_one_level_over_their_deepest_member() {
        assert_eq!(depth_of(json!({})), 1);
        assert_eq!(depth_of(json!({ "a": "string" })), 1);
        assert_eq!(depth_of(json!({ "a": { "b": "string" } })), 2);
    }

    #[test]
    fn unbounded_arrays_can_terminate_as_empty() {
        assert_eq!(depth_of(json!({ "$array": { "a": "string" } })), 0);
        assert_eq!(
            depth_of(json!({ "$array": { "a": "string" }, "minLength": 1 })),
            2
        );
    }

    #[test]
    fn unions_take_the_cheapest_branch() {
        let schema = json!({
            "$types": { "$tree": { "value": "string", "next": ["?", "$tree"] } },
            "$type": "$tree"
        });
        // The `?` branch lets each node terminate after its own level.
        assert_eq!(depth_of(schema), 1);
    }

    #[test]
    fn ill_founded_recursion_saturates_at_the_guard() {
        let schema = json!({
            "$types": { "$loop": { "next": "$loop" } },
            "$type": "$loop"
        });
        assert_eq!(depth_of(schema), DEPTH_GUARD);
    }
}
