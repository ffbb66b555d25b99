//! First generation phase: structural synthesis.
//!
//! Walks the schema top-down and builds a [`Draft`] tree. Anything that needs
//! to see the finished document (`$keyOf`, `$propertyPath`) is emitted as an
//! explicit pending placeholder for the resolution phase to fill in.
//!
//! Depth counts structural nesting only (object members, array items, map
//! entries, tuple positions). Reference and union hops keep the same depth but
//! carry a separate indirection budget so degenerate schemas cannot loop
//! without ever nesting.

use super::{Draft, GenerateError, KeySlot, Options, Prefer};
use crate::generate::depth::{min_termination_depth, DEPTH_GUARD};
use crate::generate::random::{RandomSource, RegexSynthesisError};
use crate::schema::{
    classify, combine_and, object_properties, resolve_indirection, unescape_key, Node, Scope,
    SchemaError, SimpleKind,
};
use serde_json::{Map, Value};

/// Spread cap for collection lengths so `maxLength: 100000` stays usable.
const SANE_MAXIMUM_SIZE: usize = 12;

/// Hops through refs, unions and `$type` wrappers allowed without any
/// structural nesting in between.
const MAX_INDIRECTION: usize = 64;

const ANY_CHOICES: &[&str] = &["number", "integer", "?", "string", "boolean"];

pub(super) fn draft(
    schema: &Value,
    scope: &Scope<'_>,
    options: &Options,
    rng: &mut RandomSource,
    depth: usize,
) -> Result<Option<Draft>, GenerateError> {
    draft_inner(schema, scope, options, rng, depth, 0)
}

fn draft_inner(
    schema: &Value,
    scope: &Scope<'_>,
    options: &Options,
    rng: &mut RandomSource,
    depth: usize,
    indirection: usize,
) -> Result<Option<Draft>, GenerateError> {
    if depth > options.max_depth_hard {
        return Err(GenerateError::MaxDepthExceeded(depth));
    }
    if indirection > MAX_INDIRECTION {
        return Err(GenerateError::MaxDepthExceeded(depth));
    }
    let scope = scope.enter(schema);

    match classify(schema)? {
        Node::Simple(kind) => simple(kind, options, rng),
        Node::CustomRef(name) => match scope.get(name) {
            Some(resolved) => draft_inner(resolved, &scope, options, rng, depth, indirection + 1),
            None => Err(GenerateError::Schema(SchemaError::UnknownValidator(
                name.to_string(),
            ))),
        },
        Node::Meta(inner) => draft_inner(inner, &scope, options, rng, depth, indirection + 1),
        Node::Union(alternatives) => {
            union(alternatives, &scope, options, rng, depth, indirection)
        }
        Node::Object(map) => object(map, &scope, options, rng, depth).map(Some),
        Node::Array {
            element,
            min_length,
            max_length,
        } => array(element, min_length, max_length, &scope, options, rng, depth).map(Some),
        Node::Map {
            value,
            key,
            key_specific,
            min_length,
            max_length,
        } => map_node(
            value,
            key,
            key_specific,
            min_length,
            max_length,
            &scope,
            options,
            rng,
            depth,
        )
        .map(Some),
        Node::Enum(words) => {
            let pick = words[rng.index(words.len())];
            Ok(Some(Draft::String(pick.to_string())))
        }
        Node::Literal(value) => Ok(Some(Draft::from_value(value))),
        Node::Tuple(members) => tuple(members, &scope, options, rng, depth),
        Node::Number { min, max, integer } => Ok(Some(number(min, max, integer, options, rng))),
        Node::StringConstraint {
            min_length,
            max_length,
            regex,
        } => constrained_string(min_length, max_length, regex, options, rng).map(Some),
        Node::And(members) => {
            let merged = combine_and(members, &scope)?;
            object(&merged, &scope, options, rng, depth).map(Some)
        }
        Node::KeyOf { path, value_type } => Ok(Some(Draft::PendingKeyOf {
            path: path.iter().map(|s| s.to_string()).collect(),
            value_type: value_type.cloned(),
        })),
        Node::PropertyPath { only_objects } => {
            Ok(Some(Draft::PendingPropertyPath { only_objects }))
        }
    }
}

fn simple(
    kind: SimpleKind,
    options: &Options,
    rng: &mut RandomSource,
) -> Result<Option<Draft>, GenerateError> {
    match kind {
        SimpleKind::Optional => Ok(None),
        SimpleKind::Null => Ok(Some(Draft::Null)),
        SimpleKind::Boolean => Ok(Some(Draft::Bool(rng.boolean()))),
        SimpleKind::String => Ok(Some(Draft::String(
            rng.alphanumeric_string(options.string_min_length, options.string_max_length),
        ))),
        SimpleKind::Number => Ok(Some(Draft::float(
            rng.number(options.number_min, options.number_max),
        ))),
        SimpleKind::Integer => Ok(Some(Draft::Int(
            rng.integer(options.number_min as i64, options.number_max as i64),
        ))),
        SimpleKind::Any => {
            let pick = ANY_CHOICES[rng.index(ANY_CHOICES.len())];
            simple(
                SimpleKind::parse(pick).unwrap_or(SimpleKind::Null),
                options,
                rng,
            )
        }
    }
}

fn is_optional_marker(schema: &Value) -> bool {
    matches!(classify(schema), Ok(Node::Simple(SimpleKind::Optional)))
}

/// Pick a union branch.
///
/// Up to the soft depth: honor the caller's preference, then choose uniformly.
/// Past it: take `?` outright when present, otherwise the branch whose
/// smallest value terminates soonest.
fn union(
    alternatives: &[Value],
    scope: &Scope<'_>,
    options: &Options,
    rng: &mut RandomSource,
    depth: usize,
    indirection: usize,
) -> Result<Option<Draft>, GenerateError> {
    if depth > options.max_depth_soft {
        if alternatives.iter().any(is_optional_marker) {
            return Ok(None);
        }
        let mut best_depth = DEPTH_GUARD + 1;
        let mut best: Vec<&Value> = Vec::new();
        for alternative in alternatives {
            let d = min_termination_depth(alternative, scope, 0)?;
            if d < best_depth {
                best_depth = d;
                best.clear();
            }
            if d == best_depth {
                best.push(alternative);
            }
        }
        if best_depth >= DEPTH_GUARD {
            // Every branch recurses forever.
            return Err(GenerateError::MaxDepthExceeded(depth));
        }
        let pick = best[rng.index(best.len())];
        return draft_inner(pick, scope, options, rng, depth, indirection + 1);
    }

    let preferred: Vec<&Value> = match options.prefer {
        Prefer::None => alternatives.iter().collect(),
        Prefer::Undefined => {
            if alternatives.iter().any(is_optional_marker) {
                return Ok(None);
            }
            alternatives.iter().collect()
        }
        Prefer::Defined => {
            let defined: Vec<&Value> = alternatives
                .iter()
                .filter(|a| !is_optional_marker(a))
                .collect();
            if defined.is_empty() {
                alternatives.iter().collect()
            } else {
                defined
            }
        }
    };
    let pick = preferred[rng.index(preferred.len())];
    draft_inner(pick, scope, options, rng, depth, indirection + 1)
}

fn object(
    map: &Map<String, Value>,
    scope: &Scope<'_>,
    options: &Options,
    rng: &mut RandomSource,
    depth: usize,
) -> Result<Draft, GenerateError> {
    let mut entries = Vec::new();
    for (key, property) in object_properties(map) {
        if let Some(value) = draft(property, scope, options, rng, depth + 1)? {
            entries.push((KeySlot::Fixed(key.to_string()), value));
        }
    }
    Ok(Draft::Object(entries))
}

/// Effective collection length. Past the soft depth the minimum is used so
/// recursion winds down; below it the spread is capped at
/// [`SANE_MAXIMUM_SIZE`].
fn collection_length(
    min_length: Option<usize>,
    max_length: Option<usize>,
    default_min: usize,
    default_max: usize,
    options: &Options,
    rng: &mut RandomSource,
    depth: usize,
) -> usize {
    let min = min_length.unwrap_or(default_min);
    let max = max_length.unwrap_or(default_max).max(min);
    if depth > options.max_depth_soft {
        return min;
    }
    let capped = max.min(min + SANE_MAXIMUM_SIZE);
    rng.length(min, capped)
}

fn array(
    element: &Value,
    min_length: Option<usize>,
    max_length: Option<usize>,
    scope: &Scope<'_>,
    options: &Options,
    rng: &mut RandomSource,
    depth: usize,
) -> Result<Draft, GenerateError> {
    let target = collection_length(
        min_length,
        max_length,
        options.array_min_length,
        options.array_max_length,
        options,
        rng,
        depth,
    );
    let mut items = Vec::with_capacity(target);
    // Optional-capable elements may come back absent; a few extra attempts
    // keep the requested length without risking a spin.
    let mut attempts = 0;
    while items.len() < target && attempts < target + 16 {
        attempts += 1;
        if let Some(item) = draft(element, scope, options, rng, depth + 1)? {
            items.push(item);
        }
    }
    Ok(Draft::Array(items))
}

#[allow(clippy::too_many_arguments)]
fn map_node(
    value_schema: &Value,
    key_schema: Option<&Value>,
    key_specific: Option<&Value>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    scope: &Scope<'_>,
    options: &Options,
    rng: &mut RandomSource,
    depth: usize,
) -> Result<Draft, GenerateError> {
    let mut entries: Vec<(KeySlot, Draft)> = Vec::new();

    if let Some(specific) = key_specific {
        let resolved = resolve_indirection(specific, scope)?;
        let Node::Object(specific_map) = classify(resolved)? else {
            return Err(GenerateError::Schema(SchemaError::InvalidKeySpecificType(
                serde_json::to_string(resolved).unwrap_or_default(),
            )));
        };
        for (raw_key, property) in specific_map {
            if raw_key == "$types" {
                continue;
            }
            if let Some(value) = draft(property, scope, options, rng, depth + 1)? {
                entries.push((KeySlot::Fixed(unescape_key(raw_key).to_string()), value));
            }
        }
    }

    let target = collection_length(
        min_length,
        max_length,
        options.map_min_length,
        options.map_max_length,
        options,
        rng,
        depth,
    );
    let wanted = target.saturating_sub(entries.len());

    for _ in 0..wanted {
        let key = match key_schema {
            None => match fresh_key(&entries, options, rng) {
                Some(key) => KeySlot::Fixed(key),
                None => break,
            },
            Some(key_schema) => match map_key(key_schema, &entries, scope, options, rng, depth)? {
                Some(slot) => slot,
                // The key space is exhausted; a shorter map beats duplicates.
                None => break,
            },
        };
        if let Some(value) = draft(value_schema, scope, options, rng, depth + 1)? {
            entries.push((key, value));
        }
    }

    Ok(Draft::Object(entries))
}

fn fresh_key(
    entries: &[(KeySlot, Draft)],
    options: &Options,
    rng: &mut RandomSource,
) -> Option<String> {
    for _ in 0..32 {
        let key = rng.alphanumeric_string(options.string_min_length, options.string_max_length);
        if !entries
            .iter()
            .any(|(slot, _)| matches!(slot, KeySlot::Fixed(existing) if existing == &key))
        {
            return Some(key);
        }
    }
    None
}

/// Generate one map key from an explicit `key` schema. `$keyOf` keys become
/// pending slots; anything else must synthesize a string.
fn map_key(
    key_schema: &Value,
    entries: &[(KeySlot, Draft)],
    scope: &Scope<'_>,
    options: &Options,
    rng: &mut RandomSource,
    depth: usize,
) -> Result<Option<KeySlot>, GenerateError> {
    let resolved = resolve_indirection(key_schema, scope)?;
    if let Node::KeyOf { path, value_type } = classify(resolved)? {
        return Ok(Some(KeySlot::PendingKeyOf {
            path: path.iter().map(|s| s.to_string()).collect(),
            value_type: value_type.cloned(),
        }));
    }

    for _ in 0..32 {
        let Some(candidate) = draft(resolved, scope, options, rng, depth)? else {
            continue;
        };
        let Draft::String(key) = candidate else {
            return Err(GenerateError::Schema(SchemaError::Malformed {
                key: "$map",
                detail: "key schema must produce strings".into(),
            }));
        };
        if !entries
            .iter()
            .any(|(slot, _)| matches!(slot, KeySlot::Fixed(existing) if existing == &key))
        {
            return Ok(Some(KeySlot::Fixed(key)));
        }
    }
    Ok(None)
}

/// Tuples generate position by position; the first absent member ends the
/// value, so optional positions only make sense as a trailing run.
fn tuple(
    members: &[Value],
    scope: &Scope<'_>,
    options: &Options,
    rng: &mut RandomSource,
    depth: usize,
) -> Result<Option<Draft>, GenerateError> {
    let mut items = Vec::with_capacity(members.len());
    for member in members {
        match draft(member, scope, options, rng, depth + 1)? {
            Some(item) => items.push(item),
            None => break,
        }
    }
    Ok(Some(Draft::Array(items)))
}

fn number(
    min: Option<f64>,
    max: Option<f64>,
    integer: bool,
    options: &Options,
    rng: &mut RandomSource,
) -> Draft {
    let min = min.unwrap_or(options.number_min);
    let max = max.unwrap_or(options.number_max).max(min);
    if integer {
        Draft::Int(rng.integer(min.ceil() as i64, max.floor() as i64))
    } else {
        Draft::float(rng.number(min, max))
    }
}

fn constrained_string(
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<&str>,
    options: &Options,
    rng: &mut RandomSource,
) -> Result<Draft, GenerateError> {
    let Some(pattern) = pattern else {
        let min = min_length.unwrap_or(options.string_min_length);
        let max = max_length
            .unwrap_or(options.string_max_length)
            .min(options.absolute_max_string_size)
            .max(min);
        return Ok(Draft::String(rng.alphanumeric_string(min, max)));
    };

    // Explicit length bounds stack on top of the pattern; retry until both
    // hold.
    for _ in 0..16 {
        let candidate = rng
            .regex_string(pattern, options.absolute_max_string_size)
            .map_err(|err| match err {
                RegexSynthesisError::Schema(inner) => GenerateError::Schema(inner),
                RegexSynthesisError::Exhausted { pattern, attempts } => {
                    GenerateError::RegexSynthesis { pattern, attempts }
                }
            })?;
        let length = candidate.chars().count();
        let long_enough = min_length.is_none_or(|min| length >= min);
        let short_enough = max_length.is_none_or(|max| length <= max);
        if long_enough && short_enough {
            return Ok(Draft::String(candidate));
        }
    }
    Err(GenerateError::RegexSynthesis {
        pattern: pattern.to_string(),
        attempts: 16,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(schema: Value, seed: u64) -> Option<Draft> {
        let scope = Scope::root().enter(&schema);
        let options = Options::default();
        let mut rng = RandomSource::from_seed(seed);
        draft(&schema, &scope, &options, &mut rng, 0).unwrap()
    }

    #[test]
    fn simple_kinds_produce_their_shapes() {
        assert!(matches!(run(json!("string"), 1), Some(Draft::String(_))));
        assert!(matches!(run(json!("boolean"), 1), Some(Draft::Bool(_))));
        assert!(matches!(run(json!("integer"), 1), Some(Draft::Int(_))));
        assert!(matches!(run(json!("null"), 1), Some(Draft::Null)));
        assert!(run(json!("?"), 1).is_none());
    }

    #[test]
    fn objects_omit_absent_members() {
        let Some(Draft::Object(entries)) = run(json!({ "gone": "?", "kept": "string" }), 1) else {
            panic!("expected an object draft");
        };
        assert_eq!(entries.len(), 1);
        assert!(matches!(&entries[0].0, KeySlot::Fixed(k) if k == "kept"));
    }

    #[test]
    fn key_of_and_property_path_become_pending() {
        assert!(matches!(
            run(json!({ "$keyOf": ["a"] }), 1),
            Some(Draft::PendingKeyOf { .. })
        ));
        assert!(matches!(
            run(json!({ "$propertyPath": {} }), 1),
            Some(Draft::PendingPropertyPath { only_objects: false })
        ));
    }

    #[test]
    fn map_key_of_keys_become_pending_slots() {
        let schema = json!({ "$map": "string", "key": { "$keyOf": [] }, "minLength": 1 });
        let Some(Draft::Object(entries)) = run(schema, 3) else {
            panic!("expected a map draft");
        };
        assert!(entries
            .iter()
            .all(|(slot, _)| matches!(slot, KeySlot::PendingKeyOf { .. })));
        assert!(!entries.is_empty());
    }

    #[test]
    fn map_keys_are_distinct() {
        let schema = json!({ "$map": "integer", "minLength": 8, "maxLength": 8 });
        let Some(Draft::Object(entries)) = run(schema, 4) else {
            panic!("expected a map draft");
        };
        let mut keys: Vec<&str> = entries
            .iter()
            .filter_map(|(slot, _)| match slot {
                KeySlot::Fixed(k) => Some(k.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(keys.len(), 8);
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), 8);
    }

    #[test]
    fn enum_member_keys_cap_the_map_size() {
        let schema = json!({
            "$map": "integer",
            "key": { "$enum": ["a", "b"] },
            "minLength": 5,
            "maxLength": 5
        });
        let Some(Draft::Object(entries)) = run(schema, 5) else {
            panic!("expected a map draft");
        };
        assert!(entries.len() <= 2);
    }

    #[test]
    fn hard_depth_rejects_ill_founded_schemas() {
        let schema = json!({
            "$types": { "$loop": { "next": "$loop" } },
            "$type": "$loop"
        });
        let scope = Scope::root().enter(&schema);
        let options = Options::default();
        let mut rng = RandomSource::from_seed(1);
        let err = draft(&schema, &scope, &options, &mut rng, 0).unwrap_err();
        assert!(matches!(err, GenerateError::MaxDepthExceeded(_)));
    }

    #[test]
    fn reference_cycles_without_structure_are_rejected() {
        let schema = json!({
            "$types": { "$u": ["$u"] },
            "$type": "$u"
        });
        let scope = Scope::root().enter(&schema);
        let options = Options::default();
        let mut rng = RandomSource::from_seed(1);
        let err = draft(&schema, &scope, &options, &mut rng, 0).unwrap_err();
        assert!(matches!(err, GenerateError::MaxDepthExceeded(_)));
    }

    #[test]
    fn number_bounds_are_respected() {
        for seed in 0..16 {
            let Some(Draft::Int(n)) = run(
                json!({ "$number": { "min": 3, "max": 9, "integer": true } }),
                seed,
            ) else {
                panic!("expected an integer draft");
            };
            assert!((3..=9).contains(&n));
        }
    }

    #[test]
    fn string_bounds_stack_on_patterns() {
        for seed in 0..8 {
            let Some(Draft::String(s)) = run(
                json!({ "$string": { "regex": "a{2,5}", "minLength": 2, "maxLength": 5 } }),
                seed,
            ) else {
                panic!("expected a string draft");
            };
            assert!((2..=5).contains(&s.chars().count()), "{s:?}");
            assert!(s.chars().all(|c| c == 'a'));
        }
    }
}
