//! Data generator.
//!
//! Generation runs in two phases. Phase one ([`internal`]) synthesizes a
//! [`Draft`] tree structurally, leaving `$keyOf` and `$propertyPath` sites as
//! pending placeholders since they need the finished document. Phase two
//! repeatedly sweeps the draft, resolving placeholders against a snapshot of
//! the whole tree, until none remain; the resolved draft then folds into a
//! plain `serde_json::Value`.

mod depth;
mod internal;
mod random;

use crate::schema::{Scope, SchemaError};
use crate::validate::{validate, MAX_SAFE_INTEGER};
use random::RandomSource;
use serde_json::{Map, Number, Value};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("maximum generation depth exceeded at depth {0}: the schema cannot terminate")]
    MaxDepthExceeded(usize),

    #[error("could not synthesize a string for regex `{pattern}` after {attempts} attempts")]
    RegexSynthesis { pattern: String, attempts: usize },

    #[error("{0} placeholder(s) could not be resolved against the generated data")]
    UnresolvedPlaceholders(usize),
}

/// Tuning knobs for generation. Bounds written in the schema always win over
/// the defaults here.
#[derive(Debug, Clone)]
pub struct Options {
    pub array_min_length: usize,
    pub array_max_length: usize,
    pub map_min_length: usize,
    pub map_max_length: usize,
    pub number_min: f64,
    pub number_max: f64,
    pub string_min_length: usize,
    pub string_max_length: usize,
    /// Depth past which generation starts steering toward termination.
    pub max_depth_soft: usize,
    /// Depth at which generation gives up with an error.
    pub max_depth_hard: usize,
    pub prefer: Prefer,
    /// Upper bound on any synthesized string, pattern-derived ones included.
    pub absolute_max_string_size: usize,
    /// Fixed seed for reproducible output; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            array_min_length: 1,
            array_max_length: 16,
            map_min_length: 1,
            map_max_length: 16,
            number_min: -MAX_SAFE_INTEGER,
            number_max: MAX_SAFE_INTEGER,
            string_min_length: 3,
            string_max_length: 16,
            max_depth_soft: 4,
            max_depth_hard: 32,
            prefer: Prefer::None,
            absolute_max_string_size: 8192,
            seed: None,
        }
    }
}

/// How union branches involving `?` are picked below the soft depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Prefer {
    #[default]
    None,
    Defined,
    Undefined,
}

// ————————————————————————————————————————————————————————————————————————————
// DRAFT TREE
// ————————————————————————————————————————————————————————————————————————————

/// Intermediate value tree. Unlike `serde_json::Value`, map keys can still be
/// pending and placeholder leaves are explicit.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Draft {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Draft>),
    Object(Vec<(KeySlot, Draft)>),
    PendingKeyOf {
        path: Vec<String>,
        value_type: Option<Value>,
    },
    PendingPropertyPath {
        only_objects: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum KeySlot {
    Fixed(String),
    PendingKeyOf {
        path: Vec<String>,
        value_type: Option<Value>,
    },
}

impl Draft {
    pub(crate) fn float(n: f64) -> Self {
        Draft::Float(n)
    }

    pub(crate) fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Draft::Null,
            Value::Bool(b) => Draft::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Draft::Int(i),
                None => Draft::Float(n.as_f64().unwrap_or(0.0)),
            },
            Value::String(s) => Draft::String(s.clone()),
            Value::Array(items) => Draft::Array(items.iter().map(Self::from_value).collect()),
            Value::Object(map) => Draft::Object(
                map.iter()
                    .map(|(k, v)| (KeySlot::Fixed(k.clone()), Self::from_value(v)))
                    .collect(),
            ),
        }
    }

    /// Fold into a JSON value. `None` while any placeholder remains.
    fn to_value(&self) -> Option<Value> {
        match self {
            Draft::Null => Some(Value::Null),
            Draft::Bool(b) => Some(Value::Bool(*b)),
            Draft::Int(i) => Some(Value::Number((*i).into())),
            // Finite by construction; zero is an unreachable fallback.
            Draft::Float(f) => Some(Value::Number(
                Number::from_f64(*f).unwrap_or_else(|| 0.into()),
            )),
            Draft::String(s) => Some(Value::String(s.clone())),
            Draft::Array(items) => items
                .iter()
                .map(Draft::to_value)
                .collect::<Option<Vec<Value>>>()
                .map(Value::Array),
            Draft::Object(entries) => {
                let mut map = Map::new();
                for (slot, value) in entries {
                    let KeySlot::Fixed(key) = slot else {
                        return None;
                    };
                    map.insert(key.clone(), value.to_value()?);
                }
                Some(Value::Object(map))
            }
            Draft::PendingKeyOf { .. } | Draft::PendingPropertyPath { .. } => None,
        }
    }

    fn count_pending(&self) -> usize {
        match self {
            Draft::PendingKeyOf { .. } | Draft::PendingPropertyPath { .. } => 1,
            Draft::Array(items) => items.iter().map(Draft::count_pending).sum(),
            Draft::Object(entries) => entries
                .iter()
                .map(|(slot, value)| {
                    let key_pending = matches!(slot, KeySlot::PendingKeyOf { .. }) as usize;
                    key_pending + value.count_pending()
                })
                .sum(),
            _ => 0,
        }
    }

    fn has_pending(&self) -> bool {
        self.count_pending() > 0
    }

    /// Walk a data path through fixed object keys.
    fn lookup_path(&self, segments: &[String]) -> Option<&Draft> {
        let mut current = self;
        for segment in segments {
            let Draft::Object(entries) = current else {
                return None;
            };
            current = entries.iter().find_map(|(slot, value)| {
                matches!(slot, KeySlot::Fixed(key) if key == segment).then_some(value)
            })?;
        }
        Some(current)
    }

    fn lookup_path_mut(&mut self, segments: &[String]) -> Option<&mut Draft> {
        let mut current = self;
        for segment in segments {
            let Draft::Object(entries) = current else {
                return None;
            };
            current = entries.iter_mut().find_map(|(slot, value)| {
                matches!(slot, KeySlot::Fixed(key) if key == segment).then_some(value)
            })?;
        }
        Some(current)
    }

    fn finalize(self) -> Result<Value, GenerateError> {
        let pending = self.count_pending();
        match self.to_value() {
            Some(value) => Ok(value),
            None => Err(GenerateError::UnresolvedPlaceholders(pending)),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ENTRY POINTS
// ————————————————————————————————————————————————————————————————————————————

/// Generate a random document satisfying `schema`, with default [`Options`].
pub fn generate(schema: &Value) -> Result<Value, GenerateError> {
    generate_with(schema, &Options::default())
}

pub fn generate_with(schema: &Value, options: &Options) -> Result<Value, GenerateError> {
    let mut rng = match options.seed {
        Some(seed) => RandomSource::from_seed(seed),
        None => RandomSource::from_entropy(),
    };
    let scope = Scope::root().enter(schema);
    let Some(mut root) = internal::draft(schema, &scope, options, &mut rng, 0)? else {
        // The schema itself allowed absence; JSON has no undefined.
        return Ok(Value::Null);
    };
    resolve_pending(&mut root, schema, options, &mut rng)?;
    root.finalize()
}

// ————————————————————————————————————————————————————————————————————————————
// PHASE TWO: PLACEHOLDER RESOLUTION
// ————————————————————————————————————————————————————————————————————————————

const MAX_RESOLUTION_PASSES: usize = 10_000;

/// Address of one node in the draft tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Step {
    /// Value of the n-th object entry.
    Entry(usize),
    /// Key slot of the n-th object entry.
    EntryKey(usize),
    /// n-th array item.
    Item(usize),
}

#[derive(Debug)]
enum PendingTask {
    ValueKeyOf {
        steps: Vec<Step>,
        path: Vec<String>,
        value_type: Option<Value>,
    },
    KeyKeyOf {
        steps: Vec<Step>,
        path: Vec<String>,
        value_type: Option<Value>,
    },
    PropertyPath {
        steps: Vec<Step>,
        only_objects: bool,
    },
}

#[derive(Debug)]
enum Edit {
    SetValue { steps: Vec<Step>, value: Draft },
    SetKey { steps: Vec<Step>, key: String },
    RemoveEntry { steps: Vec<Step> },
    SetAtDataPath {
        path: Vec<String>,
        key: String,
        value: Draft,
    },
}

fn collect_pending(draft: &Draft, steps: &mut Vec<Step>, out: &mut Vec<PendingTask>) {
    match draft {
        Draft::PendingKeyOf { path, value_type } => out.push(PendingTask::ValueKeyOf {
            steps: steps.clone(),
            path: path.clone(),
            value_type: value_type.clone(),
        }),
        Draft::PendingPropertyPath { only_objects } => out.push(PendingTask::PropertyPath {
            steps: steps.clone(),
            only_objects: *only_objects,
        }),
        Draft::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                steps.push(Step::Item(index));
                collect_pending(item, steps, out);
                steps.pop();
            }
        }
        Draft::Object(entries) => {
            for (index, (slot, value)) in entries.iter().enumerate() {
                if let KeySlot::PendingKeyOf { path, value_type } = slot {
                    let mut key_steps = steps.clone();
                    key_steps.push(Step::EntryKey(index));
                    out.push(PendingTask::KeyKeyOf {
                        steps: key_steps,
                        path: path.clone(),
                        value_type: value_type.clone(),
                    });
                }
                steps.push(Step::Entry(index));
                collect_pending(value, steps, out);
                steps.pop();
            }
        }
        _ => {}
    }
}

fn value_mut<'a>(root: &'a mut Draft, steps: &[Step]) -> Option<&'a mut Draft> {
    let mut current = root;
    for step in steps {
        current = match (step, current) {
            (Step::Entry(index), Draft::Object(entries)) => &mut entries.get_mut(*index)?.1,
            (Step::Item(index), Draft::Array(items)) => items.get_mut(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Candidate keys at a `$keyOf` target, or `None` while the target is missing
/// or its own key set is not final yet.
fn candidate_keys(snapshot: &Draft, path: &[String]) -> Option<Vec<String>> {
    let Draft::Object(entries) = snapshot.lookup_path(path)? else {
        return None;
    };
    let mut keys = Vec::with_capacity(entries.len());
    for (slot, _) in entries {
        match slot {
            KeySlot::Fixed(key) => keys.push(key.clone()),
            KeySlot::PendingKeyOf { .. } => return None,
        }
    }
    Some(keys)
}

/// `valueType` constraints get validated in the root schema's type scope so
/// custom-type references inside them still resolve.
fn scoped_value_type(schema: &Value, value_type: &Value) -> Value {
    let mut wrapper = Map::new();
    if let Some(types) = schema.get("$types") {
        wrapper.insert("$types".into(), types.clone());
    }
    wrapper.insert("$type".into(), value_type.clone());
    Value::Object(wrapper)
}

/// Split candidates by whether the entry value at that key satisfies
/// `value_type`. `None` while any candidate value still has placeholders.
fn filter_by_value_type(
    snapshot: &Draft,
    path: &[String],
    candidates: &[String],
    value_type: &Value,
    schema: &Value,
) -> Result<Option<Vec<String>>, SchemaError> {
    let wrapped = scoped_value_type(schema, value_type);
    let mut passing = Vec::new();
    for key in candidates {
        let mut target_path = path.to_vec();
        target_path.push(key.clone());
        let Some(entry) = snapshot.lookup_path(&target_path) else {
            continue;
        };
        if entry.has_pending() {
            return Ok(None);
        }
        let Some(entry_value) = entry.to_value() else {
            return Ok(None);
        };
        if validate(&wrapped, &entry_value)?.passed() {
            passing.push(key.clone());
        }
    }
    Ok(Some(passing))
}

fn resolve_pending(
    root: &mut Draft,
    schema: &Value,
    options: &Options,
    rng: &mut RandomSource,
) -> Result<(), GenerateError> {
    let scope = Scope::root().enter(schema);

    for _ in 0..MAX_RESOLUTION_PASSES {
        let mut tasks = Vec::new();
        collect_pending(root, &mut Vec::new(), &mut tasks);
        if tasks.is_empty() {
            return Ok(());
        }

        let snapshot = root.clone();
        let mut edits: Vec<Edit> = Vec::new();
        // Keys claimed by sibling pendings within one pass, per parent object.
        let mut claimed: HashMap<Vec<Step>, HashSet<String>> = HashMap::new();

        for task in tasks {
            match task {
                PendingTask::ValueKeyOf {
                    steps,
                    path,
                    value_type,
                } => {
                    let Some(candidates) = candidate_keys(&snapshot, &path) else {
                        continue;
                    };
                    if candidates.is_empty() {
                        continue;
                    }
                    match &value_type {
                        None => {
                            let pick = candidates[rng.index(candidates.len())].clone();
                            edits.push(Edit::SetValue {
                                steps,
                                value: Draft::String(pick),
                            });
                        }
                        Some(value_type) => {
                            let Some(passing) = filter_by_value_type(
                                &snapshot, &path, &candidates, value_type, schema,
                            )?
                            else {
                                continue;
                            };
                            if passing.is_empty() {
                                // Nothing qualifies: pick a key and rewrite
                                // the referenced entry to satisfy the
                                // constraint.
                                let pick = candidates[rng.index(candidates.len())].clone();
                                let replacement = internal::draft(
                                    value_type,
                                    &scope,
                                    options,
                                    rng,
                                    path.len() + 1,
                                )?
                                .unwrap_or(Draft::Null);
                                edits.push(Edit::SetAtDataPath {
                                    path: path.clone(),
                                    key: pick.clone(),
                                    value: replacement,
                                });
                                edits.push(Edit::SetValue {
                                    steps,
                                    value: Draft::String(pick),
                                });
                            } else {
                                let pick = passing[rng.index(passing.len())].clone();
                                edits.push(Edit::SetValue {
                                    steps,
                                    value: Draft::String(pick),
                                });
                            }
                        }
                    }
                }
                PendingTask::KeyKeyOf {
                    steps,
                    path,
                    value_type,
                } => {
                    let Some(candidates) = candidate_keys(&snapshot, &path) else {
                        continue;
                    };
                    let candidates = match &value_type {
                        None => Some(candidates),
                        Some(value_type) => filter_by_value_type(
                            &snapshot, &path, &candidates, value_type, schema,
                        )?,
                    };
                    let Some(candidates) = candidates else {
                        continue;
                    };

                    let parent = steps[..steps.len() - 1].to_vec();
                    let taken = claimed.entry(parent.clone()).or_default();
                    let siblings = sibling_keys(&snapshot, &parent);
                    let available: Vec<String> = candidates
                        .into_iter()
                        .filter(|key| !siblings.contains(key) && !taken.contains(key))
                        .collect();
                    match available.is_empty() {
                        // The key space is exhausted; the entry cannot exist.
                        true => edits.push(Edit::RemoveEntry { steps }),
                        false => {
                            let pick = available[rng.index(available.len())].clone();
                            taken.insert(pick.clone());
                            edits.push(Edit::SetKey { steps, key: pick });
                        }
                    }
                }
                PendingTask::PropertyPath {
                    steps,
                    only_objects,
                } => {
                    let path = random_property_path(&snapshot, only_objects, rng);
                    let value =
                        Draft::Array(path.into_iter().map(Draft::String).collect());
                    edits.push(Edit::SetValue { steps, value });
                }
            }
        }

        if edits.is_empty() {
            let mut remaining = Vec::new();
            collect_pending(root, &mut Vec::new(), &mut remaining);
            return Err(GenerateError::UnresolvedPlaceholders(remaining.len()));
        }
        apply_edits(root, edits);
    }

    let mut remaining = Vec::new();
    collect_pending(root, &mut Vec::new(), &mut remaining);
    Err(GenerateError::UnresolvedPlaceholders(remaining.len()))
}

fn sibling_keys(snapshot: &Draft, parent_steps: &[Step]) -> HashSet<String> {
    let mut keys = HashSet::new();
    let mut current = snapshot;
    for step in parent_steps {
        current = match (step, current) {
            (Step::Entry(index), Draft::Object(entries)) => match entries.get(*index) {
                Some((_, value)) => value,
                None => return keys,
            },
            (Step::Item(index), Draft::Array(items)) => match items.get(*index) {
                Some(item) => item,
                None => return keys,
            },
            _ => return keys,
        };
    }
    if let Draft::Object(entries) = current {
        for (slot, _) in entries {
            if let KeySlot::Fixed(key) = slot {
                keys.insert(key.clone());
            }
        }
    }
    keys
}

/// Random walk from the document root, descending through fixed object keys
/// and stopping by coin flip. With `only_objects` the path backs up until it
/// rests on an object.
fn random_property_path(
    root: &Draft,
    only_objects: bool,
    rng: &mut RandomSource,
) -> Vec<String> {
    let mut path: Vec<String> = Vec::new();
    let mut current = root;
    loop {
        let Draft::Object(entries) = current else {
            break;
        };
        let fixed: Vec<(&String, &Draft)> = entries
            .iter()
            .filter_map(|(slot, value)| match slot {
                KeySlot::Fixed(key) => Some((key, value)),
                _ => None,
            })
            .collect();
        if fixed.is_empty() {
            break;
        }
        if !path.is_empty() && rng.boolean() {
            break;
        }
        let (key, value) = fixed[rng.index(fixed.len())];
        path.push(key.clone());
        current = value;
    }

    if only_objects {
        while !path.is_empty()
            && !matches!(root.lookup_path(&path), Some(Draft::Object(_)))
        {
            path.pop();
        }
    }
    path
}

fn apply_edits(root: &mut Draft, edits: Vec<Edit>) {
    let mut removals: Vec<Vec<Step>> = Vec::new();
    for edit in edits {
        match edit {
            Edit::SetValue { steps, value } => {
                if let Some(slot) = value_mut(root, &steps) {
                    *slot = value;
                }
            }
            Edit::SetKey { steps, key } => {
                set_entry_key(root, &steps, key);
            }
            Edit::SetAtDataPath { path, key, value } => {
                if let Some(Draft::Object(entries)) = root.lookup_path_mut(&path) {
                    let entry = entries
                        .iter_mut()
                        .find(|(slot, _)| matches!(slot, KeySlot::Fixed(k) if k == &key));
                    if let Some((_, target)) = entry {
                        *target = value;
                    }
                }
            }
            Edit::RemoveEntry { steps } => removals.push(steps),
        }
    }

    // Deepest paths first, then highest indices, so no removal shifts an
    // address another queued removal still needs.
    removals.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| b.cmp(a)));
    for steps in removals {
        let Some((Step::EntryKey(index), parent)) = steps.split_last() else {
            continue;
        };
        if let Some(Draft::Object(entries)) = value_mut(root, parent) {
            if *index < entries.len() {
                entries.remove(*index);
            }
        }
    }
}

fn set_entry_key(root: &mut Draft, steps: &[Step], key: String) {
    let Some((Step::EntryKey(index), parent)) = steps.split_last() else {
        return;
    };
    if let Some(Draft::Object(entries)) = value_mut(root, parent) {
        if let Some((slot, _)) = entries.get_mut(*index) {
            *slot = KeySlot::Fixed(key);
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
