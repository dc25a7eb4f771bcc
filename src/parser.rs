//! Normalization of utilization authority payloads
//!
//! The authority has returned several payload layouts over time, and the
//! selector must keep routing no matter which one arrives. Parsing is a pure
//! function over `serde_json::Value`: it tries a fixed sequence of shape
//! strategies and reports which one matched. It never fails the caller;
//! unrecognizable input yields an empty mapping.

use std::collections::HashMap;

use serde_json::Value;

/// Numeric fields probed for a utilization score, in priority order.
/// The first one present wins.
pub const SCORE_FIELDS: &[&str] = &["utilization", "util", "usage", "load", "capacity"];

/// Fields probed for a deployment identifier, in priority order.
pub const ID_FIELDS: &[&str] = &["chute_id", "id", "name"];

/// Wrapper keys whose value may hold the actual per-deployment data.
const WRAPPER_KEYS: &[&str] = &["chutes", "data"];

/// Which payload layout was recognized. Diagnostic only; callers log it,
/// this module does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// `{"chutes": {...}}` or `{"data": [...]}` holding one of the shapes below
    Wrapped,
    /// `{"<chute_id>": {"utilization": 0.3}, ...}`
    KeyedObject,
    /// `[{"chute_id": "...", "utilization": 0.3}, ...]`
    ArrayOfObjects,
    /// `{"chute_id": "...", "utilization": 0.3}` - a single deployment
    FlatObject,
}

/// Outcome of parsing one payload. An empty `scores` map with `shape: None`
/// means nothing in the payload was recognizable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedScores {
    pub scores: HashMap<String, f64>,
    pub shape: Option<PayloadShape>,
}

impl ParsedScores {
    fn recognized(scores: HashMap<String, f64>, shape: PayloadShape) -> Self {
        Self {
            scores,
            shape: Some(shape),
        }
    }
}

/// Normalize an authority payload into `chute_id -> utilization`.
///
/// Total over all inputs: malformed or empty payloads produce an empty
/// mapping, never an error. Scores are clamped to `[0.0, 1.0]`; entries
/// missing an identifier or a recognizable score are dropped.
pub fn parse(raw: &Value) -> ParsedScores {
    // Wrapper containers take precedence over top-level interpretation.
    if let Value::Object(map) = raw {
        for key in WRAPPER_KEYS {
            let scores = match map.get(*key) {
                Some(Value::Object(inner)) => parse_keyed_object(inner),
                Some(Value::Array(items)) => parse_array(items),
                _ => continue,
            };
            if !scores.is_empty() {
                return ParsedScores::recognized(scores, PayloadShape::Wrapped);
            }
        }
    }

    match raw {
        Value::Array(items) => {
            let scores = parse_array(items);
            if !scores.is_empty() {
                return ParsedScores::recognized(scores, PayloadShape::ArrayOfObjects);
            }
        }
        Value::Object(map) => {
            if let Some((chute_id, score)) = parse_flat_object(map) {
                return ParsedScores::recognized(
                    HashMap::from([(chute_id, score)]),
                    PayloadShape::FlatObject,
                );
            }
            let scores = parse_keyed_object(map);
            if !scores.is_empty() {
                return ParsedScores::recognized(scores, PayloadShape::KeyedObject);
            }
        }
        _ => {}
    }

    ParsedScores::default()
}

/// Probe the score fields in priority order. JSON numbers only; strings,
/// booleans and null are not scores.
fn probe_score(obj: &serde_json::Map<String, Value>) -> Option<f64> {
    SCORE_FIELDS
        .iter()
        .find_map(|field| obj.get(*field)?.as_f64())
        .map(clamp_score)
}

fn probe_id(obj: &serde_json::Map<String, Value>) -> Option<String> {
    ID_FIELDS
        .iter()
        .find_map(|field| obj.get(*field)?.as_str())
        .map(str::to_string)
}

fn clamp_score(raw: f64) -> f64 {
    raw.clamp(0.0, 1.0)
}

/// Shape (1): one deployment's score with an accompanying identifier field.
fn parse_flat_object(obj: &serde_json::Map<String, Value>) -> Option<(String, f64)> {
    let score = probe_score(obj)?;
    let chute_id = probe_id(obj)?;
    Some((chute_id, score))
}

/// Shape (2): an object keyed by deployment id, each value an object
/// carrying one of the score fields.
fn parse_keyed_object(obj: &serde_json::Map<String, Value>) -> HashMap<String, f64> {
    obj.iter()
        .filter_map(|(chute_id, value)| {
            let score = probe_score(value.as_object()?)?;
            Some((chute_id.clone(), score))
        })
        .collect()
}

/// Shape (3): a sequence of objects, each carrying an identifier field and
/// a score field. Entries missing either are dropped.
fn parse_array(items: &[Value]) -> HashMap<String, f64> {
    items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            Some((probe_id(obj)?, probe_score(obj)?))
        })
        .collect()
}
