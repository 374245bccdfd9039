#![forbid(unsafe_code)]

use insigne_contracts::webhook::NormalizedSubmission;
use serde_json::{Map, Value};

/// Known submission-id locations, probed in declaration order. The first
/// probe yielding a non-empty string wins; later probes are not consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionProbe {
    /// `submission.id`
    SubmissionObjectId,
    /// `data.submissionId`
    DataObjectCamelId,
    /// `data.submission_id`
    DataObjectSnakeId,
    /// top-level `id`
    TopLevelId,
    /// `fields[]` entry whose key/name/label matches the configured hidden
    /// field key, taking that entry's string value
    HiddenField,
}

impl SubmissionProbe {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SubmissionObjectId => "submission.id",
            Self::DataObjectCamelId => "data.submissionId",
            Self::DataObjectSnakeId => "data.submission_id",
            Self::TopLevelId => "id",
            Self::HiddenField => "fields[hidden]",
        }
    }
}

pub const PROBE_ORDER: [SubmissionProbe; 5] = [
    SubmissionProbe::SubmissionObjectId,
    SubmissionProbe::DataObjectCamelId,
    SubmissionProbe::DataObjectSnakeId,
    SubmissionProbe::TopLevelId,
    SubmissionProbe::HiddenField,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizerConfig {
    /// Conventional hidden-field key carrying the submission id when the
    /// vendor flattens it into the answers.
    pub hidden_field_key: &'static str,
}

impl NormalizerConfig {
    pub fn mvp_v1() -> Self {
        Self {
            hidden_field_key: "submission_id",
        }
    }
}

/// Pure payload normalizer: no I/O, deterministic, total. Malformed input
/// degrades to `None` fields, never an error.
#[derive(Debug, Clone)]
pub struct NormalizerRuntime {
    config: NormalizerConfig,
}

impl Default for NormalizerRuntime {
    fn default() -> Self {
        Self::new(NormalizerConfig::mvp_v1())
    }
}

impl NormalizerRuntime {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, raw_body: &str) -> NormalizedSubmission {
        let root = parse_defensively(raw_body);
        NormalizedSubmission {
            submission_id: self.probe_submission_id(&root),
            client_email: probe_client_email(&root),
        }
    }

    fn probe_submission_id(&self, root: &Value) -> Option<String> {
        for probe in PROBE_ORDER {
            let hit = match probe {
                SubmissionProbe::SubmissionObjectId => non_empty_str(root.pointer("/submission/id")),
                SubmissionProbe::DataObjectCamelId => non_empty_str(root.pointer("/data/submissionId")),
                SubmissionProbe::DataObjectSnakeId => non_empty_str(root.pointer("/data/submission_id")),
                SubmissionProbe::TopLevelId => non_empty_str(root.get("id")),
                SubmissionProbe::HiddenField => {
                    hidden_field_value(root, self.config.hidden_field_key)
                }
            };
            if hit.is_some() {
                return hit;
            }
        }
        None
    }
}

/// Vendors sometimes deliver the JSON body double-encoded as a string; one
/// unwrap level is tolerated. Anything unparseable or non-object becomes
/// the empty object.
fn parse_defensively(raw: &str) -> Value {
    let first = serde_json::from_str::<Value>(raw).unwrap_or(Value::Null);
    let unwrapped = match first {
        Value::String(inner) => serde_json::from_str::<Value>(&inner).unwrap_or(Value::Null),
        other => other,
    };
    if unwrapped.is_object() {
        unwrapped
    } else {
        Value::Object(Map::new())
    }
}

/// Non-string values at a probed path are skipped, not coerced.
fn non_empty_str(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn fields_array(root: &Value) -> Option<&Vec<Value>> {
    root.pointer("/data/fields")
        .and_then(Value::as_array)
        .or_else(|| root.get("fields").and_then(Value::as_array))
}

fn hidden_field_value(root: &Value, key: &str) -> Option<String> {
    for field in fields_array(root)? {
        let named = ["key", "name", "label"].iter().any(|k| {
            field
                .get(*k)
                .and_then(Value::as_str)
                .is_some_and(|s| s.eq_ignore_ascii_case(key))
        });
        if named {
            if let Some(v) = non_empty_str(field.get("value")) {
                return Some(v);
            }
        }
    }
    None
}

/// First `fields[]` entry typed or labelled as an email whose value looks
/// like an address. Absence is not an error; the ingress tolerates it.
fn probe_client_email(root: &Value) -> Option<String> {
    for field in fields_array(root)? {
        let type_hit = field
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| t.to_ascii_lowercase().contains("email"));
        let label_hit = ["label", "name"].iter().any(|k| {
            field
                .get(*k)
                .and_then(Value::as_str)
                .is_some_and(|s| s.to_ascii_lowercase().contains("email"))
        });
        if type_hit || label_hit {
            if let Some(v) = non_empty_str(field.get("value")) {
                if v.contains('@') {
                    return Some(v);
                }
            }
        }
    }
    None
}
