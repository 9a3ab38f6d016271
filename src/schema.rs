use jsonschema::{Draft, JSONSchema};
use once_cell::sync::Lazy;
use schemars::schema_for;
use serde_json::Value as JsonValue;
use std::fmt;

use crate::plan::{ActionDoc, CombinedDoc, InstanceDoc};

/// Cap on reported violations per document.
const MAX_VIOLATIONS: usize = 10;

/// Which of the accepted input documents a file is expected to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Instances,
    Actions,
    Combined,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentKind::Instances => "instance",
            DocumentKind::Actions => "action",
            DocumentKind::Combined => "plan",
        };
        f.write_str(name)
    }
}

/// Schemas are generated from the Rust records so the validator and the
/// deserializer cannot drift apart.
static INSTANCE_SCHEMA: Lazy<JsonValue> = Lazy::new(|| {
    serde_json::to_value(schema_for!(InstanceDoc)).expect("schemars schema must serialize")
});

static ACTION_SCHEMA: Lazy<JsonValue> = Lazy::new(|| {
    serde_json::to_value(schema_for!(ActionDoc)).expect("schemars schema must serialize")
});

static COMBINED_SCHEMA: Lazy<JsonValue> = Lazy::new(|| {
    serde_json::to_value(schema_for!(CombinedDoc)).expect("schemars schema must serialize")
});

static INSTANCE_VALIDATOR: Lazy<JSONSchema> = Lazy::new(|| compile(&INSTANCE_SCHEMA));
static ACTION_VALIDATOR: Lazy<JSONSchema> = Lazy::new(|| compile(&ACTION_SCHEMA));
static COMBINED_VALIDATOR: Lazy<JSONSchema> = Lazy::new(|| compile(&COMBINED_SCHEMA));

fn compile(schema: &JsonValue) -> JSONSchema {
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema)
        .expect("failed to compile generated document schema")
}

/// JSON Schema for a document kind, as generated from the records.
pub fn document_schema(kind: DocumentKind) -> &'static JsonValue {
    match kind {
        DocumentKind::Instances => &*INSTANCE_SCHEMA,
        DocumentKind::Actions => &*ACTION_SCHEMA,
        DocumentKind::Combined => &*COMBINED_SCHEMA,
    }
}

fn validator(kind: DocumentKind) -> &'static JSONSchema {
    match kind {
        DocumentKind::Instances => &*INSTANCE_VALIDATOR,
        DocumentKind::Actions => &*ACTION_VALIDATOR,
        DocumentKind::Combined => &*COMBINED_VALIDATOR,
    }
}

/// Schema violations for `value`, one line per problem, prefixed with the
/// JSON pointer of the offending element. Empty when the document conforms.
pub fn violations(kind: DocumentKind, value: &JsonValue) -> Vec<String> {
    let mut msgs: Vec<String> = Vec::new();

    // The error iterator borrows `value`; drain it here.
    if let Err(errors) = validator(kind).validate(value) {
        for (i, e) in errors.enumerate() {
            if i >= MAX_VIOLATIONS {
                msgs.push("... (more schema errors omitted)".to_string());
                break;
            }
            let instance_path = e.instance_path.to_string();
            let path = if instance_path.is_empty() {
                "/".to_string()
            } else {
                instance_path
            };
            msgs.push(format!("at {path}: {e}"));
        }
    }

    msgs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_schema_accepts_nested_sub_plans() {
        let doc = json!({
            "actions": [
                {"type": "StartAction", "depends": [], "inst_index": 0},
                {"type": "LoopAction", "depends": [0], "sub_plan": [
                    {"type": "KillAction", "depends": []},
                    {"type": "LoopAction", "depends": [0], "sub_plan": [
                        {"type": "WaitAction", "depends": []}
                    ]}
                ]}
            ]
        });
        assert!(violations(DocumentKind::Actions, &doc).is_empty());
    }

    #[test]
    fn action_schema_requires_depends() {
        let doc = json!({"actions": [{"type": "A"}]});
        let errs = violations(DocumentKind::Actions, &doc);
        assert_eq!(errs.len(), 1, "{errs:?}");
        assert!(errs[0].starts_with("at /actions/0:"), "{errs:?}");
        assert!(errs[0].contains("depends"), "{errs:?}");
    }

    #[test]
    fn action_schema_rejects_negative_indices_in_sub_plans() {
        let doc = json!({
            "actions": [
                {"type": "LoopAction", "depends": [], "sub_plan": [
                    {"type": "X", "depends": [-1]}
                ]}
            ]
        });
        let errs = violations(DocumentKind::Actions, &doc);
        assert!(!errs.is_empty());
        assert!(
            errs.iter().any(|e| e.contains("/actions/0/sub_plan/0/depends/0")),
            "{errs:?}"
        );
    }

    #[test]
    fn instance_schema_requires_type() {
        let doc = json!({"instances": [{"host": "127.0.0.1"}]});
        let errs = violations(DocumentKind::Instances, &doc);
        assert!(errs.iter().any(|e| e.contains("type")), "{errs:?}");
    }

    #[test]
    fn combined_schema_allows_missing_instances() {
        let doc = json!({"actions": []});
        assert!(violations(DocumentKind::Combined, &doc).is_empty());
        assert!(!violations(DocumentKind::Combined, &json!({"instances": []})).is_empty());
    }

    #[test]
    fn generated_schemas_name_their_root_keys() {
        let schema = document_schema(DocumentKind::Actions);
        assert!(schema["properties"].get("actions").is_some());
        let schema = document_schema(DocumentKind::Instances);
        assert!(schema["properties"].get("instances").is_some());
    }
}
