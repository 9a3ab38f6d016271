use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::schema::{self, DocumentKind};

/// Object an action may point at through `inst_index`.
///
/// Only `type` contributes to the rendered graph; any other fields a plan
/// author attaches (hosts, config paths, ...) are accepted and ignored.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Instance {
    #[serde(rename = "type")]
    pub kind: String,
}

/// One step of a plan.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,

    /// Sibling indices this action waits on.
    pub depends: Vec<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inst_index: Option<usize>,

    /// Nested plan (e.g. the body of a `LoopAction`). Indices inside it are
    /// local to the sub-plan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_plan: Option<Vec<Action>>,
}

impl Action {
    pub fn new(kind: impl Into<String>, depends: Vec<usize>) -> Self {
        Self {
            kind: kind.into(),
            depends,
            inst_index: None,
            sub_plan: None,
        }
    }

    pub fn with_instance(mut self, inst_index: usize) -> Self {
        self.inst_index = Some(inst_index);
        self
    }

    pub fn with_sub_plan(mut self, sub_plan: Vec<Action>) -> Self {
        self.sub_plan = Some(sub_plan);
        self
    }
}

/// `{ "instances": [...] }`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct InstanceDoc {
    pub instances: Vec<Instance>,
}

/// `{ "actions": [...] }`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ActionDoc {
    pub actions: Vec<Action>,
}

/// Single document carrying both instances and actions.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct CombinedDoc {
    #[serde(default)]
    pub instances: Vec<Instance>,
    pub actions: Vec<Action>,
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to read {}", .path.display())]
    InputRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON in {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} does not match the {kind} document shape", .path.display())]
    Shape {
        path: PathBuf,
        kind: DocumentKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} is not a valid {kind} document:\n{details}", .path.display())]
    Schema {
        path: PathBuf,
        kind: DocumentKind,
        details: String,
    },

    #[error(
        "{scope}[{action}] depends on unknown action {target} (scope has {len} action(s))"
    )]
    UnknownDependency {
        scope: String,
        action: usize,
        target: usize,
        len: usize,
    },

    #[error(
        "{scope}[{action}] references unknown instance {index} ({len} instance(s) declared)"
    )]
    UnknownInstance {
        scope: String,
        action: usize,
        index: usize,
        len: usize,
    },
}

impl PlanError {
    /// True for dangling `depends` / `inst_index` values.
    pub fn is_reference_error(&self) -> bool {
        matches!(
            self,
            PlanError::UnknownDependency { .. } | PlanError::UnknownInstance { .. }
        )
    }
}

/// Sibling scope within the action tree.
///
/// `prefix` keys rendered nodes; `path` only feeds diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub prefix: String,
    pub path: String,
}

pub const ROOT_PREFIX: &str = "main";

impl Scope {
    pub fn root() -> Self {
        Self {
            prefix: ROOT_PREFIX.to_string(),
            path: "actions".to_string(),
        }
    }

    pub fn node_key(&self, index: usize) -> String {
        format!("{}{}", self.prefix, index)
    }

    /// Scope of the sub-plan owned by the action at `index`.
    pub fn child(&self, index: usize) -> Self {
        Self {
            prefix: format!("{}_", self.node_key(index)),
            path: format!("{}[{}].sub_plan", self.path, index),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Fully loaded plan ready to be drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Graph name, taken from the action (or combined) file stem.
    pub name: String,
    pub instances: Vec<Instance>,
    pub actions: Vec<Action>,
}

impl Plan {
    pub fn new(name: impl Into<String>, instances: Vec<Instance>, actions: Vec<Action>) -> Self {
        Self {
            name: name.into(),
            instances,
            actions,
        }
    }

    /// Check every `depends` and `inst_index` in the tree before anything is
    /// drawn, so a bad plan fails with the offending scope and index.
    pub fn validate(&self) -> Result<(), PlanError> {
        validate_scope(&self.instances, &self.actions, &Scope::root())
    }

    /// Total number of actions, sub-plans included.
    pub fn action_count(&self) -> usize {
        fn count(actions: &[Action]) -> usize {
            actions
                .iter()
                .map(|a| 1 + a.sub_plan.as_deref().map(count).unwrap_or(0))
                .sum()
        }
        count(&self.actions)
    }
}

pub(crate) fn check_dependency(
    scope: &Scope,
    action: usize,
    target: usize,
    len: usize,
) -> Result<(), PlanError> {
    if target >= len {
        return Err(PlanError::UnknownDependency {
            scope: scope.path.clone(),
            action,
            target,
            len,
        });
    }
    Ok(())
}

pub(crate) fn lookup_instance<'a>(
    instances: &'a [Instance],
    scope: &Scope,
    action: usize,
    index: usize,
) -> Result<&'a Instance, PlanError> {
    instances.get(index).ok_or_else(|| PlanError::UnknownInstance {
        scope: scope.path.clone(),
        action,
        index,
        len: instances.len(),
    })
}

fn validate_scope(
    instances: &[Instance],
    actions: &[Action],
    scope: &Scope,
) -> Result<(), PlanError> {
    for (idx, action) in actions.iter().enumerate() {
        for &dep in &action.depends {
            check_dependency(scope, idx, dep, actions.len())?;
        }
        if let Some(inst) = action.inst_index {
            lookup_instance(instances, scope, idx, inst)?;
        }
        if let Some(sub) = action.sub_plan.as_deref() {
            validate_scope(instances, sub, &scope.child(idx))?;
        }
    }
    Ok(())
}

/// Where the plan comes from on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanSource {
    /// Instance document and action document in separate files.
    Split {
        instances: PathBuf,
        actions: PathBuf,
    },
    /// One document with both `instances` and `actions`.
    Combined(PathBuf),
}

impl PlanSource {
    /// One path means a combined document; two mean `<instances> <actions>`.
    pub fn from_paths(paths: &[PathBuf]) -> Option<Self> {
        match paths {
            [single] => Some(PlanSource::Combined(single.clone())),
            [instances, actions] => Some(PlanSource::Split {
                instances: instances.clone(),
                actions: actions.clone(),
            }),
            _ => None,
        }
    }

    /// File the output is named after.
    pub fn naming_path(&self) -> &Path {
        match self {
            PlanSource::Split { actions, .. } => actions,
            PlanSource::Combined(path) => path,
        }
    }

    /// Base name of the naming file with its extension stripped.
    pub fn graph_name(&self) -> String {
        self.naming_path()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "plan".to_string())
    }

    /// Read, schema-check, parse and validate the plan.
    pub fn load(&self) -> Result<Plan, PlanError> {
        let plan = match self {
            PlanSource::Split { instances, actions } => {
                let inst_doc: InstanceDoc = load_document(instances, DocumentKind::Instances)?;
                let act_doc: ActionDoc = load_document(actions, DocumentKind::Actions)?;
                Plan::new(self.graph_name(), inst_doc.instances, act_doc.actions)
            }
            PlanSource::Combined(path) => {
                let doc: CombinedDoc = load_document(path, DocumentKind::Combined)?;
                Plan::new(self.graph_name(), doc.instances, doc.actions)
            }
        };

        plan.validate()?;
        info!(
            name = %plan.name,
            instances = plan.instances.len(),
            actions = plan.action_count(),
            "Loaded plan"
        );
        Ok(plan)
    }
}

fn load_document<T: DeserializeOwned>(path: &Path, kind: DocumentKind) -> Result<T, PlanError> {
    debug!(path = %path.display(), %kind, "Reading document");
    let text = fs::read_to_string(path).map_err(|source| PlanError::InputRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(path, &text, kind)
}

/// Parse document text already read from `path`.
pub fn parse_document<T: DeserializeOwned>(
    path: &Path,
    text: &str,
    kind: DocumentKind,
) -> Result<T, PlanError> {
    let value: JsonValue = serde_json::from_str(text).map_err(|source| PlanError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let violations = schema::violations(kind, &value);
    if !violations.is_empty() {
        return Err(PlanError::Schema {
            path: path.to_path_buf(),
            kind,
            details: violations.join("\n"),
        });
    }

    serde_json::from_value(value).map_err(|source| PlanError::Shape {
        path: path.to_path_buf(),
        kind,
        source,
    })
}
