use serde::Serialize;
use tracing::debug;

use crate::plan::{check_dependency, lookup_instance, Action, Instance, Plan, PlanError, Scope};

/// Graphviz only draws a bounded box for subgraphs whose name starts with this.
pub const CLUSTER_PREFIX: &str = "cluster_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// Visually bounded group holding one sub-plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub name: String,
    pub label: String,
    pub body: Subgraph,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stmt", rename_all = "snake_case")]
pub enum Stmt {
    Node(Node),
    Edge(Edge),
    Cluster(Cluster),
}

/// Graph sink the builder writes into. Statements keep insertion order so
/// the emitted DOT is stable for identical input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Subgraph {
    pub stmts: Vec<Stmt>,
}

impl Subgraph {
    pub fn add_node(&mut self, key: impl Into<String>, label: impl Into<String>) {
        self.stmts.push(Stmt::Node(Node {
            key: key.into(),
            label: label.into(),
        }));
    }

    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.stmts.push(Stmt::Edge(Edge {
            from: from.into(),
            to: to.into(),
        }));
    }

    pub fn add_cluster(
        &mut self,
        name: impl Into<String>,
        label: impl Into<String>,
        body: Subgraph,
    ) {
        self.stmts.push(Stmt::Cluster(Cluster {
            name: name.into(),
            label: label.into(),
            body,
        }));
    }

    /// Nodes directly in this subgraph (not inside nested clusters).
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.stmts.iter().filter_map(|s| match s {
            Stmt::Node(n) => Some(n),
            _ => None,
        })
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.stmts.iter().filter_map(|s| match s {
            Stmt::Edge(e) => Some(e),
            _ => None,
        })
    }

    pub fn clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.stmts.iter().filter_map(|s| match s {
            Stmt::Cluster(c) => Some(c),
            _ => None,
        })
    }

    pub fn cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters().find(|c| c.name == name)
    }

    /// Nodes at any depth.
    pub fn all_nodes(&self) -> Vec<&Node> {
        let mut out: Vec<&Node> = self.nodes().collect();
        for c in self.clusters() {
            out.extend(c.body.all_nodes());
        }
        out
    }

    /// Edges at any depth.
    pub fn all_edges(&self) -> Vec<&Edge> {
        let mut out: Vec<&Edge> = self.edges().collect();
        for c in self.clusters() {
            out.extend(c.body.all_edges());
        }
        out
    }

    pub fn label_of(&self, key: &str) -> Option<&str> {
        self.all_nodes()
            .into_iter()
            .find(|n| n.key == key)
            .map(|n| n.label.as_str())
    }
}

/// Abstract rendering of a plan: named root graph plus nested clusters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanGraph {
    pub name: String,
    pub root: Subgraph,
}

impl PlanGraph {
    pub fn from_plan(plan: &Plan) -> Result<Self, PlanError> {
        let mut root = Subgraph::default();
        build(&mut root, &plan.instances, &plan.actions, &Scope::root())?;
        let graph = PlanGraph {
            name: plan.name.clone(),
            root,
        };
        debug!(
            name = %graph.name,
            nodes = graph.root.all_nodes().len(),
            edges = graph.root.all_edges().len(),
            "Built plan graph"
        );
        Ok(graph)
    }
}

/// Draw one scope of actions into `sink`, recursing into sub-plans.
///
/// All nodes (clusters included) are registered before any edge, since a
/// dependency may point at a later sibling.
pub fn build(
    sink: &mut Subgraph,
    instances: &[Instance],
    actions: &[Action],
    scope: &Scope,
) -> Result<(), PlanError> {
    for (idx, action) in actions.iter().enumerate() {
        let key = scope.node_key(idx);
        let mut label = format!("{}: {}", idx, action.kind);

        if let Some(sub_plan) = action.sub_plan.as_deref() {
            let mut body = Subgraph::default();
            build(&mut body, instances, sub_plan, &scope.child(idx))?;
            sink.add_cluster(format!("{CLUSTER_PREFIX}{key}"), label.clone(), body);
        }

        if let Some(inst_index) = action.inst_index {
            let instance = lookup_instance(instances, scope, idx, inst_index)?;
            label.push_str(&format!("({})", instance.kind));
        }

        sink.add_node(key, label);
    }

    for (idx, action) in actions.iter().enumerate() {
        for &dep in &action.depends {
            check_dependency(scope, idx, dep, actions.len())?;
            sink.add_edge(scope.node_key(dep), scope.node_key(idx));
        }
    }

    Ok(())
}
