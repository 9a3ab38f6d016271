use sha2::{Digest, Sha256};
use std::fmt::Write as _;

use crate::graph::{PlanGraph, Stmt, Subgraph};

/// Fill color for sub-plan clusters.
const CLUSTER_COLOR: &str = "lightgrey";

/// Render the graph as Graphviz DOT text.
pub fn to_dot(graph: &PlanGraph) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph {} {{", quote(&graph.name));
    write_body(&mut out, &graph.root, 1);
    out.push_str("}\n");
    out
}

fn write_body(out: &mut String, sub: &Subgraph, depth: usize) {
    let indent = "\t".repeat(depth);
    for stmt in &sub.stmts {
        match stmt {
            Stmt::Node(node) => {
                let _ = writeln!(
                    out,
                    "{indent}{} [label={}]",
                    quote(&node.key),
                    quote(&node.label)
                );
            }
            Stmt::Edge(edge) => {
                let _ = writeln!(out, "{indent}{} -> {}", quote(&edge.from), quote(&edge.to));
            }
            Stmt::Cluster(cluster) => {
                let _ = writeln!(out, "{indent}subgraph {} {{", quote(&cluster.name));
                let _ = writeln!(
                    out,
                    "{indent}\tcolor={CLUSTER_COLOR} label={} style=filled",
                    quote(&cluster.label)
                );
                write_body(out, &cluster.body, depth + 1);
                let _ = writeln!(out, "{indent}}}");
            }
        }
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", escape_dot(s))
}

/// Escape a string for a quoted DOT identifier.
fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Hex SHA-256 of the DOT text. Identical plans give identical digests.
pub fn graph_digest(graph: &PlanGraph) -> String {
    let hash = Sha256::digest(to_dot(graph).as_bytes());
    let mut hex = String::with_capacity(hash.len() * 2);
    for b in hash.iter() {
        let _ = write!(hex, "{b:02x}");
    }
    hex
}
