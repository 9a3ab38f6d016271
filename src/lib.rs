//! `plan-flowchart` library.
//!
//! Loads chaos plan documents (`plan`, checked against generated JSON
//! Schemas in `schema`), turns the action tree into an abstract graph with
//! one cluster per sub-plan (`graph`), serialises it as Graphviz DOT (`dot`)
//! and hands it to the `dot` executable for rasterising (`render`).
//!
//! Invariants:
//! - node keys are unique across the whole tree (`main<i>`, `main<i>_<j>`, ...)
//! - dependency edges never leave the scope they are declared in
//! - identical input gives byte-identical DOT

pub mod dot;
pub mod graph;
pub mod plan;
pub mod render;
pub mod schema;
