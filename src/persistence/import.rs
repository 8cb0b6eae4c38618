//! Decoding of user-supplied tree files.
//!
//! Two layouts are accepted: `{ "nodes": [...], "edges": [...] }` and a bare
//! array of nodes. Each node may be a plain object or wrapped as
//! `{ "node": {...} }`. Everything is normalised to [`IncomingNode`] before it
//! reaches the store.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::graph_utils::graph::{Attributes, Link, NodeId, SELF_NAME};
use crate::graph_utils::store::IncomingNode;

/// Largest id a file may carry: the biggest integer a JSON number holds
/// exactly in the browser build, which leaves room for fresh ids after it.
pub const MAX_IMPORT_ID: NodeId = (1 << 53) - 1;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Ошибка чтения файла: {0}")]
    Syntax(#[source] serde_json::Error),
    #[error("Неверный формат JSON: {0}")]
    Shape(String),
}

#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(default)]
    id: Option<NodeId>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    y: Option<f64>,
    #[serde(rename = "isSelf", default)]
    is_self: Option<bool>,
    #[serde(flatten)]
    attributes: Attributes,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NodeLike {
    Wrapped { node: RawNode },
    Plain(RawNode),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportDocument {
    Graph {
        nodes: Vec<NodeLike>,
        #[serde(default)]
        edges: Option<Vec<Link>>,
    },
    Bare(Vec<NodeLike>),
}

/// A decoded file, ready for `TreeStore::load_graph`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedGraph {
    pub nodes: Vec<IncomingNode>,
    pub edges: Vec<Link>,
}

impl ImportedGraph {
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }
}

pub fn decode_import(text: &str) -> Result<ImportedGraph, ImportError> {
    let value: Value = serde_json::from_str(text).map_err(ImportError::Syntax)?;
    decode_value(value)
}

pub fn decode_value(value: Value) -> Result<ImportedGraph, ImportError> {
    let shape = describe(&value);
    let doc = ImportDocument::deserialize(value)
        .map_err(|_| ImportError::Shape(format!("expected a node array or an object with a `nodes` array, got {}", shape)))?;
    let (raw, edges) = match doc {
        ImportDocument::Graph { nodes, edges } => (nodes, edges.unwrap_or_default()),
        ImportDocument::Bare(nodes) => (nodes, Vec::new()),
    };
    let mut nodes: Vec<IncomingNode> = raw.into_iter().map(normalize).collect();
    check_ids(&nodes, &edges)?;

    // Files written before the explicit flag existed mark the self node by name only.
    if !nodes.iter().any(|n| n.is_self) {
        for n in nodes.iter_mut().filter(|n| n.name == SELF_NAME) {
            n.is_self = true;
        }
    }
    Ok(ImportedGraph { nodes, edges })
}

fn check_id(id: NodeId, what: &str) -> Result<(), ImportError> {
    if id == 0 || id > MAX_IMPORT_ID {
        return Err(ImportError::Shape(format!("{} id {} is outside 1..={}", what, id, MAX_IMPORT_ID)));
    }
    Ok(())
}

fn check_ids(nodes: &[IncomingNode], edges: &[Link]) -> Result<(), ImportError> {
    let mut seen: HashSet<NodeId> = HashSet::new();
    for id in nodes.iter().filter_map(|n| n.id) {
        check_id(id, "node")?;
        if !seen.insert(id) {
            return Err(ImportError::Shape(format!("node id {} appears more than once", id)));
        }
    }
    for e in edges {
        check_id(e.from, "edge")?;
        check_id(e.to, "edge")?;
    }
    Ok(())
}

fn normalize(like: NodeLike) -> IncomingNode {
    let raw = match like {
        NodeLike::Wrapped { node } => node,
        NodeLike::Plain(node) => node,
    };
    IncomingNode {
        id: raw.id,
        name: raw.name.unwrap_or_default(),
        x: raw.x,
        y: raw.y,
        is_self: raw.is_self.unwrap_or(false),
        attributes: raw.attributes.into_iter().filter(|(_, v)| !v.is_null()).collect(),
    }
}

fn describe(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array with invalid entries",
        Value::Object(o) if o.contains_key("nodes") => "an object with an invalid `nodes` field",
        Value::Object(_) => "an object without `nodes`",
    }
}
