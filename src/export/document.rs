use serde::{Deserialize, Serialize};

use crate::graph_utils::graph::{FamilyGraph, Link, Node};

/// The exported JSON file: every person and every link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<Node>,
    pub edges: Vec<Link>,
}

impl GraphDocument {
    pub fn from_graph(graph: &FamilyGraph) -> Self {
        Self {
            nodes: graph.nodes().cloned().collect(),
            edges: graph.edges().to_vec(),
        }
    }
}

pub fn export_json(graph: &FamilyGraph) -> anyhow::Result<String> {
    let mut s = serde_json::to_string_pretty(&GraphDocument::from_graph(graph))?;
    // ensure newline at end
    s.push('\n');
    Ok(s)
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(";")
}

/// People table: one row per node with its parents and children listed by id.
pub fn export_csv(graph: &FamilyGraph) -> anyhow::Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    // headers: id,name,x,y,parents,children,attributes_json
    wtr.write_record(["id", "name", "x", "y", "parents", "children", "attributes_json"])?;
    for n in graph.nodes() {
        let attrs = serde_json::to_string(&n.attributes).unwrap_or_else(|_| "{}".into());
        wtr.write_record(&[
            n.id.to_string(),
            n.name.clone(),
            n.x.to_string(),
            n.y.to_string(),
            join_ids(&graph.parents_of(n.id)),
            join_ids(&graph.children_of(n.id)),
            attrs,
        ])?;
    }
    wtr.flush()?;
    wtr.into_inner().map_err(|e| anyhow::anyhow!("csv buffer: {}", e.error()))
}
