pub mod document;
pub mod pdf;
pub mod report;

use std::path::{Path, PathBuf};

use time::OffsetDateTime;

use crate::graph_utils::graph::{FamilyGraph, NodeId};
use crate::persistence::persist::{self, CSV_FILE_NAME, JSON_FILE_NAME, PDF_FILE_NAME};
use report::{build_report, DocumentRenderer, GraphSnapshot};

pub fn export_json_file(graph: &FamilyGraph, dir: &Path) -> anyhow::Result<PathBuf> {
    let json = document::export_json(graph)?;
    persist::write_export(dir, JSON_FILE_NAME, json.as_bytes())
}

pub fn export_csv_file(graph: &FamilyGraph, dir: &Path) -> anyhow::Result<PathBuf> {
    let bytes = document::export_csv(graph)?;
    persist::write_export(dir, CSV_FILE_NAME, &bytes)
}

/// Render the family report, with a picture of the tree when there is one.
///
/// The JSON document is written next to the PDF so the report can be reloaded.
pub fn export_report_file(
    graph: &FamilyGraph,
    node_radius: f64,
    selected: Option<NodeId>,
    renderer: &dyn DocumentRenderer,
    dir: &Path,
) -> anyhow::Result<PathBuf> {
    let snapshot = GraphSnapshot::capture(graph, node_radius, selected);
    if snapshot.is_none() {
        log::warn!("no graph picture available, report will be text only");
    }
    let now = OffsetDateTime::now_utc();
    let report = build_report(graph, snapshot, now);
    let bytes = renderer.render(&report)?;
    let pdf = persist::write_export(dir, PDF_FILE_NAME, &bytes)?;
    export_json_file(graph, dir)?;
    Ok(pdf)
}
