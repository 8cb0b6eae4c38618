//! Printable family report.
//!
//! The report is an ordered list of blocks with minimal styling. Laying the
//! blocks out on pages is left to a [`DocumentRenderer`].

use time::macros::format_description;
use time::OffsetDateTime;

use crate::graph_utils::graph::{FamilyGraph, Node, NodeId};

pub const TITLE: &str = ">----------<[ Family Tree ]>----------<";
pub const HEADING: &str = "Описание семьи";
pub const SEPARATOR: &str = "------------------------------------------------------";
const BIOGRAPHY_KEY: &str = "biography";

// Attributes printed in this order, before any unlisted keys
const KNOWN_ATTRIBUTES: [(&str, &str); 6] = [
    ("age", "Возраст"),
    ("birthYear", "Год рождения"),
    ("birthDate", "Дата рождения"),
    ("location", "Место рождения"),
    ("avatar", "Аватар"),
    (BIOGRAPHY_KEY, "Биография"),
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
}

/// Top, right, bottom, left; in points.
pub type Margins = [f32; 4];

#[derive(Clone, Debug, PartialEq)]
pub struct TextStyle {
    pub font_size: f32,
    pub bold: bool,
    pub alignment: Alignment,
    pub margin: Margins,
}

impl TextStyle {
    pub fn body() -> Self {
        Self { font_size: 12.0, bold: false, alignment: Alignment::Left, margin: [0.0; 4] }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotNode {
    pub x: f64,
    pub y: f64,
    pub label: String,
    pub selected: bool,
}

/// Vector picture of the canvas: circles, names and the lines between them.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphSnapshot {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
    pub radius: f64,
    pub nodes: Vec<SnapshotNode>,
    pub lines: Vec<((f64, f64), (f64, f64))>,
}

impl GraphSnapshot {
    /// Picture the graph, or `None` when there is nothing to draw.
    pub fn capture(graph: &FamilyGraph, radius: f64, selected: Option<NodeId>) -> Option<Self> {
        if graph.is_empty() || !(radius.is_finite() && radius > 0.0) { return None; }
        // labels hang below the circle
        let pad = radius * 2.0;
        let (mut min_x, mut min_y) = (f64::MAX, f64::MAX);
        let (mut max_x, mut max_y) = (f64::MIN, f64::MIN);
        for n in graph.nodes() {
            min_x = min_x.min(n.x - pad);
            min_y = min_y.min(n.y - pad);
            max_x = max_x.max(n.x + pad);
            max_y = max_y.max(n.y + pad);
        }
        let nodes = graph
            .nodes()
            .map(|n| SnapshotNode { x: n.x, y: n.y, label: n.name.clone(), selected: selected == Some(n.id) })
            .collect();
        let lines = graph.resolved_edges().map(|(a, b)| ((a.x, a.y), (b.x, b.y))).collect();
        Some(Self { min_x, min_y, width: max_x - min_x, height: max_y - min_y, radius, nodes, lines })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    Image { snapshot: GraphSnapshot, width: f32, margin: Margins },
    Text { text: String, style: TextStyle },
}

#[derive(Clone, Debug, PartialEq)]
pub struct PageSetup {
    pub width_mm: f32,
    pub height_mm: f32,
    pub margins: Margins,
}

impl PageSetup {
    pub fn a4() -> Self { Self { width_mm: 210.0, height_mm: 297.0, margins: [20.0; 4] } }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub title: String,
    pub page: PageSetup,
    pub blocks: Vec<Block>,
}

impl Report {
    pub fn has_image(&self) -> bool { self.blocks.iter().any(|b| matches!(b, Block::Image { .. })) }
}

/// Turns a report into a file's bytes.
pub trait DocumentRenderer {
    fn render(&self, report: &Report) -> anyhow::Result<Vec<u8>>;
}

fn text(text: impl Into<String>, style: TextStyle) -> Block {
    Block::Text { text: text.into(), style }
}

fn person_blocks(node: &Node, out: &mut Vec<Block>) {
    out.push(text(format!("Имя: {}", node.name), TextStyle::body()));
    for (key, label) in KNOWN_ATTRIBUTES {
        let Some(value) = node.attribute_text(key) else { continue };
        if key == BIOGRAPHY_KEY {
            out.push(text(format!("{}:", label), TextStyle { bold: true, ..TextStyle::body() }));
            out.push(text(value, TextStyle::body()));
        } else {
            out.push(text(format!("{}: {}", label, value), TextStyle::body()));
        }
    }
    for key in node.attributes.keys() {
        if KNOWN_ATTRIBUTES.iter().any(|(k, _)| *k == key.as_str()) { continue; }
        if let Some(value) = node.attribute_text(key) {
            out.push(text(format!("{}: {}", key, value), TextStyle::body()));
        }
    }
    out.push(text(SEPARATOR, TextStyle { margin: [5.0, 0.0, 10.0, 0.0], ..TextStyle::body() }));
}

pub fn build_report(graph: &FamilyGraph, snapshot: Option<GraphSnapshot>, generated_at: OffsetDateTime) -> Report {
    let mut blocks: Vec<Block> = Vec::new();
    if let Some(snapshot) = snapshot {
        blocks.push(Block::Image { snapshot, width: 555.0, margin: [20.0; 4] });
    }
    blocks.push(text(TITLE, TextStyle { font_size: 24.0, alignment: Alignment::Center, margin: [10.0, 0.0, 20.0, 0.0], ..TextStyle::body() }));
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]");
    let stamp = generated_at.format(&fmt).unwrap_or_else(|_| "unknown".into());
    blocks.push(text(format!("Создано: {} UTC", stamp), TextStyle { font_size: 10.0, alignment: Alignment::Center, margin: [0.0, 0.0, 10.0, 0.0], ..TextStyle::body() }));
    blocks.push(text(HEADING, TextStyle { font_size: 18.0, margin: [0.0, 0.0, 10.0, 0.0], ..TextStyle::body() }));
    for node in graph.nodes() {
        person_blocks(node, &mut blocks);
    }
    Report { title: "Family Tree".into(), page: PageSetup::a4(), blocks }
}
