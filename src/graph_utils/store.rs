use std::collections::BTreeSet;
use serde_json::Value;

use super::graph::{
    Attributes, CanvasBounds, DeletionStrategy, FamilyGraph, Link, Node, NodeId, Point,
    CHILD_PREFIX, PARENT_PREFIX, RESERVED_KEYS, SELF_NAME,
};

// Placement used when the visible area is not known yet
pub const ROOT_FALLBACK: Point = Point::new(400.0, 100.0);
// Offsets of freshly created relatives relative to their anchor
pub const GENERATION_GAP: f64 = 200.0;
pub const PARENT_SPREAD: f64 = 120.0;

/// Monotonic id source; never hands out an id at or below anything it has seen.
#[derive(Clone, Debug)]
pub struct IdGenerator {
    // None once the id space is used up
    next: Option<NodeId>,
}

impl Default for IdGenerator {
    fn default() -> Self { Self { next: Some(1) } }
}

impl IdGenerator {
    pub fn fresh(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = id.checked_add(1);
        Some(id)
    }

    pub fn peek(&self) -> Option<NodeId> { self.next }

    pub fn advance_past(&mut self, seen: NodeId) {
        self.next = match (self.next, seen.checked_add(1)) {
            (Some(next), Some(after)) => Some(next.max(after)),
            _ => None,
        };
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RelativeKind {
    Parent,
    Child,
}

/// A node as read from an import file, before defaults are filled in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IncomingNode {
    pub id: Option<NodeId>,
    pub name: String,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub is_self: bool,
    pub attributes: Attributes,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    AddRoot { center: Option<Point> },
    AddRelative { anchor: NodeId, kind: RelativeKind },
    UpdateNode { id: NodeId, patch: Attributes },
    MoveNode { id: NodeId, dx: f64, dy: f64 },
    SetPosition { id: NodeId, pos: Point },
    RemoveNode { id: NodeId },
    Load { nodes: Vec<IncomingNode>, edges: Vec<Link> },
    Select(Option<NodeId>),
    Edit(Option<NodeId>),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Outcome {
    pub created: Vec<NodeId>,
    pub removed: Vec<NodeId>,
    pub changed: bool,
}

/// The application's single graph state: people, links, selection and edit target.
#[derive(Clone, Debug, Default)]
pub struct TreeStore {
    graph: FamilyGraph,
    ids: IdGenerator,
    bounds: CanvasBounds,
    selected: Option<NodeId>,
    editing: Option<NodeId>,
}

impl TreeStore {
    pub fn new(bounds: CanvasBounds) -> Self {
        Self { bounds, ..Default::default() }
    }

    pub fn graph(&self) -> &FamilyGraph { &self.graph }
    pub fn bounds(&self) -> CanvasBounds { self.bounds }
    pub fn node(&self, id: NodeId) -> Option<&Node> { self.graph.get_node(id) }
    pub fn selected(&self) -> Option<NodeId> { self.selected }
    pub fn selected_node(&self) -> Option<&Node> { self.selected.and_then(|id| self.graph.get_node(id)) }
    pub fn editing(&self) -> Option<NodeId> { self.editing }
    pub fn next_id(&self) -> Option<NodeId> { self.ids.peek() }

    pub fn select(&mut self, id: Option<NodeId>) {
        self.selected = id.filter(|id| self.graph.contains(*id));
    }

    pub fn set_editing(&mut self, id: Option<NodeId>) {
        self.editing = id.filter(|id| self.graph.contains(*id));
    }

    pub fn node_at(&self, p: Point) -> Option<NodeId> {
        self.graph.node_at(p, self.bounds.node_radius)
    }

    /// Add the "self" person. `None` when no id is left to give out.
    pub fn add_root_node(&mut self, center: Option<Point>) -> Option<Node> {
        let Some(id) = self.ids.fresh() else {
            log::warn!("id space exhausted, root node not added");
            return None;
        };
        let mut node = Node::new(id, SELF_NAME, center.unwrap_or(ROOT_FALLBACK));
        node.is_self = true;
        self.graph.insert_node(node.clone());
        self.selected = Some(node.id);
        log::debug!("added root node {}", node.id);
        Some(node)
    }

    pub fn add_relative(&mut self, anchor_id: NodeId, kind: RelativeKind) -> Vec<Node> {
        let Some(anchor) = self.graph.get_node(anchor_id) else { return Vec::new() };
        let base = anchor.position();
        let created = match kind {
            RelativeKind::Child => {
                let Some(id) = self.ids.fresh() else { return self.exhausted(kind) };
                let child = Node::new(id, format!("{} {}", CHILD_PREFIX, id), Point::new(base.x, base.y + GENERATION_GAP));
                self.graph.insert_node(child.clone());
                self.graph.add_edge(anchor_id, id);
                vec![child]
            }
            RelativeKind::Parent => {
                let (Some(mother_id), Some(father_id)) = (self.ids.fresh(), self.ids.fresh()) else {
                    return self.exhausted(kind);
                };
                let y = base.y - GENERATION_GAP;
                let mother = Node::new(mother_id, format!("{} {}", PARENT_PREFIX, mother_id), Point::new(base.x - PARENT_SPREAD, y));
                let father = Node::new(father_id, format!("{} {}", PARENT_PREFIX, father_id), Point::new(base.x + PARENT_SPREAD, y));
                self.graph.insert_node(mother.clone());
                self.graph.insert_node(father.clone());
                self.graph.add_edge(mother_id, anchor_id);
                self.graph.add_edge(father_id, anchor_id);
                vec![mother, father]
            }
        };
        log::debug!("added {:?} relative(s) {:?} to {}", kind, created.iter().map(|n| n.id).collect::<Vec<_>>(), anchor_id);
        created
    }

    fn exhausted(&self, kind: RelativeKind) -> Vec<Node> {
        log::warn!("id space exhausted, {:?} relative not added", kind);
        Vec::new()
    }

    /// Merge `patch` into the node's fields. `null` removes an attribute.
    pub fn update_node(&mut self, id: NodeId, patch: Attributes) -> bool {
        let Some(node) = self.graph.get_node_mut(id) else { return false };
        for (key, value) in patch {
            if RESERVED_KEYS.contains(&key.as_str()) { continue; }
            if key == "name" {
                node.name = match value {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                continue;
            }
            if value.is_null() {
                node.attributes.remove(&key);
            } else {
                node.attributes.insert(key, value);
            }
        }
        true
    }

    pub fn move_node(&mut self, id: NodeId, dx: f64, dy: f64) -> Option<Point> {
        let bounds = self.bounds;
        let node = self.graph.get_node_mut(id)?;
        let p = bounds.clamp(Point::new(node.x + dx, node.y + dy));
        node.x = p.x;
        node.y = p.y;
        Some(p)
    }

    pub fn set_position(&mut self, id: NodeId, pos: Point) -> Option<Point> {
        let bounds = self.bounds;
        let node = self.graph.get_node_mut(id)?;
        let p = bounds.clamp(pos);
        node.x = p.x;
        node.y = p.y;
        Some(p)
    }

    /// Remove a node with the cascade its self flag calls for.
    pub fn remove_node(&mut self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.graph.get_node(id) else { return Vec::new() };
        let strategy = DeletionStrategy::for_node(node);
        self.remove_node_with(id, strategy)
    }

    pub fn remove_node_with(&mut self, id: NodeId, strategy: DeletionStrategy) -> Vec<NodeId> {
        if !self.graph.contains(id) { return Vec::new(); }
        let doomed: BTreeSet<NodeId> = self.graph.removal_set(id, strategy);
        self.graph.remove_all(&doomed);
        if self.selected.is_some_and(|s| doomed.contains(&s)) { self.selected = None; }
        if self.editing.is_some_and(|e| doomed.contains(&e)) { self.editing = None; }
        log::debug!("removed {} node(s) via {:?} from {}", doomed.len(), strategy, id);
        doomed.into_iter().collect()
    }

    /// Replace the whole graph with imported data.
    pub fn load_graph(&mut self, nodes: Vec<IncomingNode>, edges: Vec<Link>) -> Vec<NodeId> {
        let center = self.bounds.center();
        let max_seen = nodes
            .iter()
            .filter_map(|n| n.id)
            .chain(edges.iter().map(|e| e.from.max(e.to)))
            .max()
            .unwrap_or(0);
        self.ids.advance_past(max_seen);

        let mut order: Vec<NodeId> = Vec::with_capacity(nodes.len());
        let mut graph = FamilyGraph::new();
        for incoming in nodes {
            let Some(id) = incoming.id.or_else(|| self.ids.fresh()) else {
                log::warn!("id space exhausted, skipping imported node {:?}", incoming.name);
                continue;
            };
            let pos = Point::new(incoming.x.unwrap_or(center.x), incoming.y.unwrap_or(center.y));
            let mut node = Node::new(id, incoming.name, pos);
            node.is_self = incoming.is_self;
            node.attributes = incoming.attributes;
            graph.insert_node(node);
            order.push(id);
        }
        for e in edges {
            graph.add_edge(e.from, e.to);
        }
        self.graph = graph;
        self.selected = order.first().copied();
        self.editing = None;
        log::debug!("loaded {} node(s), {} edge(s)", self.graph.node_count(), self.graph.edge_count());
        order
    }

    pub fn apply(&mut self, command: Command) -> Outcome {
        match command {
            Command::AddRoot { center } => {
                let created: Vec<NodeId> = self.add_root_node(center).into_iter().map(|n| n.id).collect();
                let changed = !created.is_empty();
                Outcome { created, removed: Vec::new(), changed }
            }
            Command::AddRelative { anchor, kind } => {
                let created: Vec<NodeId> = self.add_relative(anchor, kind).into_iter().map(|n| n.id).collect();
                let changed = !created.is_empty();
                Outcome { created, removed: Vec::new(), changed }
            }
            Command::UpdateNode { id, patch } => {
                Outcome { changed: self.update_node(id, patch), ..Default::default() }
            }
            Command::MoveNode { id, dx, dy } => {
                Outcome { changed: self.move_node(id, dx, dy).is_some(), ..Default::default() }
            }
            Command::SetPosition { id, pos } => {
                Outcome { changed: self.set_position(id, pos).is_some(), ..Default::default() }
            }
            Command::RemoveNode { id } => {
                let removed = self.remove_node(id);
                let changed = !removed.is_empty();
                Outcome { created: Vec::new(), removed, changed }
            }
            Command::Load { nodes, edges } => {
                let created = self.load_graph(nodes, edges);
                Outcome { created, removed: Vec::new(), changed: true }
            }
            Command::Select(id) => {
                self.select(id);
                Outcome { changed: true, ..Default::default() }
            }
            Command::Edit(id) => {
                self.set_editing(id);
                Outcome { changed: true, ..Default::default() }
            }
        }
    }
}
