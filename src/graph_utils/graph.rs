use std::collections::{BTreeMap, BTreeSet, HashSet};
use serde::{Serialize, Deserialize};
use serde_json::Value;

// Basic type aliases for clarity
pub type NodeId = u64;
pub type Attributes = BTreeMap<String, Value>;

// Display names given to freshly created people
pub const SELF_NAME: &str = "Я";
pub const PARENT_PREFIX: &str = "Родитель";
pub const CHILD_PREFIX: &str = "Ребёнок";

// Keys that never change through an attribute patch
pub const RESERVED_KEYS: [&str; 4] = ["id", "x", "y", "isSelf"];

fn is_false(b: &bool) -> bool { !*b }

/// A position in canvas (model) space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self { Self { x, y } }
}

/// A person in the tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(rename = "isSelf", default, skip_serializing_if = "is_false")]
    pub is_self: bool,
    // age, birthYear, birthDate, location, biography, avatar and anything else
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl Node {
    pub fn new(id: NodeId, name: impl Into<String>, pos: Point) -> Self {
        Node { id, name: name.into(), x: pos.x, y: pos.y, is_self: false, attributes: Attributes::new() }
    }

    pub fn position(&self) -> Point { Point::new(self.x, self.y) }

    /// Attribute rendered as text; empty strings and nulls count as absent.
    pub fn attribute_text(&self, key: &str) -> Option<String> {
        match self.attributes.get(key)? {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Directed relation, `from` is the parent and `to` the child.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub from: NodeId,
    pub to: NodeId,
}

impl Link {
    pub const fn new(from: NodeId, to: NodeId) -> Self { Self { from, to } }
    pub fn touches(&self, id: NodeId) -> bool { self.from == id || self.to == id }
}

/// Which relatives go down together with a removed node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeletionStrategy {
    /// The node, its ancestors and its descendants.
    FullLineage,
    /// The node and its ancestors; children stay behind, unlinked.
    AncestorsOnly,
}

impl DeletionStrategy {
    pub fn for_node(node: &Node) -> Self {
        if node.is_self { DeletionStrategy::FullLineage } else { DeletionStrategy::AncestorsOnly }
    }
}

/// Size of the square drawing surface and the radius of a person circle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasBounds {
    pub size: f64,
    pub node_radius: f64,
}

impl Default for CanvasBounds {
    fn default() -> Self { Self { size: 5000.0, node_radius: 30.0 } }
}

impl CanvasBounds {
    pub fn center(&self) -> Point { Point::new(self.size / 2.0, self.size / 2.0) }

    pub fn clamp(&self, p: Point) -> Point {
        let lo = self.node_radius;
        let hi = (self.size - self.node_radius).max(lo);
        Point::new(p.x.clamp(lo, hi), p.y.clamp(lo, hi))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FamilyGraph {
    nodes: BTreeMap<NodeId, Node>,
    edges: Vec<Link>,
}

impl FamilyGraph {
    pub fn new() -> Self { Self::default() }

    pub fn from_parts(nodes: impl IntoIterator<Item = Node>, edges: Vec<Link>) -> Self {
        let nodes = nodes.into_iter().map(|n| (n.id, n)).collect();
        Self { nodes, edges }
    }

    pub fn insert_node(&mut self, node: Node) { self.nodes.insert(node.id, node); }

    // Edges are stored even when an endpoint is missing; readers skip them.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) { self.edges.push(Link::new(from, to)); }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> { self.nodes.get(&id) }
    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut Node> { self.nodes.get_mut(&id) }
    pub fn contains(&self, id: NodeId) -> bool { self.nodes.contains_key(&id) }
    pub fn nodes(&self) -> impl Iterator<Item = &Node> { self.nodes.values() }
    pub fn edges(&self) -> &[Link] { &self.edges }
    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn edge_count(&self) -> usize { self.edges.len() }
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    /// Edges whose both endpoints resolve, paired with their nodes.
    pub fn resolved_edges(&self) -> impl Iterator<Item = (&Node, &Node)> {
        self.edges
            .iter()
            .filter_map(|e| Some((self.nodes.get(&e.from)?, self.nodes.get(&e.to)?)))
    }

    pub fn parents_of(&self, id: NodeId) -> Vec<NodeId> {
        self.edges.iter().filter(|e| e.to == id).map(|e| e.from).collect()
    }

    pub fn children_of(&self, id: NodeId) -> Vec<NodeId> {
        self.edges.iter().filter(|e| e.from == id).map(|e| e.to).collect()
    }

    pub fn descendants(&self, start: NodeId) -> Vec<NodeId> {
        self.walk(start, |e, cur| (e.from == cur).then_some(e.to))
    }

    pub fn ancestors(&self, start: NodeId) -> Vec<NodeId> {
        self.walk(start, |e, cur| (e.to == cur).then_some(e.from))
    }

    // Iterative DFS; every id is pushed at most once, so cycles terminate.
    fn walk(&self, start: NodeId, step: impl Fn(&Link, NodeId) -> Option<NodeId>) -> Vec<NodeId> {
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut found: Vec<NodeId> = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            for next in self.edges.iter().filter_map(|e| step(e, current)) {
                if visited.insert(next) {
                    if next != start { found.push(next); }
                    stack.push(next);
                }
            }
        }
        found
    }

    pub fn removal_set(&self, id: NodeId, strategy: DeletionStrategy) -> BTreeSet<NodeId> {
        let mut set: BTreeSet<NodeId> = BTreeSet::new();
        set.insert(id);
        set.extend(self.ancestors(id));
        if strategy == DeletionStrategy::FullLineage {
            set.extend(self.descendants(id));
        }
        set
    }

    /// Drop every listed node and every edge touching one of them.
    pub fn remove_all(&mut self, ids: &BTreeSet<NodeId>) {
        self.nodes.retain(|id, _| !ids.contains(id));
        self.edges.retain(|e| !ids.contains(&e.from) && !ids.contains(&e.to));
    }

    /// Topmost node whose circle contains `p`; later ids are drawn on top.
    pub fn node_at(&self, p: Point, radius: f64) -> Option<NodeId> {
        self.nodes
            .values()
            .rev()
            .find(|n| {
                let (dx, dy) = (n.x - p.x, n.y - p.y);
                dx * dx + dy * dy <= radius * radius
            })
            .map(|n| n.id)
    }

    pub fn max_referenced_id(&self) -> NodeId {
        let from_nodes = self.nodes.keys().copied().max().unwrap_or(0);
        let from_edges = self.edges.iter().map(|e| e.from.max(e.to)).max().unwrap_or(0);
        from_nodes.max(from_edges)
    }
}
