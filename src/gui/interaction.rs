use crate::graph_utils::graph::{NodeId, Point};
use crate::graph_utils::store::TreeStore;
use super::viewport::Viewport;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HitTarget {
    Canvas,
    Node(NodeId),
}

/// Pointer and touch input, already reduced to screen coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PointerEvent {
    Down { pos: Point, target: HitTarget },
    Move { pos: Point },
    Up,
    Leave,
    DoubleClick { node: NodeId },
    Tap { pos: Point, node: NodeId },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InteractionState {
    Idle,
    PanningCanvas,
    DraggingNode(NodeId),
    EditingNode(NodeId),
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
enum Gesture {
    #[default]
    Idle,
    Panning,
    Dragging(NodeId),
}

/// Turns pointer sequences into store and viewport mutations.
///
/// The edit target lives in the store so removals can clear it; a drag may
/// run while a node is being edited.
#[derive(Clone, Debug, Default)]
pub struct InteractionMachine {
    gesture: Gesture,
    last_pos: Option<Point>,
}

impl InteractionMachine {
    pub fn new() -> Self { Self::default() }

    pub fn state(&self, store: &TreeStore) -> InteractionState {
        match self.gesture {
            Gesture::Panning => InteractionState::PanningCanvas,
            Gesture::Dragging(id) => InteractionState::DraggingNode(id),
            Gesture::Idle => match store.editing() {
                Some(id) => InteractionState::EditingNode(id),
                None => InteractionState::Idle,
            },
        }
    }

    pub fn is_active(&self) -> bool { self.gesture != Gesture::Idle }

    pub fn dragging(&self) -> Option<NodeId> {
        match self.gesture {
            Gesture::Dragging(id) => Some(id),
            _ => None,
        }
    }

    pub fn handle(&mut self, event: PointerEvent, store: &mut TreeStore, viewport: &mut Viewport) {
        match event {
            PointerEvent::Down { pos, target } => {
                match target {
                    HitTarget::Node(id) if store.node(id).is_some() => {
                        self.gesture = Gesture::Dragging(id);
                        store.select(Some(id));
                    }
                    _ => {
                        self.gesture = Gesture::Panning;
                        store.set_editing(None);
                    }
                }
                self.last_pos = Some(pos);
            }
            PointerEvent::Move { pos } => {
                let Some(last) = self.last_pos else { return };
                let (dx, dy) = (pos.x - last.x, pos.y - last.y);
                match self.gesture {
                    Gesture::Dragging(id) => {
                        let zoom = viewport.zoom();
                        store.move_node(id, dx / zoom, dy / zoom);
                    }
                    Gesture::Panning => viewport.pan_by(dx, dy),
                    Gesture::Idle => {}
                }
                self.last_pos = Some(pos);
            }
            PointerEvent::Up | PointerEvent::Leave => self.release(),
            PointerEvent::DoubleClick { node } => store.set_editing(Some(node)),
            PointerEvent::Tap { pos, node } => {
                if store.node(node).is_none() { return; }
                store.set_editing(Some(node));
                store.select(Some(node));
                self.gesture = Gesture::Dragging(node);
                self.last_pos = Some(pos);
            }
        }
    }

    /// Called every frame with the global button state; a release that never
    /// reached the canvas still ends the gesture.
    pub fn release_if_button_up(&mut self, primary_down: bool) -> bool {
        if primary_down || !self.is_active() { return false; }
        log::debug!("releasing {:?} after missed pointer-up", self.gesture);
        self.release();
        true
    }

    fn release(&mut self) {
        self.gesture = Gesture::Idle;
        self.last_pos = None;
    }
}
