use family_tree::export::document::{export_csv, export_json};
use family_tree::export::pdf::PdfRenderer;
use family_tree::export::report::{build_report, Block, DocumentRenderer, GraphSnapshot, HEADING, SEPARATOR, TITLE};
use family_tree::export::{export_csv_file, export_json_file, export_report_file};
use family_tree::graph_utils::graph::{Attributes, CanvasBounds, DeletionStrategy, FamilyGraph, Link, Node, Point};
use family_tree::graph_utils::store::{Command, IncomingNode, RelativeKind, TreeStore};
use family_tree::gui::interaction::{HitTarget, InteractionMachine, InteractionState, PointerEvent};
use family_tree::gui::viewport::{Viewport, ZoomBounds};
use family_tree::persistence::import::{decode_import, ImportError, MAX_IMPORT_ID};
use family_tree::persistence::persist::{load_import, CSV_FILE_NAME, JSON_FILE_NAME, PDF_FILE_NAME};
use family_tree::persistence::settings::AppSettings;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde_json::{json, Value};
use std::collections::HashMap;
use time::macros::datetime;

fn new_store() -> TreeStore {
    TreeStore::new(CanvasBounds::default())
}

fn text_blocks(blocks: &[Block]) -> Vec<String> {
    blocks
        .iter()
        .filter_map(|b| match b {
            Block::Text { text, .. } => Some(text.clone()),
            Block::Image { .. } => None,
        })
        .collect()
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Dictionary {
    match obj {
        Object::Reference(id) => doc.get_dictionary(*id).unwrap(),
        other => other.as_dict().unwrap(),
    }
}

// glyph id -> char, from the bfchar blocks of a ToUnicode CMap
fn parse_bfchar(cmap: &str) -> HashMap<u16, char> {
    let mut map = HashMap::new();
    let mut inside = false;
    for line in cmap.lines().map(str::trim) {
        if line.ends_with("beginbfchar") { inside = true; continue; }
        if line == "endbfchar" { inside = false; continue; }
        if !inside { continue; }
        let hex: Vec<&str> = line.split_whitespace().map(|t| t.trim_matches(|c| c == '<' || c == '>')).collect();
        if let [gid, uni] = hex[..] {
            let gid = u16::from_str_radix(gid, 16).unwrap();
            if let Some(c) = u32::from_str_radix(uni, 16).ok().and_then(char::from_u32) {
                map.insert(gid, c);
            }
        }
    }
    map
}

fn page_font_maps(doc: &Document, page_id: ObjectId) -> HashMap<Vec<u8>, HashMap<u16, char>> {
    let page = doc.get_dictionary(page_id).unwrap();
    let resources = resolve(doc, page.get(b"Resources").unwrap());
    let fonts = resolve(doc, resources.get(b"Font").unwrap());
    let mut maps = HashMap::new();
    for (name, font) in fonts.iter() {
        let Ok(cmap) = resolve(doc, font).get(b"ToUnicode").and_then(Object::as_reference) else { continue };
        let stream = doc.get_object(cmap).and_then(Object::as_stream).unwrap();
        maps.insert(name.clone(), parse_bfchar(&String::from_utf8_lossy(&stream.content)));
    }
    maps
}

// One entry per page, one string per text run in drawing order
fn pdf_page_texts(bytes: &[u8]) -> Vec<Vec<String>> {
    let mut doc = Document::load_mem(bytes).unwrap();
    doc.decompress();
    let mut pages = Vec::new();
    for (_, page_id) in doc.get_pages() {
        let fonts = page_font_maps(&doc, page_id);
        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        let mut current: Option<&HashMap<u16, char>> = None;
        let mut runs = Vec::new();
        for op in &content.operations {
            match op.operator.as_str() {
                "Tf" => current = op.operands[0].as_name().ok().and_then(|n| fonts.get(n)),
                "Tj" => {
                    let map = current.expect("text drawn with a font that has no ToUnicode map");
                    let glyphs = op.operands[0].as_str().unwrap();
                    let text: String = glyphs
                        .chunks(2)
                        .map(|g| map.get(&u16::from_be_bytes([g[0], g[1]])).copied().unwrap_or('\u{fffd}'))
                        .collect();
                    runs.push(text);
                }
                _ => {}
            }
        }
        pages.push(runs);
    }
    pages
}

fn position_of(runs: &[String], text: &str) -> usize {
    runs.iter().position(|r| r == text).unwrap_or_else(|| panic!("{:?} not found in {:?}", text, runs))
}

// 800x600 surface at the screen origin, recentred on the canvas midpoint
fn ready_viewport() -> Viewport {
    let mut vp = Viewport::new(5000.0, ZoomBounds::default());
    vp.set_surface(Point::new(0.0, 0.0), Point::new(800.0, 600.0));
    assert!(vp.on_frame());
    vp
}

#[test]
fn store_add_child_links_and_removes() {
    let mut store = new_store();
    let root = store.add_root_node(Some(Point::new(1000.0, 1000.0))).unwrap();
    assert!(root.is_self);
    assert_eq!(root.name, "Я");

    let child = store.add_relative(root.id, RelativeKind::Child);
    assert_eq!(child.len(), 1);
    let child = &child[0];
    assert_eq!(child.name, format!("Ребёнок {}", child.id));
    assert_eq!(child.position(), Point::new(1000.0, 1200.0));
    assert_eq!(store.graph().edges(), &[Link::new(root.id, child.id)]);

    // A non-self node goes down with its ancestors
    let removed = store.remove_node(child.id);
    assert_eq!(removed, vec![root.id, child.id]);
    assert!(store.graph().is_empty());
    assert_eq!(store.graph().edge_count(), 0);
}

#[test]
fn store_self_with_parents_scenario() {
    let mut store = new_store();
    let me = store.add_root_node(None).unwrap();
    assert_eq!(me.id, 1);
    assert_eq!(me.position(), Point::new(400.0, 100.0));

    let parents = store.add_relative(me.id, RelativeKind::Parent);
    let ids: Vec<u64> = parents.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![2, 3]);
    assert_eq!(parents[0].name, "Родитель 2");
    assert_eq!(parents[1].name, "Родитель 3");
    assert_eq!(parents[0].position(), Point::new(280.0, -100.0));
    assert_eq!(parents[1].position(), Point::new(520.0, -100.0));
    assert_eq!(store.graph().edges(), &[Link::new(2, 1), Link::new(3, 1)]);

    let removed = store.remove_node(1);
    assert_eq!(removed, vec![1, 2, 3]);
    assert!(store.graph().is_empty());
    assert_eq!(store.graph().edge_count(), 0);
    assert_eq!(store.selected(), None);
    // ids are never handed out twice
    assert_eq!(store.next_id(), Some(4));
}

#[test]
fn store_self_removal_takes_descendants_but_others_do_not() {
    let mut store = new_store();
    let me = store.add_root_node(Some(Point::new(2500.0, 2500.0))).unwrap();
    let parents = store.add_relative(me.id, RelativeKind::Parent);
    let kid = store.add_relative(me.id, RelativeKind::Child).remove(0);
    let grandkid = store.add_relative(kid.id, RelativeKind::Child).remove(0);

    // Removing a non-self child keeps its own children, unlinked
    let mut other = store.clone();
    let removed = other.remove_node(kid.id);
    assert!(removed.contains(&kid.id));
    assert!(removed.contains(&me.id), "ancestors go with the removed node");
    assert!(other.node(grandkid.id).is_some());
    assert!(other.graph().parents_of(grandkid.id).is_empty());

    let removed = store.remove_node(me.id);
    for id in [me.id, parents[0].id, parents[1].id, kid.id, grandkid.id] {
        assert!(removed.contains(&id), "{} should be removed", id);
    }
    assert!(store.graph().is_empty());
}

#[test]
fn store_remove_with_explicit_strategy() {
    let mut store = new_store();
    let me = store.add_root_node(Some(Point::new(2500.0, 2500.0))).unwrap();
    let kid = store.add_relative(me.id, RelativeKind::Child).remove(0);
    let removed = store.remove_node_with(me.id, DeletionStrategy::AncestorsOnly);
    assert_eq!(removed, vec![me.id]);
    assert!(store.node(kid.id).is_some());
    assert!(store.remove_node(999).is_empty());
}

#[test]
fn store_move_clamps_and_is_idempotent_at_zero() {
    let mut store = new_store();
    let n = store.add_root_node(Some(Point::new(100.0, 100.0))).unwrap();
    assert_eq!(store.move_node(n.id, -500.0, 10_000.0), Some(Point::new(30.0, 4970.0)));
    let before = store.node(n.id).map(|n| n.position());
    store.move_node(n.id, 0.0, 0.0);
    store.move_node(n.id, 0.0, 0.0);
    assert_eq!(store.node(n.id).map(|n| n.position()), before);
    assert_eq!(store.set_position(n.id, Point::new(-1.0, 6000.0)), Some(Point::new(30.0, 4970.0)));
    assert_eq!(store.move_node(12345, 1.0, 1.0), None);
}

#[test]
fn store_update_node_merges_and_ignores_reserved_keys() {
    let mut store = new_store();
    let n = store.add_root_node(None).unwrap();
    let mut patch = Attributes::new();
    patch.insert("name".into(), json!("Анна"));
    patch.insert("location".into(), json!("Казань"));
    patch.insert("id".into(), json!(77));
    patch.insert("x".into(), json!(9999));
    patch.insert("isSelf".into(), json!(false));
    assert!(store.update_node(n.id, patch));

    let node = store.node(n.id).cloned().unwrap();
    assert_eq!(node.name, "Анна");
    assert_eq!(node.id, n.id);
    assert_eq!(node.x, n.x);
    assert!(node.is_self);
    assert_eq!(node.attribute_text("location").as_deref(), Some("Казань"));

    let mut clear = Attributes::new();
    clear.insert("location".into(), Value::Null);
    store.update_node(n.id, clear);
    assert!(store.node(n.id).unwrap().attributes.is_empty());
    assert!(!store.update_node(42, Attributes::new()));
}

#[test]
fn store_commands_report_outcomes() {
    let mut store = new_store();
    let out = store.apply(Command::AddRoot { center: None });
    assert_eq!(out.created, vec![1]);
    let out = store.apply(Command::AddRelative { anchor: 1, kind: RelativeKind::Parent });
    assert_eq!(out.created, vec![2, 3]);
    let out = store.apply(Command::AddRelative { anchor: 99, kind: RelativeKind::Child });
    assert!(!out.changed);

    store.apply(Command::Edit(Some(2)));
    assert_eq!(store.editing(), Some(2));
    store.apply(Command::Select(Some(3)));
    assert_eq!(store.selected(), Some(3));
    // unknown ids never become the selection
    store.apply(Command::Select(Some(50)));
    assert_eq!(store.selected(), None);

    let out = store.apply(Command::RemoveNode { id: 2 });
    assert_eq!(out.removed, vec![2]);
    assert_eq!(store.editing(), None);
}

#[test]
fn graph_traversal_terminates_on_cycles() {
    let nodes = (1..=3).map(|id| Node::new(id, format!("n{}", id), Point::new(100.0, 100.0)));
    let graph = FamilyGraph::from_parts(nodes, vec![Link::new(1, 2), Link::new(2, 3), Link::new(3, 1)]);
    let mut desc = graph.descendants(1);
    desc.sort();
    assert_eq!(desc, vec![2, 3]);
    let mut anc = graph.ancestors(1);
    anc.sort();
    assert_eq!(anc, vec![2, 3]);
    assert_eq!(graph.removal_set(1, DeletionStrategy::FullLineage).len(), 3);
}

#[test]
fn graph_hit_test_prefers_topmost() {
    let nodes = vec![
        Node::new(1, "a", Point::new(100.0, 100.0)),
        Node::new(2, "b", Point::new(120.0, 100.0)),
    ];
    let graph = FamilyGraph::from_parts(nodes, Vec::new());
    assert_eq!(graph.node_at(Point::new(110.0, 100.0), 30.0), Some(2));
    assert_eq!(graph.node_at(Point::new(75.0, 100.0), 30.0), Some(1));
    assert_eq!(graph.node_at(Point::new(500.0, 500.0), 30.0), None);
}

#[test]
fn import_fills_defaults_and_selects_first() {
    let text = r#"{ "nodes": [ { "name": "Безымянный" }, { "id": 7, "name": "Дед", "x": 10, "y": 20 } ] }"#;
    let imported = decode_import(text).unwrap();
    let mut store = new_store();
    let order = store.load_graph(imported.nodes, imported.edges);
    assert_eq!(order.len(), 2);

    let first = store.node(order[0]).unwrap();
    assert_eq!(first.position(), Point::new(2500.0, 2500.0));
    assert!(first.id > 7, "fresh ids go past every id in the file");
    assert_eq!(store.selected(), Some(order[0]));
    assert_eq!(store.node(7).unwrap().position(), Point::new(10.0, 20.0));
}

#[test]
fn import_single_node_without_position() {
    let imported = decode_import(r#"{ "nodes": [ { "id": 5, "name": "A" } ], "edges": [] }"#).unwrap();
    let mut store = new_store();
    store.load_graph(imported.nodes, imported.edges);
    assert_eq!(store.node(5).unwrap().position(), Point::new(2500.0, 2500.0));
    assert_eq!(store.selected(), Some(5));
    assert_eq!(store.next_id(), Some(6));

    let empty = decode_import(r#"{ "nodes": [] }"#).unwrap();
    assert!(empty.is_empty());
    store.load_graph(empty.nodes, empty.edges);
    assert_eq!(store.selected(), None);
    // the counter never moves backwards
    assert_eq!(store.next_id(), Some(6));
}

#[test]
fn import_advances_ids_past_edges_too() {
    let text = r#"{ "nodes": [ { "id": 3, "name": "a" } ], "edges": [ { "from": 40, "to": 3 } ] }"#;
    let imported = decode_import(text).unwrap();
    let mut store = new_store();
    store.apply(Command::Load { nodes: imported.nodes, edges: imported.edges });
    assert_eq!(store.next_id(), Some(41));
    // the dangling edge is kept but never drawn
    assert_eq!(store.graph().edge_count(), 1);
    assert_eq!(store.graph().resolved_edges().count(), 0);
}

#[test]
fn import_accepts_bare_and_wrapped_nodes() {
    let text = r#"[ { "node": { "id": 1, "name": "Я", "age": 30 } }, { "id": 2, "name": "Сын", "avatar": null } ]"#;
    let imported = decode_import(text).unwrap();
    assert_eq!(imported.nodes.len(), 2);
    assert!(imported.edges.is_empty());
    // legacy files flag the self node by its name
    assert!(imported.nodes[0].is_self);
    assert!(!imported.nodes[1].is_self);
    assert_eq!(imported.nodes[0].attributes.get("age"), Some(&json!(30)));
    assert!(imported.nodes[1].attributes.is_empty());
}

#[test]
fn import_distinguishes_syntax_from_shape() {
    let err = decode_import("{ not json").unwrap_err();
    assert!(matches!(err, ImportError::Syntax(_)));
    assert!(err.to_string().starts_with("Ошибка чтения файла"));

    for bad in ["42", r#"{ "people": [] }"#, r#"{ "nodes": 5 }"#, r#"[1, 2]"#] {
        let err = decode_import(bad).unwrap_err();
        assert!(matches!(err, ImportError::Shape(_)), "{} should be a shape error", bad);
        assert!(err.to_string().starts_with("Неверный формат JSON"));
    }
}

#[test]
fn import_keeps_explicit_self_flag() {
    let text = r#"{ "nodes": [ { "id": 1, "name": "Я" }, { "id": 2, "name": "Мама", "isSelf": true } ] }"#;
    let imported = decode_import(text).unwrap();
    assert!(!imported.nodes[0].is_self);
    assert!(imported.nodes[1].is_self);
}

#[test]
fn json_export_round_trips_through_import() {
    let mut store = new_store();
    let me = store.add_root_node(Some(Point::new(2500.0, 2500.0))).unwrap();
    store.add_relative(me.id, RelativeKind::Parent);
    let mut patch = Attributes::new();
    patch.insert("biography".into(), json!("Родился в Перми"));
    store.update_node(me.id, patch);

    let text = export_json(store.graph()).unwrap();
    assert!(text.ends_with('\n'));
    let imported = decode_import(&text).unwrap();
    let mut copy = new_store();
    copy.load_graph(imported.nodes, imported.edges);
    assert_eq!(copy.graph(), store.graph());
    assert_eq!(copy.next_id(), store.next_id());
}

#[test]
fn csv_export_lists_relatives() {
    let mut store = new_store();
    let me = store.add_root_node(Some(Point::new(2500.0, 2500.0))).unwrap();
    store.add_relative(me.id, RelativeKind::Parent);
    let bytes = export_csv(store.graph()).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("id,name,x,y,parents,children,attributes_json"));
    let me_row = lines.next().unwrap();
    assert!(me_row.starts_with("1,Я,2500,2500,2;3,,"), "{}", me_row);
    assert_eq!(text.lines().count(), 4);
}

#[test]
fn interaction_pans_canvas_and_drags_nodes() {
    let mut store = new_store();
    let n = store.add_root_node(Some(Point::new(2500.0, 2500.0))).unwrap();
    let mut vp = ready_viewport();
    assert_eq!(vp.scroll(), Point::new(2100.0, 2200.0));
    let mut im = InteractionMachine::new();

    im.handle(PointerEvent::Down { pos: Point::new(100.0, 100.0), target: HitTarget::Canvas }, &mut store, &mut vp);
    assert_eq!(im.state(&store), InteractionState::PanningCanvas);
    im.handle(PointerEvent::Move { pos: Point::new(150.0, 120.0) }, &mut store, &mut vp);
    assert_eq!(vp.scroll(), Point::new(2050.0, 2180.0));
    im.handle(PointerEvent::Up, &mut store, &mut vp);
    assert_eq!(im.state(&store), InteractionState::Idle);

    vp.set_zoom(2.0);
    im.handle(PointerEvent::Down { pos: Point::new(10.0, 10.0), target: HitTarget::Node(n.id) }, &mut store, &mut vp);
    assert_eq!(im.state(&store), InteractionState::DraggingNode(n.id));
    assert_eq!(store.selected(), Some(n.id));
    im.handle(PointerEvent::Move { pos: Point::new(30.0, 50.0) }, &mut store, &mut vp);
    assert_eq!(store.node(n.id).unwrap().position(), Point::new(2510.0, 2520.0));
    im.handle(PointerEvent::Leave, &mut store, &mut vp);
    assert!(!im.is_active());
}

#[test]
fn interaction_recovers_from_missed_release() {
    let mut store = new_store();
    let n = store.add_root_node(Some(Point::new(2500.0, 2500.0))).unwrap();
    let mut vp = ready_viewport();
    let mut im = InteractionMachine::new();

    im.handle(PointerEvent::Down { pos: Point::new(0.0, 0.0), target: HitTarget::Node(n.id) }, &mut store, &mut vp);
    assert!(!im.release_if_button_up(true));
    assert_eq!(im.dragging(), Some(n.id));
    assert!(im.release_if_button_up(false));
    assert_eq!(im.dragging(), None);

    // stray moves after the release do nothing
    im.handle(PointerEvent::Move { pos: Point::new(100.0, 100.0) }, &mut store, &mut vp);
    assert_eq!(store.node(n.id).unwrap().position(), Point::new(2500.0, 2500.0));
    assert!(!im.release_if_button_up(false));
}

#[test]
fn interaction_editing_and_tap() {
    let mut store = new_store();
    let n = store.add_root_node(Some(Point::new(2500.0, 2500.0))).unwrap();
    let mut vp = ready_viewport();
    let mut im = InteractionMachine::new();

    im.handle(PointerEvent::DoubleClick { node: n.id }, &mut store, &mut vp);
    assert_eq!(im.state(&store), InteractionState::EditingNode(n.id));
    // a press on empty canvas closes the editor
    im.handle(PointerEvent::Down { pos: Point::new(0.0, 0.0), target: HitTarget::Canvas }, &mut store, &mut vp);
    assert_eq!(store.editing(), None);
    im.handle(PointerEvent::Up, &mut store, &mut vp);

    store.select(None);
    im.handle(PointerEvent::Tap { pos: Point::new(5.0, 5.0), node: n.id }, &mut store, &mut vp);
    assert_eq!(store.editing(), Some(n.id));
    assert_eq!(store.selected(), Some(n.id));
    assert_eq!(im.state(&store), InteractionState::DraggingNode(n.id));

    // touching a node that is gone changes nothing
    im.handle(PointerEvent::Up, &mut store, &mut vp);
    im.handle(PointerEvent::Tap { pos: Point::new(5.0, 5.0), node: 404 }, &mut store, &mut vp);
    assert!(!im.is_active());
}

#[test]
fn viewport_converts_between_screen_and_model() {
    let mut vp = ready_viewport();
    assert_eq!(vp.screen_to_model(Point::new(400.0, 300.0)), Point::new(2500.0, 2500.0));
    assert_eq!(vp.model_to_screen(Point::new(2500.0, 2500.0)), Point::new(400.0, 300.0));
    assert_eq!(vp.visible_center(), Some(Point::new(2500.0, 2500.0)));

    vp.set_zoom(2.0);
    assert!(vp.recenter_pending());
    assert!(vp.on_frame());
    assert_eq!(vp.scroll(), Point::new(4600.0, 4700.0));
    assert_eq!(vp.screen_to_model(Point::new(400.0, 300.0)), Point::new(2500.0, 2500.0));
}

#[test]
fn viewport_zoom_stays_in_bounds() {
    let mut vp = Viewport::new(5000.0, ZoomBounds::default());
    for _ in 0..100 { vp.zoom_in(); }
    assert!((vp.zoom() - 2.5).abs() < 1e-9);
    for _ in 0..100 { vp.zoom_out(); }
    assert!((vp.zoom() - 0.3).abs() < 1e-9);
    vp.set_zoom(f64::NAN);
    assert!(vp.zoom() > 0.0);

    let odd = ZoomBounds::new(0.0, -1.0, 0.0);
    assert!(odd.min() > 0.0);
    assert!(odd.max() >= odd.min());
    assert!(odd.step() > 0.0);
}

#[test]
fn viewport_recenter_waits_for_surface_and_can_be_cancelled() {
    let mut vp = Viewport::new(5000.0, ZoomBounds::default());
    // no surface yet
    assert!(!vp.on_frame());
    assert_eq!(vp.visible_center(), None);

    vp.set_surface(Point::new(0.0, 0.0), Point::new(800.0, 600.0));
    vp.cancel_recenter();
    assert!(!vp.on_frame());
    assert_eq!(vp.scroll(), Point::new(0.0, 0.0));

    // panning never leaves the canvas
    vp.pan_by(100.0, 100.0);
    assert_eq!(vp.scroll(), Point::new(0.0, 0.0));
    vp.pan_by(-10_000.0, -10_000.0);
    assert_eq!(vp.scroll(), Point::new(4200.0, 4400.0));
}

#[test]
fn report_has_title_heading_and_person_blocks() {
    let mut store = new_store();
    let me = store.add_root_node(Some(Point::new(2500.0, 2500.0))).unwrap();
    let mut patch = Attributes::new();
    patch.insert("birthYear".into(), json!(1990));
    patch.insert("biography".into(), json!("Инженер"));
    patch.insert("hobby".into(), json!("шахматы"));
    patch.insert("location".into(), json!(""));
    store.update_node(me.id, patch);
    store.add_relative(me.id, RelativeKind::Child);

    let when = datetime!(2024-03-05 14:07 UTC);
    let report = build_report(store.graph(), None, when);
    assert!(!report.has_image());
    let texts = text_blocks(&report.blocks);
    assert_eq!(texts[0], TITLE);
    assert_eq!(texts[1], "Создано: 2024-03-05 14:07 UTC");
    assert_eq!(texts[2], HEADING);
    assert_eq!(
        &texts[3..9],
        &["Имя: Я", "Год рождения: 1990", "Биография:", "Инженер", "hobby: шахматы", SEPARATOR]
    );
    assert_eq!(texts[9], "Имя: Ребёнок 2");
    assert_eq!(texts.iter().filter(|t| t.as_str() == SEPARATOR).count(), 2);
}

#[test]
fn report_puts_snapshot_first() {
    let mut store = new_store();
    let me = store.add_root_node(Some(Point::new(2500.0, 2500.0))).unwrap();
    store.add_relative(me.id, RelativeKind::Parent);
    let snap = GraphSnapshot::capture(store.graph(), 30.0, Some(me.id)).unwrap();
    assert_eq!(snap.nodes.len(), 3);
    assert_eq!(snap.lines.len(), 2);
    assert!(snap.nodes.iter().filter(|n| n.selected).count() == 1);

    let report = build_report(store.graph(), Some(snap), datetime!(2024-01-01 0:00 UTC));
    assert!(matches!(report.blocks[0], Block::Image { .. }));
    assert!(GraphSnapshot::capture(&FamilyGraph::new(), 30.0, None).is_none());
}

#[test]
fn pdf_renderer_produces_a_document() {
    let mut store = new_store();
    let me = store.add_root_node(Some(Point::new(2500.0, 2500.0))).unwrap();
    store.add_relative(me.id, RelativeKind::Parent);
    let snap = GraphSnapshot::capture(store.graph(), 30.0, None);
    let report = build_report(store.graph(), snap, datetime!(2024-01-01 0:00 UTC));
    let bytes = PdfRenderer::default().render(&report).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[test]
fn settings_defaults_and_partial_json() {
    let s = AppSettings::default();
    assert_eq!(s.canvas_bounds(), CanvasBounds { size: 5000.0, node_radius: 30.0 });
    assert_eq!(s.export_dir(), AppSettings::export_default_dir());

    let s = AppSettings::from_json(r#"{ "canvas_size": 1000, "zoom_max": 4.0, "export_override": "/tmp/ft" }"#).unwrap();
    assert_eq!(s.canvas_bounds().size, 1000.0);
    assert_eq!(s.node_radius, 30.0);
    assert_eq!(s.zoom_bounds().max(), 4.0);
    assert_eq!(s.export_dir(), std::path::PathBuf::from("/tmp/ft"));

    let broken = AppSettings::from_json(r#"{ "canvas_size": -5, "node_radius": 0 }"#).unwrap();
    assert_eq!(broken.canvas_bounds(), CanvasBounds::default());
    assert!(AppSettings::from_json("nope").is_err());
}

#[test]
fn export_files_land_in_directory_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("nested");
    let mut store = new_store();
    let me = store.add_root_node(Some(Point::new(2500.0, 2500.0))).unwrap();
    store.add_relative(me.id, RelativeKind::Child);

    let json_path = export_json_file(store.graph(), &out).unwrap();
    assert_eq!(json_path, out.join(JSON_FILE_NAME));
    let csv_path = export_csv_file(store.graph(), &out).unwrap();
    assert_eq!(csv_path, out.join(CSV_FILE_NAME));
    let pdf_path = export_report_file(store.graph(), 30.0, Some(me.id), &PdfRenderer::default(), &out).unwrap();
    assert_eq!(pdf_path, out.join(PDF_FILE_NAME));
    assert!(std::fs::metadata(&pdf_path).unwrap().len() > 0);

    let imported = load_import(&json_path).unwrap();
    assert_eq!(imported.nodes.len(), 2);
    assert_eq!(imported.edges, vec![Link::new(me.id, 2)]);
    assert!(imported.nodes[0].is_self);
}

#[test]
fn load_import_surfaces_format_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{ \"nodes\": \"x\" }").unwrap();
    let err = load_import(&path).unwrap_err();
    assert!(matches!(err.downcast_ref::<ImportError>(), Some(ImportError::Shape(_))));
    assert!(load_import(&dir.path().join("missing.json")).is_err());
}

#[test]
fn import_rejects_ids_without_room_to_grow() {
    let err = decode_import(r#"{ "nodes": [ { "id": 18446744073709551615, "name": "Край" } ] }"#).unwrap_err();
    assert!(matches!(err, ImportError::Shape(_)));

    let too_big = format!(r#"{{ "nodes": [ {{ "id": {}, "name": "a" }} ] }}"#, MAX_IMPORT_ID + 1);
    assert!(matches!(decode_import(&too_big).unwrap_err(), ImportError::Shape(_)));

    let edge = format!(r#"{{ "nodes": [ {{ "id": 1, "name": "a" }} ], "edges": [ {{ "from": {}, "to": 1 }} ] }}"#, u64::MAX);
    assert!(matches!(decode_import(&edge).unwrap_err(), ImportError::Shape(_)));

    // the largest accepted id still leaves room for new relatives
    let largest = format!(r#"{{ "nodes": [ {{ "id": {}, "name": "Я", "isSelf": true }} ] }}"#, MAX_IMPORT_ID);
    let imported = decode_import(&largest).unwrap();
    let mut store = new_store();
    store.load_graph(imported.nodes, imported.edges);
    assert_eq!(store.next_id(), Some(MAX_IMPORT_ID + 1));
    let parents = store.add_relative(MAX_IMPORT_ID, RelativeKind::Parent);
    assert_eq!(parents.iter().map(|n| n.id).collect::<Vec<_>>(), vec![MAX_IMPORT_ID + 1, MAX_IMPORT_ID + 2]);
}

#[test]
fn import_rejects_zero_and_duplicate_ids() {
    for bad in [
        r#"{ "nodes": [ { "id": 0, "name": "a" } ] }"#,
        r#"{ "nodes": [ { "id": 3, "name": "a" }, { "id": 3, "name": "b" } ] }"#,
        r#"{ "nodes": [ { "id": 3, "name": "a" } ], "edges": [ { "from": 0, "to": 3 } ] }"#,
    ] {
        let err = decode_import(bad).unwrap_err();
        assert!(matches!(err, ImportError::Shape(_)), "{} should be a shape error", bad);
    }
    // nodes without ids are still filled in
    assert_eq!(decode_import(r#"{ "nodes": [ { "name": "a" }, { "name": "b" } ] }"#).unwrap().nodes.len(), 2);
}

#[test]
fn store_stops_adding_when_ids_run_out() {
    let mut store = new_store();
    let last = IncomingNode { id: Some(u64::MAX), name: "Край".into(), is_self: true, ..Default::default() };
    store.load_graph(vec![last], Vec::new());
    assert_eq!(store.next_id(), None);

    assert!(store.add_relative(u64::MAX, RelativeKind::Child).is_empty());
    assert!(store.add_relative(u64::MAX, RelativeKind::Parent).is_empty());
    assert!(store.add_root_node(None).is_none());
    let outcome = store.apply(Command::AddRoot { center: None });
    assert!(outcome.created.is_empty());
    assert!(!outcome.changed);

    assert_eq!(store.graph().node_count(), 1);
    assert_eq!(store.node(u64::MAX).unwrap().name, "Край");
    assert_eq!(store.graph().edge_count(), 0);
}

#[test]
fn pdf_report_text_is_readable_in_order() {
    let mut store = new_store();
    let me = store.add_root_node(Some(Point::new(2500.0, 2500.0))).unwrap();
    store.add_relative(me.id, RelativeKind::Child);
    let report = build_report(store.graph(), None, datetime!(2024-03-05 14:07 UTC));
    let bytes = PdfRenderer::default().render(&report).unwrap();

    let pages = pdf_page_texts(&bytes);
    assert_eq!(pages.len(), 1);
    let runs = &pages[0];
    let order = [
        position_of(runs, TITLE),
        position_of(runs, "Создано: 2024-03-05 14:07 UTC"),
        position_of(runs, HEADING),
        position_of(runs, "Имя: Я"),
        position_of(runs, SEPARATOR),
        position_of(runs, "Имя: Ребёнок 2"),
    ];
    assert!(order.windows(2).all(|w| w[0] < w[1]), "out of order: {:?}", order);
}

#[test]
fn pdf_report_puts_picture_on_first_page() {
    let mut store = new_store();
    let me = store.add_root_node(Some(Point::new(2500.0, 2500.0))).unwrap();
    store.add_relative(me.id, RelativeKind::Parent);
    let snap = GraphSnapshot::capture(store.graph(), 30.0, Some(me.id));
    let report = build_report(store.graph(), snap, datetime!(2024-01-01 0:00 UTC));
    let bytes = PdfRenderer::default().render(&report).unwrap();

    let pages = pdf_page_texts(&bytes);
    assert!(pages.len() >= 2);
    // node labels only on the picture page
    assert!(pages[0].iter().any(|r| r == "Я"));
    assert!(pages[0].iter().any(|r| r == "Родитель 2"));
    assert!(!pages[0].iter().any(|r| r == TITLE));
    assert_eq!(pages[1][0], TITLE);
    assert!(pages[1].iter().any(|r| r == "Имя: Родитель 2"));
}

#[test]
fn pdf_renderer_falls_back_to_bundled_font() {
    let mut store = new_store();
    store.add_root_node(None).unwrap();
    let report = build_report(store.graph(), None, datetime!(2024-01-01 0:00 UTC));
    let renderer = PdfRenderer::new(Some("/nonexistent/regular.ttf".into()), Some("/nonexistent/bold.ttf".into()));
    let pages = pdf_page_texts(&renderer.render(&report).unwrap());
    assert!(pages[0].iter().any(|r| r == HEADING));
}

#[test]
fn report_export_writes_json_alongside() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = new_store();
    let me = store.add_root_node(Some(Point::new(2500.0, 2500.0))).unwrap();
    store.add_relative(me.id, RelativeKind::Parent);

    let pdf_path = export_report_file(store.graph(), 30.0, None, &PdfRenderer::default(), dir.path()).unwrap();
    assert_eq!(pdf_path, dir.path().join(PDF_FILE_NAME));
    let imported = load_import(&dir.path().join(JSON_FILE_NAME)).unwrap();
    assert_eq!(imported.nodes.len(), 3);
    assert_eq!(imported.edges.len(), 2);
}
