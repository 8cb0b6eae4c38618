// Family tree editor front end: menus, tooling sidebar, zoomable canvas and
// the per-person edit window.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use eframe::egui::{self, Color32, Pos2, Rect, Sense, Stroke, Vec2};
use serde_json::Value;

use crate::export;
use crate::export::pdf::PdfRenderer;
use crate::graph_utils::graph::{Attributes, NodeId, Point};
use crate::graph_utils::store::{Command, RelativeKind, TreeStore};
use crate::gui::interaction::{HitTarget, InteractionMachine, InteractionState, PointerEvent};
use crate::gui::viewport::Viewport;
use crate::persistence::import::ImportError;
use crate::persistence::persist;
use crate::persistence::settings::AppSettings;

// Fields shown in the edit window, keyed as they are stored on the node
const EDITABLE_FIELDS: [(&str, &str); 4] = [
    ("name", "Имя"),
    ("birthDate", "Дата рождения"),
    ("location", "Место жительства"),
    ("biography", "Биография"),
];

const NODE_FILL: Color32 = Color32::from_rgb(0x22, 0xc5, 0x5e);
const NODE_FILL_SELECTED: Color32 = Color32::from_rgb(0x17, 0x61, 0x3d);
const EDGE_COLOR: Color32 = Color32::from_rgb(0x4a, 0xde, 0x80);
// Wheel travel, in points, that counts as one zoom step
const WHEEL_NOTCH: f32 = 50.0;

// Style for toast notifications
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum NoticeStyle {
    Subtle,
    Prominent,
    Failure,
}

fn to_pos2(p: Point) -> Pos2 { Pos2::new(p.x as f32, p.y as f32) }
fn to_point(p: Pos2) -> Point { Point::new(p.x as f64, p.y as f64) }

pub struct FamilyTreeApp {
    store: TreeStore,
    viewport: Viewport,
    interaction: InteractionMachine,
    app_settings: AppSettings,
    renderer: PdfRenderer,
    sidebar_open: bool,
    import_path: String,
    // Import failures block the UI until acknowledged
    blocking_error: Option<String>,
    last_info: Option<String>,
    last_info_time: Option<Instant>,
    last_info_style: NoticeStyle,
    scroll_accum: f32,
    // Edit window buffers, reloaded whenever the edit target changes
    edit_for: Option<NodeId>,
    edit_fields: Vec<(String, String)>,
    show_prefs: bool,
    prefs_export_dir: String,
    prefs_font: String,
    prefs_font_bold: String,
}

impl FamilyTreeApp {
    pub fn new(app_settings: AppSettings) -> Self {
        let store = TreeStore::new(app_settings.canvas_bounds());
        let viewport = Viewport::new(store.bounds().size, app_settings.zoom_bounds());
        let renderer = PdfRenderer::new(app_settings.report_font.clone(), app_settings.report_font_bold.clone());
        Self {
            store,
            viewport,
            interaction: InteractionMachine::new(),
            renderer,
            sidebar_open: true,
            import_path: String::new(),
            blocking_error: None,
            last_info: None,
            last_info_time: None,
            last_info_style: NoticeStyle::Prominent,
            scroll_accum: 0.0,
            edit_for: None,
            edit_fields: Vec::new(),
            show_prefs: false,
            prefs_export_dir: String::new(),
            prefs_font: String::new(),
            prefs_font_bold: String::new(),
            app_settings,
        }
    }

    fn notify(&mut self, msg: impl Into<String>, style: NoticeStyle) {
        self.last_info = Some(msg.into());
        self.last_info_time = Some(Instant::now());
        self.last_info_style = style;
    }

    fn add_relative(&mut self, kind: RelativeKind) {
        let outcome = match self.store.selected() {
            Some(anchor) => self.store.apply(Command::AddRelative { anchor, kind }),
            // Nothing to attach to yet: the first person goes where the user is looking
            None => self.store.apply(Command::AddRoot { center: self.viewport.visible_center() }),
        };
        if outcome.created.is_empty() {
            self.notify("Выберите человека", NoticeStyle::Subtle);
        }
    }

    fn remove_selected(&mut self) {
        let Some(id) = self.store.selected() else {
            self.notify("Никто не выбран", NoticeStyle::Subtle);
            return;
        };
        let outcome = self.store.apply(Command::RemoveNode { id });
        self.notify(format!("Удалено: {}", outcome.removed.len()), NoticeStyle::Subtle);
    }

    fn import_file(&mut self) {
        let trimmed = self.import_path.trim();
        if trimmed.is_empty() {
            self.notify("Укажите путь к файлу", NoticeStyle::Subtle);
            return;
        }
        let path = PathBuf::from(trimmed);
        match persist::load_import(&path) {
            Ok(imported) => {
                let count = imported.nodes.len();
                self.store.apply(Command::Load { nodes: imported.nodes, edges: imported.edges });
                self.viewport.schedule_recenter();
                self.notify(format!("Загружено: {} чел.", count), NoticeStyle::Prominent);
            }
            Err(e) => {
                log::error!("import of {} failed: {:#}", path.display(), e);
                let msg = match e.downcast_ref::<ImportError>() {
                    Some(import_err) => import_err.to_string(),
                    None => format!("Ошибка чтения файла: {}", e),
                };
                self.blocking_error = Some(msg);
            }
        }
    }

    fn run_export(&mut self, what: &str, result: anyhow::Result<PathBuf>) {
        match result {
            Ok(path) => self.notify(format!("{} сохранён: {}", what, path.display()), NoticeStyle::Prominent),
            Err(e) => {
                log::error!("{} export failed: {:#}", what, e);
                self.notify(format!("Не удалось сохранить {}: {}", what, e), NoticeStyle::Failure);
            }
        }
    }

    fn export_json(&mut self) {
        let dir = self.app_settings.export_dir();
        let res = export::export_json_file(self.store.graph(), &dir);
        self.run_export("JSON", res);
    }

    fn export_csv(&mut self) {
        let dir = self.app_settings.export_dir();
        let res = export::export_csv_file(self.store.graph(), &dir);
        self.run_export("CSV", res);
    }

    fn export_pdf(&mut self) {
        let dir = self.app_settings.export_dir();
        let res = export::export_report_file(
            self.store.graph(),
            self.store.bounds().node_radius,
            self.store.selected(),
            &self.renderer,
            &dir,
        );
        self.run_export("PDF", res);
    }

    fn open_prefs(&mut self) {
        self.prefs_export_dir = self.app_settings.export_override.as_ref().map(|p| p.display().to_string()).unwrap_or_default();
        self.prefs_font = self.app_settings.report_font.as_ref().map(|p| p.display().to_string()).unwrap_or_default();
        self.prefs_font_bold = self.app_settings.report_font_bold.as_ref().map(|p| p.display().to_string()).unwrap_or_default();
        self.show_prefs = true;
    }

    fn save_prefs(&mut self) {
        let as_path = |s: &str| {
            let t = s.trim();
            if t.is_empty() { None } else { Some(PathBuf::from(t)) }
        };
        self.app_settings.export_override = as_path(&self.prefs_export_dir);
        self.app_settings.report_font = as_path(&self.prefs_font);
        self.app_settings.report_font_bold = as_path(&self.prefs_font_bold);
        self.renderer = PdfRenderer::new(
            self.app_settings.report_font.clone(),
            self.app_settings.report_font_bold.clone(),
        );
        match self.app_settings.save() {
            Ok(()) => self.notify("Настройки сохранены", NoticeStyle::Subtle),
            Err(e) => {
                log::error!("saving settings failed: {:#}", e);
                self.notify(format!("Настройки не сохранены: {}", e), NoticeStyle::Failure);
            }
        }
    }

    fn sync_edit_buffer(&mut self) {
        let editing = self.store.editing();
        if editing == self.edit_for { return; }
        self.edit_for = editing;
        self.edit_fields.clear();
        let Some(node) = editing.and_then(|id| self.store.node(id)) else { return };
        for (key, _) in EDITABLE_FIELDS {
            let value = if key == "name" { node.name.clone() } else { node.attribute_text(key).unwrap_or_default() };
            self.edit_fields.push((key.to_string(), value));
        }
    }

    fn commit_edit(&mut self, id: NodeId) {
        let mut patch = Attributes::new();
        for (key, value) in &self.edit_fields {
            let v = value.trim();
            let json = if v.is_empty() && key.as_str() != "name" { Value::Null } else { Value::String(v.to_string()) };
            patch.insert(key.clone(), json);
        }
        self.store.apply(Command::UpdateNode { id, patch });
    }

    fn top_bar(&mut self, ctx: &egui::Context) {
        let import_sc = egui::KeyboardShortcut::new(egui::Modifiers::COMMAND, egui::Key::O);
        let export_sc = egui::KeyboardShortcut::new(egui::Modifiers::COMMAND, egui::Key::S);
        let zoom_in_sc = egui::KeyboardShortcut::new(egui::Modifiers::COMMAND, egui::Key::Plus);
        let zoom_out_sc = egui::KeyboardShortcut::new(egui::Modifiers::COMMAND, egui::Key::Minus);
        if ctx.input_mut(|i| i.consume_shortcut(&import_sc)) { self.import_file(); }
        if ctx.input_mut(|i| i.consume_shortcut(&export_sc)) { self.export_json(); }
        if ctx.input_mut(|i| i.consume_shortcut(&zoom_in_sc)) { self.viewport.zoom_in(); }
        if ctx.input_mut(|i| i.consume_shortcut(&zoom_out_sc)) { self.viewport.zoom_out(); }

        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("Family-Tree");
                ui.menu_button("File", |ui| {
                    if ui.add(egui::Button::new("Import").shortcut_text(ctx.format_shortcut(&import_sc))).clicked() {
                        self.import_file();
                        ui.close();
                    }
                    ui.separator();
                    if ui.add(egui::Button::new("Export JSON").shortcut_text(ctx.format_shortcut(&export_sc))).clicked() {
                        self.export_json();
                        ui.close();
                    }
                    if ui.button("Export CSV").clicked() {
                        self.export_csv();
                        ui.close();
                    }
                    if ui.button("Export PDF").clicked() {
                        self.export_pdf();
                        ui.close();
                    }
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                        ui.close();
                    }
                });
                ui.menu_button("View", |ui| {
                    if ui.add(egui::Button::new("Zoom In").shortcut_text(ctx.format_shortcut(&zoom_in_sc))).clicked() {
                        self.viewport.zoom_in();
                    }
                    if ui.add(egui::Button::new("Zoom Out").shortcut_text(ctx.format_shortcut(&zoom_out_sc))).clicked() {
                        self.viewport.zoom_out();
                    }
                    if ui.button("Recenter").clicked() {
                        self.viewport.schedule_recenter();
                        ui.close();
                    }
                });
                ui.menu_button("Window", |ui| {
                    let toggle_sidebar = if self.sidebar_open { "Hide Sidebar" } else { "Show Sidebar" };
                    if ui.button(toggle_sidebar).clicked() {
                        self.sidebar_open = !self.sidebar_open;
                        ui.close();
                    }
                    if ui.button("Preferences").clicked() {
                        self.open_prefs();
                        ui.close();
                    }
                });
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.small(format!("{:.0}%", self.viewport.zoom() * 100.0));
                });
            });
        });
    }

    fn sidebar(&mut self, ctx: &egui::Context) {
        if !self.sidebar_open { return; }
        egui::SidePanel::left("tooling_sidebar")
            .resizable(true)
            .default_width(260.0)
            .show(ctx, |ui| {
                ui.heading("Семья");
                ui.separator();
                if ui.button("Добавить родителей").clicked() {
                    self.add_relative(RelativeKind::Parent);
                }
                if ui.button("Добавить ребёнка").clicked() {
                    self.add_relative(RelativeKind::Child);
                }
                let can_remove = self.store.selected().is_some();
                if ui.add_enabled(can_remove, egui::Button::new(egui::RichText::new("Удалить выбранного").color(Color32::RED))).clicked() {
                    self.remove_selected();
                }

                ui.separator();
                ui.label("Импорт");
                ui.add(egui::TextEdit::singleline(&mut self.import_path).hint_text("путь к .json"));
                if ui.button("Загрузить").clicked() {
                    self.import_file();
                }

                ui.separator();
                ui.label("Экспорт");
                ui.horizontal(|ui| {
                    if ui.button("JSON").clicked() { self.export_json(); }
                    if ui.button("CSV").clicked() { self.export_csv(); }
                    if ui.button("PDF").clicked() { self.export_pdf(); }
                });
                ui.small(format!("в {}", self.app_settings.export_dir().display()));

                ui.separator();
                match self.store.selected_node() {
                    Some(node) => {
                        ui.label(egui::RichText::new(&node.name).strong());
                        ui.small(format!("id {} • ({:.0}, {:.0})", node.id, node.x, node.y));
                        let graph = self.store.graph();
                        ui.small(format!("родителей: {}, детей: {}", graph.parents_of(node.id).len(), graph.children_of(node.id).len()));
                        for (k, _) in node.attributes.iter() {
                            if let Some(v) = node.attribute_text(k) {
                                ui.small(format!("{}: {}", k, v));
                            }
                        }
                    }
                    None => { ui.small("Никто не выбран"); }
                }
                ui.separator();
                ui.small(format!("Всего: {} чел., {} связей", self.store.graph().node_count(), self.store.graph().edge_count()));
            });
    }

    fn zoom_controls(&mut self, ctx: &egui::Context) {
        egui::Area::new("zoom_controls".into())
            .anchor(egui::Align2::RIGHT_CENTER, egui::vec2(-12.0, 0.0))
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    if ui.button("+").clicked() { self.viewport.zoom_in(); }
                    if ui.button("−").clicked() { self.viewport.zoom_out(); }
                });
            });
    }

    fn canvas(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().frame(egui::Frame::NONE.fill(Color32::from_gray(235))).show(ctx, |ui| {
            let available = ui.available_rect_before_wrap();
            self.viewport.set_surface(to_point(available.min), Point::new(available.width() as f64, available.height() as f64));
            self.viewport.on_frame();

            let resp = ui.allocate_rect(available, Sense::click_and_drag());
            if self.blocking_error.is_none() {
                self.canvas_input(ui, &resp, available);
            }

            let painter = ui.painter_at(available);
            let zoom = self.viewport.zoom() as f32;
            let size = self.store.bounds().size;
            let surface = Rect::from_two_pos(
                to_pos2(self.viewport.model_to_screen(Point::new(0.0, 0.0))),
                to_pos2(self.viewport.model_to_screen(Point::new(size, size))),
            );
            painter.rect_filled(surface, 0.0, Color32::WHITE);
            painter.rect_stroke(surface, 0.0, Stroke::new(1.0, Color32::from_gray(200)), egui::StrokeKind::Inside);

            let edge_stroke = Stroke::new((2.0 * zoom).max(1.0), EDGE_COLOR);
            for (a, b) in self.store.graph().resolved_edges() {
                let pa = to_pos2(self.viewport.model_to_screen(a.position()));
                let pb = to_pos2(self.viewport.model_to_screen(b.position()));
                painter.line_segment([pa, pb], edge_stroke);
            }

            let radius = self.store.bounds().node_radius as f32 * zoom;
            let selected = self.store.selected();
            let font = egui::FontId::proportional((14.0 * zoom).max(6.0));
            for node in self.store.graph().nodes() {
                let center = to_pos2(self.viewport.model_to_screen(node.position()));
                if !available.expand(radius * 3.0).contains(center) { continue; }
                let is_selected = selected == Some(node.id);
                let fill = if is_selected { NODE_FILL_SELECTED } else { NODE_FILL };
                painter.circle_filled(center, radius, fill);
                if is_selected {
                    painter.circle_stroke(center, radius, Stroke::new(2.0, Color32::BLACK));
                }
                painter.text(
                    center + Vec2::new(0.0, radius + 4.0),
                    egui::Align2::CENTER_TOP,
                    &node.name,
                    font.clone(),
                    Color32::BLACK,
                );
            }
        });
    }

    fn canvas_input(&mut self, ui: &egui::Ui, resp: &egui::Response, available: Rect) {
        let (pressed, primary_down, pos, touching) = ui.input(|i| {
            (i.pointer.primary_pressed(), i.pointer.primary_down(), i.pointer.interact_pos(), i.any_touches())
        });
        let hit = |app: &Self, p: Pos2| app.store.node_at(app.viewport.screen_to_model(to_point(p)));

        if pressed && resp.hovered() {
            if let Some(p) = pos {
                let event = match hit(self, p) {
                    Some(node) if touching => PointerEvent::Tap { pos: to_point(p), node },
                    Some(node) => PointerEvent::Down { pos: to_point(p), target: HitTarget::Node(node) },
                    None => PointerEvent::Down { pos: to_point(p), target: HitTarget::Canvas },
                };
                self.interaction.handle(event, &mut self.store, &mut self.viewport);
            }
        } else if self.interaction.is_active() && primary_down {
            if let Some(p) = pos {
                self.interaction.handle(PointerEvent::Move { pos: to_point(p) }, &mut self.store, &mut self.viewport);
            }
        }

        if resp.double_clicked() {
            if let Some(node) = pos.and_then(|p| hit(self, p)) {
                self.interaction.handle(PointerEvent::DoubleClick { node }, &mut self.store, &mut self.viewport);
            }
        }

        if ui.input(|i| i.pointer.primary_released()) {
            self.interaction.handle(PointerEvent::Up, &mut self.store, &mut self.viewport);
        } else if self.interaction.is_active() && ui.input(|i| i.pointer.latest_pos()).is_none() {
            self.interaction.handle(PointerEvent::Leave, &mut self.store, &mut self.viewport);
        }
        self.interaction.release_if_button_up(primary_down);

        if resp.hovered() {
            self.scroll_accum += ui.input(|i| i.raw_scroll_delta.y);
            while self.scroll_accum >= WHEEL_NOTCH {
                self.viewport.zoom_in();
                self.scroll_accum -= WHEEL_NOTCH;
            }
            while self.scroll_accum <= -WHEEL_NOTCH {
                self.viewport.zoom_out();
                self.scroll_accum += WHEEL_NOTCH;
            }
        } else {
            self.scroll_accum = 0.0;
        }

        if matches!(self.interaction.state(&self.store), InteractionState::PanningCanvas) {
            ui.ctx().set_cursor_icon(egui::CursorIcon::Grabbing);
        } else if pos.is_some_and(|p| available.contains(p) && hit(self, p).is_some()) {
            ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
        }
    }

    fn edit_window(&mut self, ctx: &egui::Context) {
        self.sync_edit_buffer();
        let Some(id) = self.edit_for else { return };
        let Some(node) = self.store.node(id) else { return };
        let radius = self.store.bounds().node_radius;
        let anchor = self.viewport.model_to_screen(Point::new(node.x + radius, node.y - radius));

        let mut open = true;
        let mut save = false;
        egui::Window::new(format!("Редактирование: {}", node.name))
            .id(egui::Id::new(("edit_node", id)))
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .fixed_pos(to_pos2(anchor) + Vec2::new(10.0, 0.0))
            .show(ctx, |ui| {
                egui::Grid::new(("edit_grid", id)).num_columns(2).show(ui, |ui| {
                    for ((_, label), (key, value)) in EDITABLE_FIELDS.iter().zip(self.edit_fields.iter_mut()) {
                        ui.label(*label);
                        if key.as_str() == "biography" {
                            ui.add(egui::TextEdit::multiline(value).desired_rows(3));
                        } else {
                            ui.text_edit_singleline(value);
                        }
                        ui.end_row();
                    }
                });
                ui.separator();
                if ui.button("Сохранить").clicked() {
                    save = true;
                }
            });
        if save {
            self.commit_edit(id);
        }
        if !open || save {
            self.store.apply(Command::Edit(None));
        }
    }

    fn import_error_window(&mut self, ctx: &egui::Context) {
        let Some(msg) = self.blocking_error.clone() else { return };
        egui::Window::new("Ошибка импорта")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.colored_label(Color32::RED, msg);
                ui.separator();
                if ui.button("OK").clicked() {
                    self.blocking_error = None;
                }
            });
    }

    fn prefs_window(&mut self, ctx: &egui::Context) {
        if !self.show_prefs { return; }
        let mut open = true;
        let mut save = false;
        egui::Window::new("Preferences")
            .open(&mut open)
            .resizable(false)
            .show(ctx, |ui| {
                ui.label("Export directory");
                ui.add(egui::TextEdit::singleline(&mut self.prefs_export_dir)
                    .hint_text(AppSettings::export_default_dir().display().to_string()));
                ui.label("Report font (.ttf)");
                ui.add(egui::TextEdit::singleline(&mut self.prefs_font).hint_text("DejaVu Sans (bundled)"));
                ui.label("Report bold font (.ttf)");
                ui.add(egui::TextEdit::singleline(&mut self.prefs_font_bold).hint_text("DejaVu Sans Bold (bundled)"));
                ui.small(format!("Stored in {}", AppSettings::settings_dir().display()));
                if ui.button("Save").clicked() { save = true; }
            });
        if save {
            self.save_prefs();
            open = false;
        }
        self.show_prefs = open;
    }

    fn toast(&self, ctx: &egui::Context) {
        let (Some(msg), Some(when)) = (&self.last_info, self.last_info_time) else { return };
        if Instant::now().duration_since(when) > Duration::from_secs(3) { return; }
        let margin = egui::vec2(12.0, 12.0);
        egui::Area::new("bottom_right_toast".into())
            .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-margin.x, -margin.y))
            .interactable(false)
            .show(ctx, |ui| {
                let (fill, stroke_col, text_col) = match self.last_info_style {
                    NoticeStyle::Subtle => (Color32::from_rgba_premultiplied(20, 20, 20, 170), Color32::from_gray(60), Color32::from_gray(200)),
                    NoticeStyle::Prominent => (Color32::from_rgba_premultiplied(30, 30, 30, 230), Color32::from_gray(100), Color32::LIGHT_GREEN),
                    NoticeStyle::Failure => (Color32::from_rgba_premultiplied(40, 10, 10, 230), Color32::from_rgb(150, 40, 40), Color32::LIGHT_RED),
                };
                egui::Frame::popup(ui.style())
                    .corner_radius(egui::CornerRadius::same(8))
                    .stroke(Stroke::new(1.0, stroke_col))
                    .fill(fill)
                    .inner_margin(egui::Margin::symmetric(10, 6))
                    .show(ui, |ui| {
                        ui.colored_label(text_col, msg);
                    });
            });
        ctx.request_repaint_after(Duration::from_millis(250));
    }
}

impl eframe::App for FamilyTreeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let blocked = self.blocking_error.is_some();
        if !blocked {
            self.top_bar(ctx);
            self.sidebar(ctx);
            self.zoom_controls(ctx);
        }
        self.canvas(ctx);
        if !blocked {
            self.edit_window(ctx);
            self.prefs_window(ctx);
        }
        self.import_error_window(ctx);
        self.toast(ctx);
        if self.interaction.is_active() || self.viewport.recenter_pending() {
            ctx.request_repaint();
        }
    }
}
