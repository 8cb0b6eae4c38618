use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point as PdfPoint, Rgb,
};

use super::report::{Alignment, Block, DocumentRenderer, GraphSnapshot, Margins, PageSetup, Report, TextStyle};

const PT_PER_MM: f32 = 72.0 / 25.4;
const LINE_SPACING: f32 = 1.25;
// Average glyph advance as a share of the font size; used for wrapping
const GLYPH_WIDTH: f32 = 0.5;
const CIRCLE_SEGMENTS: usize = 24;

fn pt(mm: f32) -> f32 { mm * PT_PER_MM }
fn mm(pt: f32) -> Mm { Mm(pt / PT_PER_MM) }

fn rgb(r: f32, g: f32, b: f32) -> Color { Color::Rgb(Rgb::new(r, g, b, None)) }

// Bundled faces with Cyrillic coverage; Helvetica cannot encode the report's Russian text
const BUNDLED_REGULAR: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");
const BUNDLED_BOLD: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

/// Lays a [`Report`] out on A4 pages with printpdf.
///
/// Text uses the bundled DejaVu Sans faces unless font files are configured.
/// Built-in Helvetica is the last resort.
#[derive(Debug, Clone, Default)]
pub struct PdfRenderer {
    font_path: Option<PathBuf>,
    bold_font_path: Option<PathBuf>,
}

impl PdfRenderer {
    pub fn new(font_path: Option<PathBuf>, bold_font_path: Option<PathBuf>) -> Self {
        Self { font_path, bold_font_path }
    }

    fn load_fonts(&self, doc: &PdfDocumentReference) -> anyhow::Result<Fonts> {
        let regular = Self::face(doc, self.font_path.as_deref(), BUNDLED_REGULAR)
            .or_else(|| Self::builtin(doc, BuiltinFont::Helvetica));
        let bold = Self::face(doc, self.bold_font_path.as_deref(), BUNDLED_BOLD)
            .or_else(|| Self::builtin(doc, BuiltinFont::HelveticaBold));
        match (regular, bold) {
            (Some(regular), Some(bold)) => Ok(Fonts { regular, bold }),
            _ => Err(anyhow::anyhow!("no usable font for the report")),
        }
    }

    // Configured file first, then the bundled face
    fn face(doc: &PdfDocumentReference, path: Option<&Path>, bundled: &'static [u8]) -> Option<IndirectFontRef> {
        if let Some(path) = path {
            let external = File::open(path)
                .map_err(anyhow::Error::from)
                .and_then(|f| doc.add_external_font(BufReader::new(f)).map_err(anyhow::Error::from));
            match external {
                Ok(font) => return Some(font),
                Err(e) => log::warn!("report font {} unusable, using bundled face: {}", path.display(), e),
            }
        }
        match doc.add_external_font(bundled) {
            Ok(font) => Some(font),
            Err(e) => {
                log::warn!("bundled report font unusable, using Helvetica: {}", e);
                None
            }
        }
    }

    fn builtin(doc: &PdfDocumentReference, font: BuiltinFont) -> Option<IndirectFontRef> {
        doc.add_builtin_font(font)
            .map_err(|e| log::error!("built-in font {:?} unavailable: {}", font, e))
            .ok()
    }
}

impl DocumentRenderer for PdfRenderer {
    fn render(&self, report: &Report) -> anyhow::Result<Vec<u8>> {
        let setup = &report.page;
        let (doc, page, layer) = PdfDocument::new(report.title.clone(), Mm(setup.width_mm), Mm(setup.height_mm), "Page 1");
        let fonts = self.load_fonts(&doc)?;
        let layer = doc.get_page(page).get_layer(layer);
        let mut cursor = Cursor { doc: &doc, setup, layer, y: setup.margins[0], pages: 1, blank: true };

        for block in &report.blocks {
            match block {
                Block::Image { snapshot, width, margin } => {
                    cursor.draw_snapshot(snapshot, *width, *margin, &fonts.regular);
                    // the picture gets a page of its own
                    cursor.new_page();
                }
                Block::Text { text, style } => {
                    let font = if style.bold { &fonts.bold } else { &fonts.regular };
                    cursor.write(text, style, font);
                }
            }
        }
        let pages = cursor.pages;
        drop(cursor);
        log::debug!("report laid out on {} page(s)", pages);
        Ok(doc.save_to_bytes()?)
    }
}

struct Cursor<'a> {
    doc: &'a PdfDocumentReference,
    setup: &'a PageSetup,
    layer: PdfLayerReference,
    // distance from the top edge, in points
    y: f32,
    pages: usize,
    blank: bool,
}

impl Cursor<'_> {
    fn page_height(&self) -> f32 { pt(self.setup.height_mm) }
    fn page_width(&self) -> f32 { pt(self.setup.width_mm) }
    fn bottom(&self) -> f32 { self.page_height() - self.setup.margins[2] }
    fn content_width(&self) -> f32 { self.page_width() - self.setup.margins[1] - self.setup.margins[3] }

    fn new_page(&mut self) {
        if self.blank { return; }
        self.pages += 1;
        let (page, layer) = self.doc.add_page(Mm(self.setup.width_mm), Mm(self.setup.height_mm), format!("Page {}", self.pages));
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = self.setup.margins[0];
        self.blank = true;
    }

    fn ensure_room(&mut self, height: f32) {
        if self.y + height > self.bottom() { self.new_page(); }
    }

    fn write(&mut self, text: &str, style: &TextStyle, font: &IndirectFontRef) {
        let line_height = style.font_size * LINE_SPACING;
        let left = self.setup.margins[3] + style.margin[3];
        let width = self.content_width() - style.margin[1] - style.margin[3];
        self.y += style.margin[0];
        self.layer.set_fill_color(rgb(0.0, 0.0, 0.0));
        for line in wrap(text, width, style.font_size) {
            self.ensure_room(line_height);
            let x = match style.alignment {
                Alignment::Left => left,
                Alignment::Center => left + ((width - estimate_width(&line, style.font_size)) / 2.0).max(0.0),
            };
            let baseline = self.page_height() - self.y - style.font_size;
            self.layer.use_text(line, style.font_size, mm(x), mm(baseline), font);
            self.y += line_height;
            self.blank = false;
        }
        self.y += style.margin[2];
    }

    fn draw_snapshot(&mut self, snap: &GraphSnapshot, width: f32, margin: Margins, font: &IndirectFontRef) {
        if !(snap.width > 0.0 && snap.height > 0.0) {
            log::warn!("graph snapshot has no area, skipping picture");
            return;
        }
        let avail_w = width.min(self.content_width()) - margin[1] - margin[3];
        let avail_h = self.bottom() - self.y - margin[0] - margin[2];
        if avail_w <= 0.0 || avail_h <= 0.0 { return; }
        let scale = (avail_w as f64 / snap.width).min(avail_h as f64 / snap.height);
        let left = (self.setup.margins[3] + margin[3]) as f64;
        let top = (self.y + margin[0]) as f64;
        let page_h = self.page_height() as f64;
        // page coordinates in points, origin bottom-left
        let place = |x: f64, y: f64| -> (f32, f32) {
            let px = left + (x - snap.min_x) * scale;
            let py = page_h - (top + (y - snap.min_y) * scale);
            (px as f32, py as f32)
        };
        let to_page = |x: f64, y: f64| -> PdfPoint {
            let (px, py) = place(x, y);
            PdfPoint::new(mm(px), mm(py))
        };

        self.layer.set_outline_color(rgb(0.29, 0.87, 0.5));
        self.layer.set_outline_thickness(1.5);
        for ((x1, y1), (x2, y2)) in &snap.lines {
            self.layer.add_line(Line { points: vec![(to_page(*x1, *y1), false), (to_page(*x2, *y2), false)], is_closed: false });
        }

        let r = snap.radius;
        let label_size = ((snap.radius * scale) as f32 * 0.6).clamp(5.0, 12.0);
        for n in &snap.nodes {
            let stroke = if n.selected { rgb(0.09, 0.38, 0.24) } else { rgb(0.13, 0.77, 0.37) };
            self.layer.set_outline_color(stroke);
            self.layer.set_outline_thickness(if n.selected { 2.5 } else { 1.5 });
            let points = (0..CIRCLE_SEGMENTS)
                .map(|i| {
                    let a = i as f64 * std::f64::consts::TAU / CIRCLE_SEGMENTS as f64;
                    (to_page(n.x + r * a.cos(), n.y + r * a.sin()), false)
                })
                .collect();
            self.layer.add_line(Line { points, is_closed: true });

            let (ax, ay) = place(n.x, n.y + r * 1.33);
            let half = estimate_width(&n.label, label_size) / 2.0;
            self.layer.set_fill_color(rgb(0.0, 0.0, 0.0));
            self.layer.use_text(n.label.clone(), label_size, mm(ax - half), mm(ay - label_size), font);
        }
        self.y += (snap.height * scale) as f32 + margin[0] + margin[2];
        self.blank = false;
    }
}

fn estimate_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * GLYPH_WIDTH
}

/// Greedy word wrap by estimated glyph width. Overlong words are split.
fn wrap(text: &str, width: f32, font_size: f32) -> Vec<String> {
    let max_chars = ((width / (font_size * GLYPH_WIDTH)).floor() as usize).max(1);
    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        let mut len = 0usize;
        for word in paragraph.split_whitespace() {
            let mut chars: Vec<char> = word.chars().collect();
            while chars.len() > max_chars {
                if len > 0 { lines.push(std::mem::take(&mut current)); len = 0; }
                let rest = chars.split_off(max_chars);
                lines.push(chars.into_iter().collect());
                chars = rest;
            }
            let wlen = chars.len();
            if len > 0 && len + 1 + wlen > max_chars {
                lines.push(std::mem::take(&mut current));
                len = 0;
            }
            if len > 0 { current.push(' '); len += 1; }
            current.extend(chars);
            len += wlen;
        }
        lines.push(current);
    }
    if lines.is_empty() { lines.push(String::new()); }
    lines
}
