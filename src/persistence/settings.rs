use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::graph_utils::graph::CanvasBounds;
use crate::gui::viewport::ZoomBounds;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    // If None, use OS temporary directory for exports
    #[serde(default)]
    pub export_override: Option<PathBuf>,
    // TrueType faces for the PDF report; bundled DejaVu Sans when unset
    #[serde(default)]
    pub report_font: Option<PathBuf>,
    #[serde(default)]
    pub report_font_bold: Option<PathBuf>,
    #[serde(default = "AppSettings::default_canvas_size")]
    pub canvas_size: f64,
    #[serde(default = "AppSettings::default_node_radius")]
    pub node_radius: f64,
    #[serde(default = "AppSettings::default_zoom_min")]
    pub zoom_min: f64,
    #[serde(default = "AppSettings::default_zoom_max")]
    pub zoom_max: f64,
    #[serde(default = "AppSettings::default_zoom_step")]
    pub zoom_step: f64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            export_override: None,
            report_font: None,
            report_font_bold: None,
            canvas_size: Self::default_canvas_size(),
            node_radius: Self::default_node_radius(),
            zoom_min: Self::default_zoom_min(),
            zoom_max: Self::default_zoom_max(),
            zoom_step: Self::default_zoom_step(),
        }
    }
}

impl AppSettings {
    fn config_dir() -> PathBuf {
        // Cross-platform user config dir
        #[cfg(target_os = "macos")]
        {
            // ~/Library/Application Support/Family-Tree
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join("Library").join("Application Support").join("Family-Tree");
        }
        #[cfg(target_os = "windows")]
        {
            // %APPDATA%\Family-Tree
            if let Ok(appdata) = std::env::var("APPDATA") {
                return PathBuf::from(appdata).join("Family-Tree");
            }
            return PathBuf::from("Family-Tree");
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            // $XDG_CONFIG_HOME/Family-Tree or ~/.config/Family-Tree
            if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
                return PathBuf::from(xdg).join("Family-Tree");
            }
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join(".config").join("Family-Tree");
        }
    }

    pub fn load() -> anyhow::Result<Self> {
        let json_path = Self::config_dir().join("settings.json");
        if !json_path.exists() {
            return Ok(Self::default());
        }
        let mut f = fs::File::open(json_path)?;
        let mut s = String::new();
        f.read_to_string(&mut s)?;
        Self::from_json(&s)
    }

    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let v: Self = serde_json::from_str(s)?;
        Ok(v)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let dir = Self::config_dir();
        fs::create_dir_all(&dir)?;
        let path = dir.join("settings.json");
        let s = serde_json::to_string_pretty(self)?;
        let mut f = fs::File::create(path)?;
        f.write_all(s.as_bytes())?;
        Ok(())
    }

    /// Return the directory where the settings file (settings.json) is stored.
    pub fn settings_dir() -> PathBuf {
        Self::config_dir()
    }

    /// Default export directory when no override is set: OS temporary directory.
    /// Example: {temp_dir}/Family-Tree/exports
    pub fn export_default_dir() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push("Family-Tree");
        p.push("exports");
        p
    }

    /// Effective export directory honoring user override or falling back to OS temp.
    pub fn export_dir(&self) -> PathBuf {
        if let Some(p) = &self.export_override { return p.clone(); }
        Self::export_default_dir()
    }

    pub fn canvas_bounds(&self) -> CanvasBounds {
        let defaults = CanvasBounds::default();
        let size = if self.canvas_size.is_finite() && self.canvas_size > 0.0 { self.canvas_size } else { defaults.size };
        let radius = if self.node_radius.is_finite() && self.node_radius > 0.0 { self.node_radius.min(size / 2.0) } else { defaults.node_radius };
        CanvasBounds { size, node_radius: radius }
    }

    pub fn zoom_bounds(&self) -> ZoomBounds {
        ZoomBounds::new(self.zoom_min, self.zoom_max, self.zoom_step)
    }

    pub(crate) fn default_canvas_size() -> f64 { 5000.0 }
    pub(crate) fn default_node_radius() -> f64 { 30.0 }
    pub(crate) fn default_zoom_min() -> f64 { 0.3 }
    pub(crate) fn default_zoom_max() -> f64 { 2.5 }
    pub(crate) fn default_zoom_step() -> f64 { 0.1 }
}
