use eframe::egui;

use family_tree::gui::frontend::FamilyTreeApp;
use family_tree::persistence::settings::AppSettings;

fn main() -> eframe::Result {
    env_logger::init();
    let settings = AppSettings::load().unwrap_or_else(|e| {
        log::warn!("settings unreadable, using defaults: {:#}", e);
        AppSettings::default()
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1300.0, 710.0])
            // Provide sensible bounds so the UI stays usable on small screens
            .with_min_inner_size([700.0, 420.0])
            .with_resizable(true),
        ..Default::default()
    };
    eframe::run_native(
        "Family-Tree",
        options,
        Box::new(move |_cc| Ok(Box::new(FamilyTreeApp::new(settings)) as Box<dyn eframe::App>)),
    )
}
