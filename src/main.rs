#![windows_subsystem = "windows"]

mod app;
mod budget;
mod registry;
mod treemap;
mod wikidata;

fn main() -> eframe::Result<()> {
    env_logger::init();

    let vp = eframe::egui::ViewportBuilder::default()
        .with_title("BundView")
        .with_inner_size([1200.0, 800.0])
        .with_min_inner_size([640.0, 480.0]);

    let options = eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    };

    eframe::run_native(
        "BundView",
        options,
        Box::new(|cc| Ok(Box::new(app::BundViewApp::new(cc)))),
    )
}
