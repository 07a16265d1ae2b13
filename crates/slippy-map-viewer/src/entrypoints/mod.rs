//! Native entry point for the viewer
//!
//! Sets up logging, prints build metadata and runs the eframe event loop.

pub mod cli;
pub mod logging;
mod metadata;

pub use cli::{get_env, parse_args};
pub use logging::setup_logging;
pub use metadata::{log_version_info, short_version_info};

/// Initial window size when nothing is persisted
const DEFAULT_WINDOW_SIZE: [f32; 2] = [1280.0, 720.0];

/// Run the application on native (desktop) platforms.
///
/// Must be called from inside the tokio runtime that fetch tasks will use.
pub async fn native_main(
    app_name: &str,
    app_creator: impl FnOnce(&eframe::CreationContext<'_>) -> Box<dyn eframe::App>,
) {
    // Must happen before any logging
    setup_logging();

    log_version_info();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(DEFAULT_WINDOW_SIZE)
            .with_title(app_name),
        ..Default::default()
    };

    if let Err(e) = eframe::run_native(
        app_name,
        native_options,
        Box::new(move |cc| Ok(app_creator(cc))),
    ) {
        tracing::error!("Event loop exited with error: {}", e);
    }
}
