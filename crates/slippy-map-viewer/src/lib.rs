//! Slippy Map Viewer - Application Library
//!
//! Desktop map viewer that draws raster tiles from the `slippy-tiles` pipeline
//! with egui, plus the native entry point, CLI and logging setup.

mod app;
pub mod entrypoints;

pub use app::SlippyMapApp;
