//! Logging setup for the viewer
//!
//! A single `fmt` layer filtered by `RUST_LOG`. With the `profiling` feature the
//! `profiling::scope!` markers in the tile pipeline become tracing spans, which the
//! same subscriber reports.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Filter used when `RUST_LOG` is not set
pub fn default_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "debug,eframe::native=warn,egui::context=warn,wgpu_core=warn,wgpu_hal=warn,naga=warn,hyper_util=info,reqwest::connect=info"
    } else {
        "info,eframe=warn,wgpu_core=warn,wgpu_hal=warn"
    }
}

/// Initialize the global tracing subscriber. Safe to call more than once.
pub fn setup_logging() {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(default_filter()),
    };

    let fmt_layer = fmt::layer().with_filter(filter);
    if tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("Logging already initialized");
        return;
    }

    if std::env::var("RUST_LOG").is_err() {
        tracing::info!("RUST_LOG not set, using default: {}", default_filter());
    }
}
