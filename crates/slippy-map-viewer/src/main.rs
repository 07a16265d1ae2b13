#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

use slippy_map_viewer::SlippyMapApp;

fn main() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create Tokio runtime");
    let handle = rt.handle().clone();

    rt.block_on(async move {
        slippy_map_viewer::entrypoints::native_main("Slippy Map Viewer", move |cc| {
            Box::new(SlippyMapApp::new(cc, handle))
        })
        .await;
    });
}
