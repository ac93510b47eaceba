fn main() {
    // The Tauri build step is only needed for the desktop app. Guarding it
    // behind the feature lets the pure-Rust library and its tests build on
    // hosts without the Tauri system libraries installed.
    if std::env::var_os("CARGO_FEATURE_DESKTOP").is_some() {
        tauri_build::build()
    }
}
