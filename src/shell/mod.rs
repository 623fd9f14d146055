//! Native menu bar integration. The core treats the menu purely as a sink
//! of display strings and a source of discrete actions, everything platform
//! specific lives behind this module.

use std::path::PathBuf;

use anyhow::Result;

#[cfg(feature = "tray")]
pub mod tray;

/// Launches the menu bar shell with the core behind it. Blocks for the
/// lifetime of the application.
pub fn run_shell(data_dir: PathBuf) -> Result<()> {
    cfg_if::cfg_if! {
        if #[cfg(feature = "tray")] {
            tray::run(data_dir)
        } else {
            // This runtime error is needed to allow the project to be compiled for during testing.
            let _ = data_dir;
            unimplemented!("No menu bar backend was specified, rebuild with --features tray")
        }
    }
}
