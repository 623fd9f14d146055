// A menu bar process has no console to speak of, logs go to files in the
// data directory instead.
#![cfg_attr(windows, windows_subsystem = "windows")]

use anyhow::Result;
use deepwork::{
    shell::run_shell,
    utils::{dir::resolve_data_dir, logging::enable_logging},
};

fn main() -> Result<()> {
    let data_dir = resolve_data_dir()?;
    enable_logging(&data_dir)?;

    run_shell(data_dir)
}
