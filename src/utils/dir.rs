use std::{env, io, path::PathBuf};

use anyhow::{Context, Result};

/// Overrides the application data directory. Mainly useful for tests and for
/// keeping several independent histories around.
pub const DATA_DIR_ENV: &str = "DEEPWORK_DIR";

/// Resolves the directory everything is stored under: session day files,
/// categories, config and logs. The directory is created when missing.
pub fn resolve_data_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os(DATA_DIR_ENV) {
        return ensure_dir(PathBuf::from(dir));
    }

    let path = {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "macos")] {
                let mut path = env::var("HOME")
                    .map(PathBuf::from)
                    .context("Couldn't find HOME")?;
                path.push("Library/Application Support/deepwork");
                path
            } else if #[cfg(windows)] {
                let mut path = env::var("APPDATA")
                    .map(PathBuf::from)
                    .context("APPDATA should be present on Windows")?;
                path.push("deepwork");
                path
            } else {
                let mut path = env::var("XDG_STATE_HOME")
                    .map(PathBuf::from)
                    .or_else(|_| {
                        env::var("HOME").map(|home| {
                            let mut path = PathBuf::from(home);
                            path.push(".local/state");
                            path
                        })
                    })
                    .context("Couldn't find neither XDG_STATE_HOME nor HOME")?;
                path.push("deepwork");
                path
            }
        }
    };

    ensure_dir(path)
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf> {
    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v.into()),
    }
}
