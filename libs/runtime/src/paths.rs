//! Home directory resolution.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

fn platform_base() -> Result<PathBuf> {
    #[cfg(target_os = "windows")]
    let base = dirs::config_dir();
    #[cfg(not(target_os = "windows"))]
    let base = dirs::home_dir();
    base.ok_or_else(|| anyhow!("cannot determine the user's home directory"))
}

fn expand_tilde(raw: &str) -> Result<PathBuf> {
    if raw == "~" {
        return dirs::home_dir().ok_or_else(|| anyhow!("cannot expand '~': no home directory"));
    }
    if let Some(rest) = raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        let home =
            dirs::home_dir().ok_or_else(|| anyhow!("cannot expand '~': no home directory"))?;
        return Ok(home.join(rest));
    }
    Ok(PathBuf::from(raw))
}

/// Resolve the application home directory.
///
/// * `Some(path)`: `~` is expanded, relative paths are anchored at the
///   current working directory.
/// * `None`: `<platform base>/<default_subdir>`, where the base is
///   `%APPDATA%` on Windows and `$HOME` elsewhere.
///
/// With `create`, the directory is created when missing.
pub fn resolve_home_dir(
    configured: Option<String>,
    default_subdir: &str,
    create: bool,
) -> Result<PathBuf> {
    let path = match configured {
        Some(raw) => {
            let p = expand_tilde(raw.trim())?;
            if p.is_absolute() {
                p
            } else {
                std::env::current_dir()
                    .context("cannot read current directory")?
                    .join(p)
            }
        }
        None => platform_base()?.join(default_subdir),
    };

    if create {
        std::fs::create_dir_all(&path)
            .with_context(|| format!("cannot create home dir {}", path.display()))?;
    }
    Ok(path)
}

/// Join `file` under `base` unless it is already absolute.
pub fn resolve_under(file: &str, base: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}
