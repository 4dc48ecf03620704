use once_cell::sync::Lazy;
use std::{
    fs,
    path::{Path, PathBuf},
};

const APP_DIR: &str = "smart-companion";
const DATA_DIR_VAR: &str = "COMPANION_DATA_DIR";

static DATA_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    let root = resolve_data_root(std::env::var(DATA_DIR_VAR).ok());
    if let Err(err) = fs::create_dir_all(&root) {
        tracing::warn!("failed to create data root {:?}: {err}", root);
    }
    root
});

/// An explicit directory wins; otherwise the platform data dir, then cwd.
fn resolve_data_root(explicit: Option<String>) -> PathBuf {
    match explicit {
        Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir.trim()),
        _ => dirs::data_dir()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR),
    }
}

pub fn data_root() -> PathBuf {
    DATA_ROOT.clone()
}

pub fn database_path() -> PathBuf {
    data_root().join("conversations.sqlite")
}

pub fn config_path() -> PathBuf {
    data_root().join("config.json")
}

pub fn ensure_parent(path: &Path) {
    let Some(parent) = path.parent() else { return };
    if let Err(err) = fs::create_dir_all(parent) {
        tracing::warn!("failed to create parent {:?}: {err}", parent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_directory_is_used_as_is() {
        assert_eq!(resolve_data_root(Some(" /tmp/companion ".to_string())), PathBuf::from("/tmp/companion"));
    }

    #[test]
    fn blank_override_falls_back_to_app_dir() {
        let root = resolve_data_root(Some("  ".to_string()));
        assert!(root.ends_with(APP_DIR));
        assert_eq!(resolve_data_root(None), root);
    }
}
