//! Session-scoped persistence of per-project expansion and focus.
//!
//! State lives in a small JSON key/value file under the login session's
//! runtime directory, so it survives restarts of `ptree` but not a logout.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;

const EXPANDED_PREFIX: &str = "project-tree.expanded.";
const FOCUS_PREFIX: &str = "project-tree.focus.";

/// String key/value store backed by a JSON file, or purely in memory.
#[derive(Debug, Default)]
pub struct SessionStorage {
    file: Option<PathBuf>,
    entries: BTreeMap<String, String>,
}

impl SessionStorage {
    /// Storage that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Default location: `<runtime dir>/ptree/session.json`, falling back to
    /// the system temp directory when there is no runtime dir.
    pub fn default_path() -> PathBuf {
        dirs::runtime_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("ptree")
            .join("session.json")
    }

    /// Open the store at `path`. A missing file starts empty; an unreadable
    /// or corrupt one is logged and also starts empty.
    pub fn open(path: &Path) -> Self {
        let entries = match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring corrupt session file");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read session file");
                BTreeMap::new()
            }
        };
        Self {
            file: Some(path.to_path_buf()),
            entries,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Set `key` and write the whole store through to disk.
    pub fn set(&mut self, key: &str, value: String) -> Result<()> {
        if self.entries.get(key) == Some(&value) {
            return Ok(());
        }
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    /// Replace the file atomically: write a sibling temp file, then rename.
    fn flush(&self) -> Result<()> {
        let Some(path) = &self.file else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(&self.entries)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn expanded_key(project_id: &str) -> String {
    format!("{}{}", EXPANDED_PREFIX, project_id)
}

fn focus_key(project_id: &str) -> String {
    format!("{}{}", FOCUS_PREFIX, project_id)
}

/// Expanded directories saved for `project_id`; empty when nothing was saved
/// or the stored value is unreadable.
pub fn load_expansion(storage: &SessionStorage, project_id: &str) -> BTreeSet<String> {
    let Some(raw) = storage.get(&expanded_key(project_id)) else {
        return BTreeSet::new();
    };
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(paths) => paths.into_iter().collect(),
        Err(e) => {
            warn!(project_id, error = %e, "ignoring unreadable expansion state");
            BTreeSet::new()
        }
    }
}

pub fn save_expansion(
    storage: &mut SessionStorage,
    project_id: &str,
    expanded: &BTreeSet<String>,
) -> Result<()> {
    let paths: Vec<&String> = expanded.iter().collect();
    storage.set(&expanded_key(project_id), serde_json::to_string(&paths)?)
}

pub fn load_focus(storage: &SessionStorage, project_id: &str) -> Option<String> {
    storage
        .get(&focus_key(project_id))
        .filter(|p| !p.is_empty())
        .map(str::to_string)
}

/// Save the focused path, or clear it when `focused` is `None`.
pub fn save_focus(storage: &mut SessionStorage, project_id: &str, focused: Option<&str>) -> Result<()> {
    match focused {
        Some(path) => storage.set(&focus_key(project_id), path.to_string()),
        None => storage.remove(&focus_key(project_id)),
    }
}
