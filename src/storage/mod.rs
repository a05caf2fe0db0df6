//! Persistence layer.
//!
//! Reads and writes the flat JSON config-override file. Updates are a
//! read-modify-write within one process; the write goes to a sibling temp
//! file which is then renamed over the original.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default config file path.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Load the override map. A missing file is an empty map; an unreadable
/// JSON body is logged and treated as empty.
pub fn load_overrides(path: &Path) -> Result<Map<String, Value>> {
    if !path.exists() {
        debug!(path = %path.display(), "No config file, using env/defaults");
        return Ok(Map::new());
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => {
            warn!(path = %path.display(), "Config file is not a JSON object, ignoring");
            Ok(Map::new())
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Config file unparseable, ignoring");
            Ok(Map::new())
        }
    }
}

/// Write the override map atomically.
pub fn save_overrides(path: &Path, overrides: &Map<String, Value>) -> Result<()> {
    let json = serde_json::to_string_pretty(overrides).context("Failed to serialise config")?;

    let tmp = temp_sibling(path);
    std::fs::write(&tmp, &json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace config file {}", path.display()))?;

    debug!(path = %path.display(), keys = overrides.len(), "Config saved");
    Ok(())
}

/// Merge `updates` into the stored overrides and persist. Returns the new map.
pub fn merge_overrides(path: &Path, updates: Map<String, Value>) -> Result<Map<String, Value>> {
    let mut existing = load_overrides(path)?;
    existing.extend(updates);
    save_overrides(path, &existing)?;
    info!(path = %path.display(), keys = existing.len(), "Config updated");
    Ok(existing)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
