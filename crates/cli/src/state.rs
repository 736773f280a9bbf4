//! The JSON state file a replay reads and writes back.

use std::io::Write;
use std::path::Path;

use officeflow_storage::MemoryState;

/// A missing file is an empty store.
pub(crate) fn load(path: &Path) -> Result<MemoryState, String> {
    if !path.exists() {
        return Ok(MemoryState::default());
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("error reading state file '{}': {}", path.display(), e))?;
    serde_json::from_str(&text)
        .map_err(|e| format!("error parsing state file '{}': {}", path.display(), e))
}

/// Write through a temporary file in the same directory, then rename, so a
/// failed save never leaves a truncated state file.
pub(crate) fn save(path: &Path, state: &MemoryState) -> Result<(), String> {
    let json = serde_json::to_string_pretty(state)
        .map_err(|e| format!("error serializing state: {}", e))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| format!("error creating temp file in '{}': {}", dir.display(), e))?;
    tmp.write_all(json.as_bytes())
        .map_err(|e| format!("error writing state: {}", e))?;
    tmp.persist(path)
        .map_err(|e| format!("error saving state file '{}': {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = load(&dir.path().join("state.json")).unwrap();
        assert_eq!(state, MemoryState::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        save(&path, &MemoryState::default()).unwrap();
        assert_eq!(load(&path).unwrap(), MemoryState::default());
    }

    #[test]
    fn corrupt_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load(&path).unwrap_err();
        assert!(err.contains("state.json"), "{err}");
    }
}
