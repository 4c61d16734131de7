use crate::error::StoreResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Saves a serializable document to a file atomically.
///
/// The JSON is written to a sibling temporary file, flushed to disk and then
/// renamed over the target, so readers never observe a half-written document.
///
/// # Arguments
///
/// * `path` - The target file path.
/// * `document` - The object to serialize and save.
///
/// # Returns
///
/// * `Ok(())` on success.
/// * `Err` on serialization or IO failure.
pub fn save_state<T: Serialize + ?Sized>(path: &Path, document: &T) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(document)?;

    let temp_path = temp_path_for(path);
    let mut temp_file = std::fs::File::create(&temp_path)?;
    temp_file.write_all(json.as_bytes())?;
    temp_file.sync_all()?;

    std::fs::rename(&temp_path, path)?;
    Ok(())
}

/// Loads a deserializable document from a file.
///
/// # Returns
///
/// * `Ok(T)` containing the deserialized object.
/// * `Err` if the file doesn't exist, cannot be read, or deserialization fails.
pub fn load_state<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

/// Loads a document, treating a missing or blank file as `T::default()`.
///
/// A file with content that does not parse is still an error: replacing it
/// with an empty document would lose data on the next save.
pub fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> StoreResult<T> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(e.into()),
    };
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(&raw)?)
}

/// Appends one compact JSON line to a newline-delimited log file.
pub fn append_line<T: Serialize + ?Sized>(path: &Path, record: &T) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut line = serde_json::to_string(record)?;
    line.push('\n');

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

fn temp_path_for(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Doc {
        items: Vec<u32>,
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("doc.json");

        save_state(&path, &Doc { items: vec![1, 2] }).unwrap();
        let loaded: Doc = load_state(&path).unwrap();

        assert_eq!(loaded.items, vec![1, 2]);
        assert!(!dir.path().join("nested").join("doc.json.tmp").exists());
    }

    #[test]
    fn test_missing_and_blank_files_load_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");

        let doc: Doc = load_or_default(&path).unwrap();
        assert_eq!(doc, Doc::default());

        std::fs::write(&path, "  \n").unwrap();
        let doc: Doc = load_or_default(&path).unwrap();
        assert_eq!(doc, Doc::default());
    }

    #[test]
    fn test_corrupted_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(load_or_default::<Doc>(&path).is_err());
    }

    #[test]
    fn test_append_line_writes_ndjson() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.ndjson");

        append_line(&path, &Doc { items: vec![1] }).unwrap();
        append_line(&path, &Doc { items: vec![2] }).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines, vec![r#"{"items":[1]}"#, r#"{"items":[2]}"#]);
    }
}
