//! ASH-014: Recipe files on disk.
//!
//! Upgrades keep `<file>.backup` and rewrite the recipe atomically.

use crate::core::normalizer::{template_document, Upgrade};
use crate::journal::hasher;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Suffix of the companion function file next to a recipe.
pub const FUNCTIONS_SUFFIX: &str = "functions.yaml";

/// A recipe document as read from disk.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub value: Value,
    /// BLAKE3 of the file contents as read
    pub source_hash: String,
}

/// Read and parse a recipe document.
pub fn load_document(path: &Path) -> Result<LoadedDocument, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let value = serde_json::from_str(&content)
        .map_err(|e| format!("invalid JSON in {}: {}", path.display(), e))?;
    Ok(LoadedDocument {
        value,
        source_hash: hasher::hash_string(&content),
    })
}

/// Journal key for a recipe: its file stem.
pub fn recipe_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "recipe".to_string())
}

/// `<file>.backup` next to the recipe.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".backup");
    PathBuf::from(name)
}

/// `<stem>.functions.yaml` next to the recipe.
pub fn functions_path(recipe_path: &Path) -> PathBuf {
    recipe_path.with_file_name(format!("{}.{}", recipe_name(recipe_path), FUNCTIONS_SUFFIX))
}

/// Write a document as pretty JSON atomically (write to temp, then rename).
pub fn write_document(path: &Path, doc: &Value) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create dir {}: {}", parent.display(), e))?;
    }
    let mut json =
        serde_json::to_string_pretty(doc).map_err(|e| format!("serialize error: {}", e))?;
    json.push('\n');

    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    std::fs::write(&tmp_path, &json)
        .map_err(|e| format!("cannot write {}: {}", tmp_path.display(), e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        format!(
            "cannot rename {} to {}: {}",
            tmp_path.display(),
            path.display(),
            e
        )
    })
}

/// Apply an upgrade to the recipe file. Returns the backup path when one was kept.
pub fn persist_upgrade(
    path: &Path,
    upgrade: &Upgrade,
    backup: bool,
) -> Result<Option<PathBuf>, String> {
    let kept = if backup {
        let dest = backup_path(path);
        std::fs::copy(path, &dest).map_err(|e| {
            format!(
                "cannot back up {} to {}: {}",
                path.display(),
                dest.display(),
                e
            )
        })?;
        Some(dest)
    } else {
        None
    };
    write_document(path, &upgrade.canonical)?;
    Ok(kept)
}

/// Create a new recipe from the starter template. Never overwrites.
pub fn write_template(path: &Path, title: &str, description: &str) -> Result<(), String> {
    if path.exists() {
        return Err(format!("{} already exists", path.display()));
    }
    write_document(path, &template_document(title, description))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::normalizer::normalize;
    use serde_json::json;

    #[test]
    fn test_ash014_paths() {
        let p = Path::new("/recipes/deploy.json");
        assert_eq!(recipe_name(p), "deploy");
        assert_eq!(backup_path(p), PathBuf::from("/recipes/deploy.json.backup"));
        assert_eq!(
            functions_path(p),
            PathBuf::from("/recipes/deploy.functions.yaml")
        );
    }

    #[test]
    fn test_ash014_load_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.json");
        std::fs::write(&path, r#"[{"title": "T"}, {"statement": "s"}]"#).unwrap();
        let doc = load_document(&path).unwrap();
        assert!(doc.value.is_array());
        assert!(doc.source_hash.starts_with("blake3:"));
    }

    #[test]
    fn test_ash014_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_document(&path).unwrap_err().contains("invalid JSON"));
        assert!(load_document(&dir.path().join("none.json"))
            .unwrap_err()
            .contains("cannot read"));
    }

    #[test]
    fn test_ash014_persist_upgrade_with_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        let original = r#"[{"title": "Old"}, {"statement": "one"}, {"statement": "two"}]"#;
        std::fs::write(&path, original).unwrap();

        let doc = load_document(&path).unwrap();
        let normalized = normalize(&doc.value).unwrap();
        let upgrade = normalized.upgrade.unwrap();
        let backup = persist_upgrade(&path, &upgrade, true).unwrap().unwrap();

        assert_eq!(std::fs::read_to_string(&backup).unwrap(), original);
        let rewritten = load_document(&path).unwrap().value;
        assert_eq!(rewritten["version"], json!("1.1"));
        assert_eq!(rewritten["step2"]["statement"], json!("two"));
        assert!(!normalize(&rewritten).unwrap().was_upgraded());
        assert!(!dir.path().join("legacy.json.tmp").exists());
    }

    #[test]
    fn test_ash014_persist_upgrade_without_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        std::fs::write(&path, r#"[{}, {"statement": "one"}]"#).unwrap();
        let upgrade = normalize(&load_document(&path).unwrap().value)
            .unwrap()
            .upgrade
            .unwrap();
        assert_eq!(persist_upgrade(&path, &upgrade, false).unwrap(), None);
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn test_ash014_write_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new/recipe.json");
        write_template(&path, "Fresh", "A new one").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.ends_with('\n'));
        let recipe = normalize(&serde_json::from_str(&content).unwrap()).unwrap().recipe;
        assert_eq!(recipe.title, "Fresh");
        assert_eq!(recipe.steps.len(), 2);

        let err = write_template(&path, "Again", "").unwrap_err();
        assert!(err.contains("already exists"));
    }
}
