//! # Input Files
//!
//! Loading of documents, option files and replay scripts. Files ending
//! in `.json` are read as JSON; anything else is read as YAML.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use formwatch_core::{Document, Options};

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Deserialize a JSON or YAML file.
pub fn load_structured<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read(path)?;
    let value = if is_json(path) {
        serde_json::from_str(&content)
            .with_context(|| format!("invalid JSON in {}", path.display()))?
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("invalid YAML in {}", path.display()))?
    };
    Ok(value)
}

/// Load a document description.
pub fn load_document(path: &Path) -> Result<Document> {
    let content = read(path)?;
    let document = if is_json(path) {
        Document::from_json(&content)
    } else {
        Document::from_yaml(&content)
    };
    document.with_context(|| format!("failed to load document {}", path.display()))
}

/// Load explicit options, or the empty set when no file is given.
pub fn load_options(path: Option<&Path>) -> Result<Options> {
    match path {
        Some(path) => load_structured(path),
        None => Ok(Options::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formwatch_core::OptionKey;
    use std::io::Write;

    fn write_temp(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_yaml_and_json_documents() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write_temp(&dir, "page.yaml", "tag: form\nchildren:\n  - tag: input\n");
        let json = write_temp(&dir, "page.json", r#"{"tag":"form","children":[{"tag":"input"}]}"#);
        assert_eq!(load_document(&yaml).unwrap(), load_document(&json).unwrap());
    }

    #[test]
    fn options_default_when_absent() {
        assert_eq!(load_options(None).unwrap(), Options::default());
    }

    #[test]
    fn options_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "opts.json", r#"{"alert_message":"Leave?"}"#);
        let opts = load_options(Some(&path)).unwrap();
        assert_eq!(opts.get(OptionKey::AlertMessage), Some("Leave?"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_document(Path::new("/nonexistent/page.yaml")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/page.yaml"));
    }
}
