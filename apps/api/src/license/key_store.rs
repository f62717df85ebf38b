//! Immutable set of locally issued license keys.
//!
//! Loaded once from a JSON array file at startup and never mutated.
//! Local keys are always valid, never single-use, and never touch the
//! redemption ledger.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};

/// Read-only set of permanently valid license keys.
#[derive(Debug)]
pub struct KeyStore {
    keys: HashSet<String>,
}

impl KeyStore {
    /// Loads the key set from a JSON array of strings.
    ///
    /// A missing or malformed file is a startup-fatal error; there is no
    /// per-request error path.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read license key file {}", path.display()))?;
        let keys: HashSet<String> = serde_json::from_str(&raw)
            .with_context(|| format!("License key file {} is not a JSON array of strings", path.display()))?;
        Ok(Self { keys })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[cfg(test)]
    pub fn from_keys<I: IntoIterator<Item = String>>(keys: I) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_load_json_array() {
        let f = write_temp(r#"["LOCAL-1", "LOCAL-2"]"#);
        let store = KeyStore::load(f.path()).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.contains("LOCAL-1"));
        assert!(!store.contains("LOCAL-3"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = KeyStore::load(Path::new("/nonexistent/licenses.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let f = write_temp(r#"{"not": "an array"}"#);
        assert!(KeyStore::load(f.path()).is_err());
    }

    #[test]
    fn test_comparison_is_exact() {
        // No case folding or trimming happens here; the HTTP boundary trims
        // surrounding whitespace before validation.
        let f = write_temp(r#"["LOCAL-1"]"#);
        let store = KeyStore::load(f.path()).unwrap();
        assert!(!store.contains("local-1"));
        assert!(!store.contains(" LOCAL-1"));
    }
}
