// ============================
// relay-lib/src/emotes.rs
// ============================
//! Emote table: name -> local file reference, loaded once at startup
//! from the JSON map the emote downloader writes. Read-only afterwards.
//! Load failure degrades to an empty table; emote rendering is cosmetic
//! and must never block room operations.

use crate::error::RelayError;
use relay_common::ServerEvent;
use std::collections::HashMap;
use std::path::Path;

pub struct EmoteTable {
    map: HashMap<String, String>,
}

impl EmoteTable {
    pub fn empty() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Load the table, falling back to empty on any failure.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(table) => {
                tracing::info!(count = table.len(), path = %path.display(), "emote table loaded");
                table
            },
            Err(err) => {
                tracing::warn!(%err, path = %path.display(), "emote table unavailable, starting empty");
                Self::empty()
            },
        }
    }

    fn try_load(path: &Path) -> Result<Self, RelayError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(Self {
            map: serde_json::from_str(&raw)?,
        })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The wire event announcing the table to a client.
    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::Emotes {
            emotes: self.map.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let table = EmoteTable::load(&dir.path().join("no-such-file.json"));
        assert!(table.is_empty());
    }

    #[test]
    fn malformed_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emotes.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(EmoteTable::load(&path).is_empty());
    }

    #[test]
    fn valid_file_loads_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emotes.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{"Kappa":"kappa.webp","PogChamp":"pog.png"}}"#).unwrap();

        let table = EmoteTable::load(&path);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("Kappa"), Some("kappa.webp"));
        assert_eq!(table.get("NotThere"), None);

        match table.to_event() {
            ServerEvent::Emotes { emotes } => assert_eq!(emotes.len(), 2),
            other => panic!("Expected Emotes event, got {other:?}"),
        }
    }
}
