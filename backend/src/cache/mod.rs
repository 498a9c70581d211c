//! Result Registry - memoize pipeline runs by input fingerprint
//!
//! Re-running the pipeline on an unchanged file against the same decode
//! service would repeat every remote lookup. The registry maps a
//! fingerprint of the run inputs to the files it produced.
//!
//! Invalidation rule: an entry is served only while its fingerprint matches
//! and both output files still exist with the bytes the run wrote. Every
//! run of one input writes to the same two paths, so a later run with other
//! settings makes earlier entries stale. Anything else is a miss, and a
//! stale entry is removed on lookup.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CacheError, CacheResult};
use crate::models::ProcessStats;
use crate::writer::OutputPaths;

/// Directory where entries are stored (relative to current dir)
pub const DEFAULT_REGISTRY_DIR: &str = ".autovin/results";

/// A memoized run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredResult {
    /// Fingerprint of the run inputs, also the entry ID
    pub id: String,
    /// Input file as given
    pub input_path: String,
    /// Files produced by the run
    pub outputs: OutputPaths,
    /// Content digests of `outputs` at save time
    #[serde(default)]
    pub digests: OutputDigests,
    /// Statistics of the run
    pub stats: ProcessStats,
    /// Decode service the run used
    pub decoder: String,
    /// Reference year of the age rule
    pub reference_year: i32,
    /// Creation timestamp
    pub created_at: String,
}

/// SHA-256 of both output files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDigests {
    pub processed: String,
    pub can: String,
}

impl OutputDigests {
    /// Hash the files currently at `outputs`.
    pub fn compute(outputs: &OutputPaths) -> CacheResult<Self> {
        Ok(Self {
            processed: file_digest(&outputs.processed)?,
            can: file_digest(&outputs.can)?,
        })
    }

    /// Whether the files at `outputs` still hash to these digests.
    pub fn matches(&self, outputs: &OutputPaths) -> bool {
        outputs.exist() && Self::compute(outputs).is_ok_and(|current| current == *self)
    }
}

fn file_digest(path: &Path) -> CacheResult<String> {
    let bytes = fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Inputs that determine a run's outputs.
#[derive(Debug, Clone)]
pub struct FingerprintInput<'a> {
    pub input_path: &'a Path,
    pub content: &'a [u8],
    pub decoder: &'a str,
    pub header_row: usize,
    pub reference_year: i32,
}

/// SHA-256 over every input that changes the outputs.
pub fn fingerprint(input: &FingerprintInput<'_>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.input_path.to_string_lossy().as_bytes());
    hasher.update([0u8]);
    hasher.update(input.content);
    hasher.update([0u8]);
    hasher.update(input.decoder.as_bytes());
    hasher.update([0u8]);
    hasher.update(input.header_row.to_le_bytes());
    hasher.update(input.reference_year.to_le_bytes());
    hex::encode(hasher.finalize())
}

/// Registry for memoized runs
pub struct ResultRegistry {
    /// Directory where entries are stored
    registry_dir: PathBuf,
    /// Loaded entries (id -> entry)
    entries: HashMap<String, StoredResult>,
}

impl ResultRegistry {
    /// Create a registry in the default directory, loading existing entries
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_REGISTRY_DIR)
    }

    /// Create a registry with a custom directory
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let mut registry = Self {
            registry_dir: dir.as_ref().to_path_buf(),
            entries: HashMap::new(),
        };
        registry.load_all();
        registry
    }

    /// Load all entries from the registry directory
    fn load_all(&mut self) {
        let entries = match fs::read_dir(&self.registry_dir) {
            Ok(e) => e,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(stored) = serde_json::from_str::<StoredResult>(&content) {
                        self.entries.insert(stored.id.clone(), stored);
                    }
                }
            }
        }
    }

    /// All entries, newest first
    pub fn list(&self) -> Vec<&StoredResult> {
        let mut all: Vec<_> = self.entries.values().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    /// Get an entry by ID, valid or not
    pub fn get(&self, id: &str) -> Option<&StoredResult> {
        self.entries.get(id)
    }

    /// Entry for `fingerprint` if it is still valid.
    ///
    /// An entry whose outputs are gone or were rewritten is deleted.
    pub fn lookup(&mut self, fingerprint: &str) -> Option<StoredResult> {
        let stored = self.entries.get(fingerprint)?;
        if stored.digests.matches(&stored.outputs) {
            return Some(stored.clone());
        }

        let _ = self.delete(fingerprint);
        None
    }

    /// Store an entry, replacing any previous one with the same ID
    pub fn save(&mut self, stored: StoredResult) -> CacheResult<()> {
        fs::create_dir_all(&self.registry_dir)?;

        let content = serde_json::to_string_pretty(&stored)?;
        fs::write(self.entry_path(&stored.id), content)?;

        self.entries.insert(stored.id.clone(), stored);
        Ok(())
    }

    /// Delete one entry
    pub fn delete(&mut self, id: &str) -> CacheResult<()> {
        if self.entries.remove(id).is_none() {
            return Err(CacheError::NotFound(id.to_string()));
        }

        let path = self.entry_path(id);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Delete every entry, returning how many were removed
    pub fn clear(&mut self) -> CacheResult<usize> {
        let ids: Vec<String> = self.entries.keys().cloned().collect();
        for id in &ids {
            self.delete(id)?;
        }
        Ok(ids.len())
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        self.registry_dir.join(format!("{}.json", id))
    }
}

impl Default for ResultRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn stored(id: &str, outputs: OutputPaths) -> StoredResult {
        StoredResult {
            id: id.to_string(),
            input_path: "fleet.xlsx".to_string(),
            digests: OutputDigests::compute(&outputs).unwrap_or_default(),
            outputs,
            stats: ProcessStats::default(),
            decoder: "https://vpic.nhtsa.dot.gov/api/vehicles".to_string(),
            reference_year: 2026,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    fn fp(content: &[u8], reference_year: i32) -> String {
        fingerprint(&FingerprintInput {
            input_path: Path::new("fleet.xlsx"),
            content,
            decoder: "https://vpic.nhtsa.dot.gov/api/vehicles",
            header_row: 3,
            reference_year,
        })
    }

    #[test]
    fn test_fingerprint_tracks_inputs() {
        assert_eq!(fp(b"abc", 2026), fp(b"abc", 2026));
        assert_ne!(fp(b"abc", 2026), fp(b"abd", 2026));
        assert_ne!(fp(b"abc", 2026), fp(b"abc", 2027));
        assert_eq!(fp(b"abc", 2026).len(), 64);
    }

    #[test]
    fn test_entries_survive_reload() {
        let dir = tempdir().unwrap();
        let outputs = OutputPaths::for_input(&dir.path().join("fleet.xlsx"));
        fs::write(&outputs.processed, b"x").unwrap();
        fs::write(&outputs.can, b"x").unwrap();

        let mut registry = ResultRegistry::with_dir(dir.path().join("cache"));
        registry.save(stored("abc", outputs.clone())).unwrap();

        let mut reloaded = ResultRegistry::with_dir(dir.path().join("cache"));
        let hit = reloaded.lookup("abc").unwrap();
        assert_eq!(hit.outputs, outputs);
        assert_eq!(reloaded.list().len(), 1);
    }

    #[test]
    fn test_missing_output_invalidates_entry() {
        let dir = tempdir().unwrap();
        let outputs = OutputPaths::for_input(&dir.path().join("fleet.xlsx"));
        fs::write(&outputs.can, b"x").unwrap();

        let mut registry = ResultRegistry::with_dir(dir.path().join("cache"));
        registry.save(stored("abc", outputs)).unwrap();

        assert!(registry.lookup("abc").is_none());
        assert!(registry.get("abc").is_none());
        assert!(!dir.path().join("cache").join("abc.json").exists());
    }

    #[test]
    fn test_rewritten_output_invalidates_entry() {
        let dir = tempdir().unwrap();
        let outputs = OutputPaths::for_input(&dir.path().join("fleet.xlsx"));
        fs::write(&outputs.processed, b"workbook").unwrap();
        fs::write(&outputs.can, b"VRN,VIN\nTruck 1,1HGCM82633A004352\n").unwrap();

        let mut registry = ResultRegistry::with_dir(dir.path().join("cache"));
        registry.save(stored("abc", outputs.clone())).unwrap();
        assert!(registry.lookup("abc").is_some());

        // Another run of the same input overwrites the CAN file
        fs::write(&outputs.can, b"VRN,VIN\n").unwrap();

        assert!(registry.lookup("abc").is_none());
        assert!(registry.get("abc").is_none());
    }

    #[test]
    fn test_digests_track_file_contents() {
        let dir = tempdir().unwrap();
        let outputs = OutputPaths::for_input(&dir.path().join("fleet.xlsx"));
        fs::write(&outputs.processed, b"a").unwrap();
        fs::write(&outputs.can, b"b").unwrap();

        let digests = OutputDigests::compute(&outputs).unwrap();
        assert_eq!(digests.can.len(), 64);
        assert!(digests.matches(&outputs));
        assert!(!OutputDigests::default().matches(&outputs));

        fs::remove_file(&outputs.can).unwrap();
        assert!(!digests.matches(&outputs));
        assert!(OutputDigests::compute(&outputs).is_err());
    }

    #[test]
    fn test_delete_and_clear() {
        let dir = tempdir().unwrap();
        let outputs = OutputPaths::for_input(&dir.path().join("fleet.xlsx"));
        let mut registry = ResultRegistry::with_dir(dir.path());

        registry.save(stored("a", outputs.clone())).unwrap();
        registry.save(stored("b", outputs)).unwrap();

        registry.delete("a").unwrap();
        assert!(matches!(registry.delete("a"), Err(CacheError::NotFound(_))));
        assert_eq!(registry.clear().unwrap(), 1);
        assert!(registry.list().is_empty());
    }
}
