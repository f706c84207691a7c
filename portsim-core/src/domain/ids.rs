use serde::{Deserialize, Serialize};
use std::fmt;

/// BLAKE3 hash of a canonically serialized `SimulationConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigHash(pub String);

impl ConfigHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// BLAKE3 content hash of the canonicalized bar table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    pub fn from_hash(hash: &str) -> Self {
        Self(hash.to_string())
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic run ID (config + dataset).
///
/// Identical inputs always produce the same ID, so two runs with equal IDs
/// must produce identical trade logs and equity curves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId {
    pub config_hash: ConfigHash,
    pub dataset_hash: DatasetHash,
}

impl RunId {
    pub fn new(config_hash: ConfigHash, dataset_hash: DatasetHash) -> Self {
        Self {
            config_hash,
            dataset_hash,
        }
    }

    /// Combined hash, stable across builds and platforms.
    pub fn hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.config_hash.0.as_bytes());
        hasher.update(b"|");
        hasher.update(self.dataset_hash.0.as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    /// First 12 hex characters, for directory names.
    pub fn short(&self) -> String {
        self.hash().chars().take(12).collect()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_deterministic() {
        let run1 = RunId::new(ConfigHash::from_bytes(b"abc"), DatasetHash::from_hash("def456"));
        let run2 = RunId::new(ConfigHash::from_bytes(b"abc"), DatasetHash::from_hash("def456"));
        assert_eq!(run1.hash(), run2.hash());
        assert_eq!(run1.short().len(), 12);
    }

    #[test]
    fn test_run_id_different_dataset_different_hash() {
        let run1 = RunId::new(ConfigHash::from_bytes(b"abc"), DatasetHash::from_hash("d1"));
        let run2 = RunId::new(ConfigHash::from_bytes(b"abc"), DatasetHash::from_hash("d2"));
        assert_ne!(run1.hash(), run2.hash());
    }
}
