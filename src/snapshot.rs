//! Versioned checkpoint snapshots.
//!
//! Checkpoints go through explicit record types instead of serializing live
//! state, so the on-disk contract can outlive refactors of the in-memory
//! representation. A snapshot captures everything needed to resume the
//! generation loop exactly where it left off: species, members, genes, the
//! generation counter, the global best fitness, the run configuration and
//! the innovation-registry contents.
//!
//! Snapshots are written at generation boundaries only; there is no
//! partial-generation persistence.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::EvolutionConfig;
use crate::error::SnapshotError;
use crate::gene::Gene;

/// Current snapshot format version. Restore rejects anything else.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One gene as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneRecord {
    /// Historical marking.
    pub innovation: u64,
    /// Source neuron id.
    pub source: u32,
    /// Target neuron id.
    pub target: u32,
    /// Connection weight.
    pub weight: f32,
    /// Enabled flag.
    pub enabled: bool,
}

impl From<&Gene> for GeneRecord {
    fn from(gene: &Gene) -> Self {
        Self {
            innovation: gene.innovation,
            source: gene.source,
            target: gene.target,
            weight: gene.weight,
            enabled: gene.enabled,
        }
    }
}

impl From<&GeneRecord> for Gene {
    fn from(record: &GeneRecord) -> Self {
        Self {
            innovation: record.innovation,
            source: record.source,
            target: record.target,
            weight: record.weight,
            enabled: record.enabled,
        }
    }
}

/// One organism as persisted. Derived caches (the innovation range) are
/// rebuilt on restore rather than stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganismRecord {
    /// Genes in their in-memory order.
    pub genes: Vec<GeneRecord>,
    /// Hidden-id watermark.
    pub max_neuron: u32,
    /// Raw fitness at checkpoint time.
    pub fitness: f32,
}

/// One species as persisted.
///
/// `best_fitness` is `None` until the species has completed a top-mode cull
/// (negative infinity does not survive a JSON round trip).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesRecord {
    /// Members in their in-memory order; the first is the representative.
    pub members: Vec<OrganismRecord>,
    /// Generations without improvement.
    pub stagnation: u32,
    /// Best fitness ever seen, if any generation completed.
    pub best_fitness: Option<f32>,
}

/// One innovation-registry entry as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnovationRecord {
    /// Source neuron id of the structural signature.
    pub source: u32,
    /// Target neuron id of the structural signature.
    pub target: u32,
    /// Marking assigned to the signature.
    pub marking: u64,
}

/// Complete, self-contained state of a pool at a generation boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Format version; see [`SNAPSHOT_VERSION`].
    pub version: u32,
    /// Generation counter at checkpoint time.
    pub generation: u64,
    /// Fixed target population size.
    pub target_population: usize,
    /// Best fitness ever observed, if any generation completed.
    pub global_best: Option<f32>,
    /// The run configuration.
    pub config: EvolutionConfig,
    /// All species with their members.
    pub species: Vec<SpeciesRecord>,
    /// Innovation-registry contents, so resumed runs keep a consistent
    /// marking space.
    pub innovations: Vec<InnovationRecord>,
}

/// File name a generation's checkpoint is stored under.
#[must_use]
pub fn checkpoint_file_name(generation: u64) -> String {
    format!("generation_{generation}.json")
}

/// Write a snapshot under `dir`, keyed by its generation number.
///
/// # Errors
///
/// [`SnapshotError::Io`] or [`SnapshotError::Encode`]; the generation loop
/// treats either as recoverable.
pub fn write_checkpoint(dir: &Path, snapshot: &PoolSnapshot) -> Result<PathBuf, SnapshotError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(checkpoint_file_name(snapshot.generation));
    let json = serde_json::to_string(snapshot)?;
    fs::write(&path, json)?;
    Ok(path)
}

/// Read a snapshot back from a checkpoint file.
///
/// # Errors
///
/// [`SnapshotError::Io`], [`SnapshotError::Encode`], or
/// [`SnapshotError::Version`] for snapshots written by an incompatible
/// format version.
pub fn read_checkpoint(path: &Path) -> Result<PoolSnapshot, SnapshotError> {
    let json = fs::read_to_string(path)?;
    let snapshot: PoolSnapshot = serde_json::from_str(&json)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::Version(snapshot.version));
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot() -> PoolSnapshot {
        PoolSnapshot {
            version: SNAPSHOT_VERSION,
            generation: 7,
            target_population: 50,
            global_best: Some(3.5),
            config: EvolutionConfig::new(2, 1, 8, 50),
            species: vec![SpeciesRecord {
                members: vec![OrganismRecord {
                    genes: vec![GeneRecord {
                        innovation: 1,
                        source: 1,
                        target: 11,
                        weight: 0.5,
                        enabled: true,
                    }],
                    max_neuron: 2,
                    fitness: 3.5,
                }],
                stagnation: 2,
                best_fitness: Some(3.5),
            }],
            innovations: vec![InnovationRecord {
                source: 1,
                target: 11,
                marking: 1,
            }],
        }
    }

    #[test]
    fn test_write_then_read_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let snapshot = sample_snapshot();

        let path = write_checkpoint(dir.path(), &snapshot).expect("write");
        assert!(path.ends_with("generation_7.json"));

        let restored = read_checkpoint(&path).expect("read");
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut snapshot = sample_snapshot();
        snapshot.version = 99;

        let path = write_checkpoint(dir.path(), &snapshot).expect("write");
        let err = read_checkpoint(&path).unwrap_err();
        assert!(matches!(err, SnapshotError::Version(99)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_checkpoint(Path::new("/nonexistent/generation_0.json")).unwrap_err();
        assert!(matches!(err, SnapshotError::Io(_)));
    }

    #[test]
    fn test_unset_best_fitness_survives_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut snapshot = sample_snapshot();
        snapshot.global_best = None;
        snapshot.species[0].best_fitness = None;

        let path = write_checkpoint(dir.path(), &snapshot).expect("write");
        let restored = read_checkpoint(&path).expect("read");
        assert_eq!(restored.global_best, None);
        assert_eq!(restored.species[0].best_fitness, None);
    }
}
