//! Saving and loading models
//!
//! A snapshot carries the configuration, every learned parameter and the
//! training history. The dropout RNG is not stored; loading reseeds it.

use super::config::ModelConfig;
use super::network::{Parameters, SequenceModel, MODEL_VERSION};
use crate::error::Result;
use crate::training::TrainingHistory;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{info, warn};

/// Serializable state of a [`SequenceModel`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    version: String,
    config: ModelConfig,
    params: Parameters,
    history: TrainingHistory,
}

impl ModelSnapshot {
    /// Version tag of the crate that wrote the snapshot
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }
}

impl SequenceModel {
    /// Copy of the current model state
    pub fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            version: MODEL_VERSION.to_string(),
            config: self.config.clone(),
            params: self.params.clone(),
            history: self.history.clone(),
        }
    }

    /// Rebuild a model, seeding its dropout RNG with `seed`
    ///
    /// # Errors
    /// `InvalidConfig` or `DimensionMismatch` when the stored parameters do
    /// not agree with the stored configuration.
    pub fn from_snapshot(snapshot: ModelSnapshot, seed: u64) -> Result<Self> {
        if snapshot.version != MODEL_VERSION {
            warn!(
                stored = %snapshot.version,
                current = MODEL_VERSION,
                "loading a snapshot written by a different version"
            );
        }
        Self::from_parts(snapshot.config, snapshot.params, snapshot.history, seed)
    }

    /// Write the model as JSON
    pub fn save_model<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, &self.snapshot())?;
        Ok(())
    }

    /// Read a model written by [`save_model`](Self::save_model)
    pub fn load_model<R: Read>(reader: R, seed: u64) -> Result<Self> {
        let snapshot: ModelSnapshot = serde_json::from_reader(reader)?;
        Self::from_snapshot(snapshot, seed)
    }

    /// Save the model to a binary file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, &self.snapshot())?;
        writer.flush()?;
        info!(path = %path.display(), "model saved");
        Ok(())
    }

    /// Load a model saved with [`save`](Self::save)
    pub fn load<P: AsRef<Path>>(path: P, seed: u64) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let snapshot: ModelSnapshot = bincode::deserialize_from(reader)?;
        info!(path = %path.display(), "model loaded");
        Self::from_snapshot(snapshot, seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{generate_dataset, generate_sequence, Regime};
    use crate::error::Error;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::tempdir;

    fn trained_model() -> SequenceModel {
        let config = ModelConfig::small(6).with_epochs(2);
        let mut model = SequenceModel::with_seed(config, 9).unwrap();
        let (data, labels) = generate_dataset(4, 6, &mut StdRng::seed_from_u64(1));
        model.train(&data, &labels).unwrap();
        model
    }

    #[test]
    fn test_json_round_trip() {
        let model = trained_model();
        let mut buffer = Vec::new();
        model.save_model(&mut buffer).unwrap();

        let loaded = SequenceModel::load_model(buffer.as_slice(), 0).unwrap();
        assert_eq!(loaded.snapshot(), model.snapshot());
        assert_eq!(loaded.training_history().len(), 2);

        let seq = generate_sequence(6, 100.0, Regime::Sideways, &mut StdRng::seed_from_u64(3));
        let a = model.predict(&seq).unwrap();
        let b = loaded.predict(&seq).unwrap();
        assert_eq!(a.probabilities, b.probabilities);
    }

    #[test]
    fn test_binary_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let model = trained_model();
        model.save(&path).unwrap();

        let loaded = SequenceModel::load(&path, 0).unwrap();
        assert_eq!(loaded.snapshot(), model.snapshot());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let result = SequenceModel::load(dir.path().join("absent.bin"), 0);
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_malformed_json() {
        let result = SequenceModel::load_model(&b"{\"version\": 1"[..], 0);
        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_inconsistent_snapshot_rejected() {
        let mut snapshot = trained_model().snapshot();
        snapshot.config.num_layers = 3;
        assert!(matches!(
            SequenceModel::from_snapshot(snapshot, 0),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
