use anyhow::{anyhow, Result};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use std::io::Write;
use std::path::{Path, PathBuf};
use tastevec_core::VectorModel;
use tracing::info;

const MODEL_FILENAME: &str = "model.bin";

/// The single active model record on disk.
///
/// Writes go to a temporary file that is renamed over the previous record,
/// so a crash mid-save leaves the old model readable.
pub struct ModelFile {
    path: PathBuf,
}

impl ModelFile {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            path: data_dir.as_ref().join(MODEL_FILENAME),
        }
    }

    pub fn save(&self, model: &VectorModel) -> Result<()> {
        let data = bincode::serialize(model)
            .map_err(|e| anyhow!("Serialization error: {}", e))?;
        AtomicFile::new(&self.path, OverwriteBehavior::AllowOverwrite)
            .write(|f| f.write_all(&data))
            .map_err(|e| anyhow!("Failed to write {:?}: {}", self.path, e))?;
        info!(
            version = model.version(),
            vocabulary = model.vocabulary_size(),
            path = ?self.path,
            "model saved"
        );
        Ok(())
    }

    pub fn load(&self) -> Result<Option<VectorModel>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = std::fs::read(&self.path)?;
        let model: VectorModel = bincode::deserialize(&data)
            .map_err(|e| anyhow!("Deserialization error: {}", e))?;
        Ok(Some(model))
    }
}
