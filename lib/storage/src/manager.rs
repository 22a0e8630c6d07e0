use crate::lmdb_storage::LmdbStorage;
use crate::model_file::ModelFile;
use anyhow::Result;
use std::path::Path;
use tastevec_core::{ItemId, StoredVector, VectorModel};
use tracing::info;

/// Durable layout under one data directory:
///
/// ```text
/// <data_dir>/model.bin   active model record
/// <data_dir>/lmdb/       one vector record per item
/// ```
pub struct StorageManager {
    lmdb: LmdbStorage,
    model_file: ModelFile,
}

impl StorageManager {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let lmdb = LmdbStorage::new(data_dir.join("lmdb"))?;
        let model_file = ModelFile::new(&data_dir);
        info!(data_dir = ?data_dir, "storage opened");

        Ok(Self {
            lmdb,
            model_file,
        })
    }

    pub fn load_model(&self) -> Result<Option<VectorModel>> {
        self.model_file.load()
    }

    pub fn save_model(&self, model: &VectorModel) -> Result<()> {
        self.model_file.save(model)
    }

    /// Persist a vector record; `false` if a newer model's record is already stored
    pub fn save_vector(&self, record: &StoredVector) -> Result<bool> {
        self.lmdb.save_vector(record)
    }

    pub fn get_vector(&self, id: &ItemId) -> Result<Option<StoredVector>> {
        self.lmdb.get_vector(id)
    }

    pub fn delete_vector(&self, id: &ItemId) -> Result<bool> {
        self.lmdb.delete_vector(id)
    }

    pub fn load_vectors(&self) -> Result<Vec<StoredVector>> {
        self.lmdb.load_vectors()
    }

    pub fn count_vectors(&self) -> Result<u64> {
        self.lmdb.count_vectors()
    }
}
