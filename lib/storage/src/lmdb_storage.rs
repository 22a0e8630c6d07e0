// LMDB-backed per-item vector records
use anyhow::{anyhow, Result};
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tastevec_core::{ItemId, StoredVector, Vector};
use chrono::DateTime;

const DB_VECTORS: &str = "vectors";
const DEFAULT_MAP_SIZE: usize = 4 * 1024 * 1024 * 1024;

/// Value stored under an item's storage key
#[derive(Debug, Serialize, Deserialize)]
struct VectorRecord {
    vector: Vec<f32>,
    model_version: u64,
    updated_at_ms: i64,
}

pub struct LmdbStorage {
    env: Arc<Env>,
    vectors_db: Database<Str, Bytes>,
}

impl LmdbStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        std::fs::create_dir_all(&path)?;

        let env = Arc::new(unsafe {
            EnvOpenOptions::new()
                .map_size(DEFAULT_MAP_SIZE)
                .max_dbs(4)
                .open(path)?
        });

        let mut wtxn = env.write_txn()?;
        let vectors_db = env.create_database(&mut wtxn, Some(DB_VECTORS))?;
        wtxn.commit()?;

        Ok(Self { env, vectors_db })
    }

    /// Write a record unless the stored one came from a newer model.
    /// Returns whether the record was written.
    pub fn save_vector(&self, record: &StoredVector) -> Result<bool> {
        let key = record.item_id.storage_key();
        let value = VectorRecord {
            vector: record.vector.as_slice().to_vec(),
            model_version: record.model_version,
            updated_at_ms: record.updated_at.timestamp_millis(),
        };
        let data = bincode::serialize(&value)?;

        // Write transactions are serialized by LMDB, so check and put are atomic
        let mut wtxn = self.env.write_txn()?;
        if let Some(existing) = self.vectors_db.get(&wtxn, &key)? {
            let existing: VectorRecord = bincode::deserialize(existing)?;
            if existing.model_version > record.model_version {
                wtxn.abort();
                return Ok(false);
            }
        }
        self.vectors_db.put(&mut wtxn, &key, &data)?;
        wtxn.commit()?;
        Ok(true)
    }

    pub fn get_vector(&self, id: &ItemId) -> Result<Option<StoredVector>> {
        let rtxn = self.env.read_txn()?;
        match self.vectors_db.get(&rtxn, &id.storage_key())? {
            Some(data) => Ok(Some(decode(id.clone(), data)?)),
            None => Ok(None),
        }
    }

    pub fn delete_vector(&self, id: &ItemId) -> Result<bool> {
        let mut wtxn = self.env.write_txn()?;
        let existed = self.vectors_db.delete(&mut wtxn, &id.storage_key())?;
        wtxn.commit()?;
        Ok(existed)
    }

    pub fn load_vectors(&self) -> Result<Vec<StoredVector>> {
        let rtxn = self.env.read_txn()?;
        let mut records = Vec::new();
        for entry in self.vectors_db.iter(&rtxn)? {
            let (key, data) = entry?;
            let id = ItemId::from_storage_key(key)
                .ok_or_else(|| anyhow!("malformed vector key {:?}", key))?;
            records.push(decode(id, data)?);
        }
        Ok(records)
    }

    pub fn count_vectors(&self) -> Result<u64> {
        let rtxn = self.env.read_txn()?;
        Ok(self.vectors_db.len(&rtxn)?)
    }
}

fn decode(item_id: ItemId, data: &[u8]) -> Result<StoredVector> {
    let record: VectorRecord = bincode::deserialize(data)?;
    Ok(StoredVector {
        item_id,
        vector: Vector::new(record.vector),
        model_version: record.model_version,
        updated_at: DateTime::from_timestamp_millis(record.updated_at_ms)
            .ok_or_else(|| anyhow!("timestamp out of range: {}", record.updated_at_ms))?,
    })
}
