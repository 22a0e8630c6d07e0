pub mod manager;
pub mod lmdb_storage;
pub mod model_file;

pub use manager::StorageManager;
pub use lmdb_storage::LmdbStorage;
pub use model_file::ModelFile;
