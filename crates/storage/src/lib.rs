pub mod db;
pub mod export;
pub mod repository;

pub use db::{create_db, create_memory_db, DbPool, StorageError};
pub use export::{
    read_consolidated, write_aggregates, write_consolidated, ConsolidatedExport, ExportError,
};
pub use repository::{MemoryRepository, Repository, SqliteRepository};
