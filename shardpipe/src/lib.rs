pub mod config;
pub mod error;
pub mod guard;
pub mod index;
pub mod partition;
pub mod pipeline;
pub mod record;
pub mod resource;
pub mod search;
pub mod storage;

pub use config::PipelineConfig;
pub use error::{Result, ShardPipeError};
pub use guard::Deadline;
pub use index::Indexer;
pub use partition::{PartitionReport, Partitioner};
pub use pipeline::{Pipeline, ResourceHandle};
pub use record::Record;
pub use search::{FileSearch, MemorySearch, QueryResult, SearchBackend, SearchHit};
pub use storage::{LocalStorage, StorageBackend};
