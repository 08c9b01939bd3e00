use crate::config::{PipelineConfig, CONFIG_FILE};
use crate::error::Result;
use crate::guard::{Deadline, LockRegistry};
use crate::index::Indexer;
use crate::partition::{PartitionReport, Partitioner};
use crate::record::Record;
use crate::resource;
use crate::search::{FileSearch, QueryResult, SearchBackend};
use crate::storage::{LocalStorage, StorageBackend};
use std::path::Path;
use std::sync::Arc;

/// The main entry point. Owns the pooled storage and search handles (built
/// once, shared across operations) and the in-process lock registry, and
/// hands out per-resource handles for the partition-and-index pipeline.
pub struct Pipeline {
    storage: Arc<dyn StorageBackend>,
    search: Arc<dyn SearchBackend>,
    locks: LockRegistry,
    config: PipelineConfig,
}

impl Pipeline {
    /// Open a pipeline over a local data directory with a file-backed search
    /// backend stored alongside it (under `_search/`). Creates the directory
    /// if needed and honors a `pipeline.yaml` inside it when present.
    pub fn open(data_dir: &str) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;

        let config_path = Path::new(data_dir).join(CONFIG_FILE);
        let config = if config_path.exists() {
            let mut config = PipelineConfig::load(&config_path)?;
            config.data_dir = data_dir.to_string();
            config
        } else {
            PipelineConfig::new(data_dir)
        };

        Ok(Self::with_backends(
            Arc::new(LocalStorage::new(data_dir)),
            Arc::new(FileSearch::new(Path::new(data_dir).join("_search"))),
            config,
        ))
    }

    /// Build a pipeline over caller-supplied backends. This is how a real
    /// deployment plugs in its storage cluster and search engine.
    pub fn with_backends(
        storage: Arc<dyn StorageBackend>,
        search: Arc<dyn SearchBackend>,
        config: PipelineConfig,
    ) -> Self {
        Pipeline {
            storage,
            search,
            locks: LockRegistry::new(),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn storage(&self) -> &dyn StorageBackend {
        self.storage.as_ref()
    }

    pub fn search(&self) -> &dyn SearchBackend {
        self.search.as_ref()
    }

    /// Create a resource folder with its immutable split key.
    pub fn create_resource(&self, name: &str, split_key: &str) -> Result<()> {
        resource::create_resource(self.storage.as_ref(), name, split_key)
    }

    pub fn list_resources(&self) -> Result<Vec<String>> {
        resource::list_resources(self.storage.as_ref())
    }

    /// Recursively delete a resource and everything under it.
    pub fn delete_resource(&self, name: &str) -> Result<()> {
        resource::delete_resource(self.storage.as_ref(), name)
    }

    /// Get a handle for an existing resource. Fails with `ResourceNotFound`
    /// if the folder or its split-key file is missing.
    pub fn resource(&self, name: &str) -> Result<ResourceHandle<'_>> {
        let split_key = resource::resource_split_key(self.storage.as_ref(), name)?;
        Ok(ResourceHandle {
            pipeline: self,
            name: name.to_string(),
            split_key,
        })
    }

    /// Apply the configured default when the caller supplied no bound.
    fn effective_deadline(&self, deadline: Deadline) -> Deadline {
        if deadline.is_unbounded() {
            self.config.default_deadline()
        } else {
            deadline
        }
    }
}

/// A handle to one resource within a pipeline.
pub struct ResourceHandle<'a> {
    pipeline: &'a Pipeline,
    name: String,
    split_key: String,
}

impl<'a> ResourceHandle<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn split_key(&self) -> &str {
        &self.split_key
    }

    /// List the resource's files (shard files and markers).
    pub fn files(&self) -> Result<Vec<String>> {
        resource::list_files(self.pipeline.storage.as_ref(), &self.name)
    }

    /// Read a shard file back as decoded records.
    pub fn read_shard(&self, filename: &str) -> Result<Vec<Record>> {
        resource::read_shard(self.pipeline.storage.as_ref(), &self.name, filename)
    }

    /// Split a batch into shard files keyed by this resource's split key.
    pub fn partition(&self, records: &[Record], deadline: Deadline) -> Result<PartitionReport> {
        let partitioner = Partitioner::new(
            self.pipeline.storage.as_ref(),
            &self.pipeline.locks,
            self.pipeline.config.lock_wait(),
        );
        partitioner.partition(
            &self.name,
            &self.split_key,
            records,
            self.pipeline.effective_deadline(deadline),
        )
    }

    /// Build the index for `filename` if it is not built yet, and return the
    /// current query result either way.
    pub fn ensure_indexed(&self, filename: &str, deadline: Deadline) -> Result<QueryResult> {
        self.indexer().ensure_indexed(
            &self.name,
            filename,
            self.pipeline.effective_deadline(deadline),
        )
    }

    /// Delete the index for `filename` and clear its marker.
    pub fn teardown(&self, filename: &str, deadline: Deadline) -> Result<()> {
        self.indexer().teardown(
            &self.name,
            filename,
            self.pipeline.effective_deadline(deadline),
        )
    }

    fn indexer(&self) -> Indexer<'_> {
        Indexer::new(
            self.pipeline.storage.as_ref(),
            self.pipeline.search.as_ref(),
            &self.pipeline.locks,
            self.pipeline.config.lock_wait(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Pipeline) {
        let tmp = TempDir::new().unwrap();
        let pipeline = Pipeline::open(tmp.path().to_str().unwrap()).unwrap();
        (tmp, pipeline)
    }

    fn rec(json: serde_json::Value) -> Record {
        json.as_object().unwrap().clone()
    }

    #[test]
    fn test_resource_lifecycle() {
        let (_tmp, pipeline) = setup();

        pipeline.create_resource("sales", "region").unwrap();
        pipeline.create_resource("orders", "country").unwrap();
        assert_eq!(
            pipeline.list_resources().unwrap(),
            vec!["orders".to_string(), "sales".to_string()]
        );

        let sales = pipeline.resource("sales").unwrap();
        assert_eq!(sales.split_key(), "region");

        pipeline.delete_resource("orders").unwrap();
        assert_eq!(pipeline.list_resources().unwrap(), vec!["sales".to_string()]);
    }

    #[test]
    fn test_unknown_resource() {
        let (_tmp, pipeline) = setup();
        assert!(pipeline.resource("nope").is_err());
    }

    #[test]
    fn test_partition_then_index_end_to_end() {
        let (_tmp, pipeline) = setup();
        pipeline.create_resource("sales", "region").unwrap();
        let sales = pipeline.resource("sales").unwrap();

        let batch = vec![
            rec(json!({"region": "east", "amt": 5})),
            rec(json!({"region": "west", "amt": 7})),
            rec(json!({"region": "east", "amt": 2})),
        ];

        let report = sales.partition(&batch, Deadline::none()).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.shards()["east"], "sales-east");
        assert_eq!(report.shards()["west"], "sales-west");

        let east = sales.read_shard("sales-east").unwrap();
        assert_eq!(east.len(), 2);
        assert_eq!(east[0]["amt"], json!(5));
        assert_eq!(east[1]["amt"], json!(2));

        let result = sales.ensure_indexed("sales-east", Deadline::none()).unwrap();
        assert_eq!(result.total, 2);
        assert!(pipeline
            .storage()
            .path_exists("sales/sales-east.indexed")
            .unwrap());

        // Querying again returns the same documents without rebuilding
        let again = sales.ensure_indexed("sales-east", Deadline::none()).unwrap();
        assert_eq!(result, again);

        sales.teardown("sales-east", Deadline::none()).unwrap();
        assert!(!pipeline
            .storage()
            .path_exists("sales/sales-east.indexed")
            .unwrap());
    }

    #[test]
    fn test_files_reflect_pipeline_activity() {
        let (_tmp, pipeline) = setup();
        pipeline.create_resource("sales", "region").unwrap();
        let sales = pipeline.resource("sales").unwrap();

        sales
            .partition(&[rec(json!({"region": "east", "amt": 1}))], Deadline::none())
            .unwrap();
        sales.ensure_indexed("sales-east", Deadline::none()).unwrap();

        assert_eq!(
            sales.files().unwrap(),
            vec!["sales-east".to_string(), "sales-east.indexed".to_string()]
        );
    }

    #[test]
    fn test_open_honors_config_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "data_dir: ignored\nlock_wait_ms: 42\n",
        )
        .unwrap();

        let pipeline = Pipeline::open(tmp.path().to_str().unwrap()).unwrap();
        assert_eq!(pipeline.config().lock_wait_ms, 42);
        // data_dir always comes from the open() argument
        assert_eq!(pipeline.config().data_dir, tmp.path().to_str().unwrap());
    }

    #[test]
    fn test_round_trip_through_handle() {
        let (_tmp, pipeline) = setup();
        pipeline.create_resource("logs", "level").unwrap();
        let logs = pipeline.resource("logs").unwrap();

        let batch: Vec<Record> = (0..10)
            .map(|i| rec(json!({"level": "info", "seq": i})))
            .collect();
        logs.partition(&batch, Deadline::none()).unwrap();

        let rows = logs.read_shard("logs-info").unwrap();
        assert_eq!(rows, batch);
    }
}
