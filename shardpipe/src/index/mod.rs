use crate::error::{Result, ShardPipeError};
use crate::guard::{Deadline, LockRegistry};
use crate::record;
use crate::resource;
use crate::search::{QueryResult, SearchBackend};
use crate::storage::StorageBackend;
use std::time::Duration;

/// Lazily builds a search index from a shard file, exactly once per
/// (resource, filename) pair, guarded by a persisted marker.
///
/// The pair moves Unindexed -> Indexing -> Indexed, and back to Unindexed via
/// `teardown`. The marker is written only after every document has been
/// submitted, so a crash mid-build leaves the pair Unindexed and a retry
/// rebuilds it; stable document identities make the rebuild an upsert rather
/// than a duplication. "Index exists but marker absent" is likewise treated
/// as Unindexed, favoring re-indexing safety over duplicate avoidance.
pub struct Indexer<'a> {
    storage: &'a dyn StorageBackend,
    search: &'a dyn SearchBackend,
    locks: &'a LockRegistry,
    lock_wait: Duration,
}

impl<'a> Indexer<'a> {
    pub fn new(
        storage: &'a dyn StorageBackend,
        search: &'a dyn SearchBackend,
        locks: &'a LockRegistry,
        lock_wait: Duration,
    ) -> Self {
        Indexer {
            storage,
            search,
            locks,
            lock_wait,
        }
    }

    /// Make sure the index for `filename` exists and is populated, then
    /// return the current unfiltered query result.
    ///
    /// Idempotent: if the marker is present the build is skipped entirely.
    /// The first backend failure aborts the call with no marker written.
    pub fn ensure_indexed(
        &self,
        resource: &str,
        filename: &str,
        deadline: Deadline,
    ) -> Result<QueryResult> {
        let _guard = self.locks.acquire(resource, filename, self.lock_wait)?;

        let marker = resource::marker_path(resource, filename);
        deadline.check("ensure_indexed")?;
        if self.storage.path_exists(&marker)? {
            log::debug!("{resource}/{filename} already indexed, skipping build");
        } else {
            self.build(resource, filename, &marker, deadline)?;
        }

        deadline.check("ensure_indexed")?;
        self.search
            .search(&resource::index_name(resource, filename), filename)
    }

    fn build(&self, resource: &str, filename: &str, marker: &str, deadline: Deadline) -> Result<()> {
        let index = resource::index_name(resource, filename);

        // Idempotent create: an index left over from a crashed run is fine.
        deadline.check("index_build")?;
        self.search.create_index(&index)?;

        let shard = resource::shard_path(resource, filename);
        deadline.check("index_build")?;
        if !self.storage.path_exists(&shard)? {
            return Err(ShardPipeError::ShardFileNotFound {
                resource: resource.to_string(),
                filename: filename.to_string(),
            });
        }
        let bytes = self.storage.read_file(&shard)?;
        let records = record::decode_records(&bytes)?;

        for (line_no, rec) in records.iter().enumerate() {
            deadline.check("index_build")?;
            self.search.index_document(
                &index,
                filename,
                &resource::doc_id(resource, filename, line_no),
                &serde_json::Value::Object(rec.clone()),
            )?;
        }

        // Marker last: its existence means the bulk load completed.
        deadline.check("index_build")?;
        self.storage.touch_marker(marker)?;
        log::debug!(
            "indexed {} documents from {resource}/{filename} into '{index}'",
            records.len()
        );
        Ok(())
    }

    /// Delete the index and clear the marker, returning the pair to
    /// Unindexed. Already-absent index or marker counts as success.
    pub fn teardown(&self, resource: &str, filename: &str, deadline: Deadline) -> Result<()> {
        let _guard = self.locks.acquire(resource, filename, self.lock_wait)?;

        deadline.check("teardown")?;
        self.search
            .delete_index(&resource::index_name(resource, filename))?;

        let marker = resource::marker_path(resource, filename);
        deadline.check("teardown")?;
        if self.storage.path_exists(&marker)? {
            self.storage.remove_file(&marker)?;
        }
        Ok(())
    }
}
