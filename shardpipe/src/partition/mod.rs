use crate::error::{Result, ShardPipeError};
use crate::guard::{Deadline, LockRegistry};
use crate::record::{self, Record};
use crate::resource;
use crate::storage::StorageBackend;
use std::collections::HashMap;
use std::time::Duration;

/// One shard file successfully written by a partition call.
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenShard {
    pub key_value: String,
    pub shard_file: String,
}

/// A group whose shard write was attempted and failed. The remaining groups
/// in the batch are still attempted; callers retry from here.
#[derive(Debug)]
pub struct FailedShard {
    pub key_value: String,
    pub shard_file: String,
    pub error: ShardPipeError,
}

/// A record that could not be routed (split key missing or non-scalar).
/// Rejection of one record never blocks co-batched records that do carry
/// the key.
#[derive(Debug)]
pub struct RejectedRecord {
    pub position: usize,
    pub error: ShardPipeError,
}

/// Per-key-value outcome of one partition call.
#[derive(Debug, Default)]
pub struct PartitionReport {
    pub written: Vec<WrittenShard>,
    pub failed: Vec<FailedShard>,
    pub rejected: Vec<RejectedRecord>,
}

impl PartitionReport {
    /// True when every record was routed and every shard write succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.rejected.is_empty()
    }

    /// Map of key value to shard file name for the successful writes.
    pub fn shards(&self) -> HashMap<&str, &str> {
        self.written
            .iter()
            .map(|w| (w.key_value.as_str(), w.shard_file.as_str()))
            .collect()
    }
}

/// Splits an incoming batch of records into shard files keyed by the
/// resource's split key.
///
/// Shard writes use overwrite semantics: each call replaces any prior shard
/// for a key value it touches. Callers wanting merge semantics accumulate
/// the full group in memory before calling.
pub struct Partitioner<'a> {
    storage: &'a dyn StorageBackend,
    locks: &'a LockRegistry,
    lock_wait: Duration,
}

impl<'a> Partitioner<'a> {
    pub fn new(storage: &'a dyn StorageBackend, locks: &'a LockRegistry, lock_wait: Duration) -> Self {
        Partitioner {
            storage,
            locks,
            lock_wait,
        }
    }

    /// Group `records` by the value under `split_key` and write one shard
    /// file per distinct value into the resource folder.
    ///
    /// Groups keep first-appearance order and records keep batch order within
    /// their group. Write failures are best-effort partial: a failed group
    /// does not prevent the remaining groups, and every outcome lands in the
    /// report. An expired deadline fails the still-unwritten groups with
    /// `Timeout` rather than dropping them from the report.
    pub fn partition(
        &self,
        resource: &str,
        split_key: &str,
        records: &[Record],
        deadline: Deadline,
    ) -> Result<PartitionReport> {
        if records.is_empty() {
            return Err(ShardPipeError::EmptyBatch);
        }

        let mut report = PartitionReport::default();

        // Single pass: group by key value, ordered by first appearance.
        let mut groups: Vec<(String, Vec<&Record>)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for (position, rec) in records.iter().enumerate() {
            match record::split_value(rec, split_key) {
                Ok(key_value) => match positions.get(&key_value) {
                    Some(&i) => groups[i].1.push(rec),
                    None => {
                        positions.insert(key_value.clone(), groups.len());
                        groups.push((key_value, vec![rec]));
                    }
                },
                Err(error) => report.rejected.push(RejectedRecord { position, error }),
            }
        }

        for (key_value, group) in groups {
            let shard_file = resource::shard_file_name(resource, &key_value);

            match self.write_group(resource, &shard_file, &group, deadline) {
                Ok(()) => report.written.push(WrittenShard {
                    key_value,
                    shard_file,
                }),
                Err(source) => {
                    log::warn!(
                        "shard write failed for {resource}/{shard_file}: {source}"
                    );
                    report.failed.push(FailedShard {
                        shard_file,
                        error: ShardPipeError::ShardWriteFailed {
                            key_value: key_value.clone(),
                            source: Box::new(source),
                        },
                        key_value,
                    });
                }
            }
        }

        Ok(report)
    }

    /// Write one group as a fresh shard file. Serialized against other
    /// writers of the same shard through the pair guard; the atomic
    /// replace-on-write discipline lives at the storage boundary.
    fn write_group(
        &self,
        resource: &str,
        shard_file: &str,
        group: &[&Record],
        deadline: Deadline,
    ) -> Result<()> {
        deadline.check("partition")?;
        let _guard = self.locks.acquire(resource, shard_file, self.lock_wait)?;

        let bytes = record::encode_records(group.iter().copied())?;

        deadline.check("partition")?;
        self.storage
            .write_file(&resource::shard_path(resource, shard_file), &bytes)
    }
}
