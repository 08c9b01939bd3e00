use crate::error::{Result, ShardPipeError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A single document returned from a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub category: String,
    pub source: serde_json::Value,
}

/// Result of an unfiltered query against one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub total: usize,
    pub hits: Vec<SearchHit>,
}

/// The search port: an externally-owned collection of indexes, one document
/// per shard-file line.
///
/// `create_index` is idempotent — an existing index is not an error and its
/// contents are left alone. `delete_index` treats an absent index as a
/// no-op. `index_document` upserts by `doc_id`, which is what makes
/// re-submission after a crashed build safe.
pub trait SearchBackend: Send + Sync {
    fn create_index(&self, name: &str) -> Result<()>;

    fn delete_index(&self, name: &str) -> Result<()>;

    fn index_document(
        &self,
        index: &str,
        category: &str,
        doc_id: &str,
        doc: &serde_json::Value,
    ) -> Result<()>;

    fn search(&self, index: &str, category: &str) -> Result<QueryResult>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDoc {
    id: String,
    category: String,
    source: serde_json::Value,
}

/// In-process search backend for tests and embedded runs.
///
/// Preserves submission order and upserts in place, so repeated builds of the
/// same shard return equal query results. Counts every `index_document` call
/// so callers can observe whether a build pass actually ran.
#[derive(Default)]
pub struct MemorySearch {
    indexes: Mutex<HashMap<String, Vec<StoredDoc>>>,
    submissions: AtomicUsize,
}

impl MemorySearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total `index_document` calls accepted since construction.
    pub fn document_submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn index_exists(&self, name: &str) -> bool {
        self.indexes.lock().unwrap().contains_key(name)
    }
}

impl SearchBackend for MemorySearch {
    fn create_index(&self, name: &str) -> Result<()> {
        self.indexes
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    fn delete_index(&self, name: &str) -> Result<()> {
        self.indexes.lock().unwrap().remove(name);
        Ok(())
    }

    fn index_document(
        &self,
        index: &str,
        category: &str,
        doc_id: &str,
        doc: &serde_json::Value,
    ) -> Result<()> {
        let mut indexes = self.indexes.lock().unwrap();
        let docs = indexes
            .get_mut(index)
            .ok_or_else(|| ShardPipeError::SearchBackendUnavailable {
                operation: "index_document".to_string(),
                reason: format!("index '{index}' does not exist"),
            })?;

        self.submissions.fetch_add(1, Ordering::SeqCst);

        match docs.iter_mut().find(|d| d.id == doc_id) {
            Some(existing) => {
                existing.category = category.to_string();
                existing.source = doc.clone();
            }
            None => docs.push(StoredDoc {
                id: doc_id.to_string(),
                category: category.to_string(),
                source: doc.clone(),
            }),
        }
        Ok(())
    }

    fn search(&self, index: &str, category: &str) -> Result<QueryResult> {
        let indexes = self.indexes.lock().unwrap();
        let docs = indexes
            .get(index)
            .ok_or_else(|| ShardPipeError::SearchBackendUnavailable {
                operation: "search".to_string(),
                reason: format!("index '{index}' does not exist"),
            })?;

        let hits: Vec<SearchHit> = docs
            .iter()
            .filter(|d| d.category == category)
            .map(|d| SearchHit {
                id: d.id.clone(),
                category: d.category.clone(),
                source: d.source.clone(),
            })
            .collect();

        Ok(QueryResult {
            total: hits.len(),
            hits,
        })
    }
}

/// File-backed search backend: each index lives as one JSON document file
/// under a dedicated directory. Survives process restarts, which keeps it
/// consistent with markers persisted in storage.
///
/// One flat file per index is plenty at shard-file scale; a real deployment
/// points the pipeline at an actual search engine instead.
pub struct FileSearch {
    dir: std::path::PathBuf,
}

impl FileSearch {
    pub fn new(dir: impl Into<std::path::PathBuf>) -> Self {
        FileSearch { dir: dir.into() }
    }

    fn index_file(&self, name: &str) -> std::path::PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    fn load(&self, name: &str, operation: &str) -> Result<Vec<StoredDoc>> {
        let path = self.index_file(name);
        if !path.exists() {
            return Err(ShardPipeError::SearchBackendUnavailable {
                operation: operation.to_string(),
                reason: format!("index '{name}' does not exist"),
            });
        }
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn store(&self, name: &str, docs: &[StoredDoc]) -> Result<()> {
        use std::io::Write;

        std::fs::create_dir_all(&self.dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer(&mut tmp, docs)?;
        tmp.flush()?;
        tmp.persist(self.index_file(name)).map_err(|e| e.error)?;
        Ok(())
    }
}

impl SearchBackend for FileSearch {
    fn create_index(&self, name: &str) -> Result<()> {
        if !self.index_file(name).exists() {
            self.store(name, &[])?;
        }
        Ok(())
    }

    fn delete_index(&self, name: &str) -> Result<()> {
        let path = self.index_file(name);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn index_document(
        &self,
        index: &str,
        category: &str,
        doc_id: &str,
        doc: &serde_json::Value,
    ) -> Result<()> {
        let mut docs = self.load(index, "index_document")?;
        match docs.iter_mut().find(|d| d.id == doc_id) {
            Some(existing) => {
                existing.category = category.to_string();
                existing.source = doc.clone();
            }
            None => docs.push(StoredDoc {
                id: doc_id.to_string(),
                category: category.to_string(),
                source: doc.clone(),
            }),
        }
        self.store(index, &docs)
    }

    fn search(&self, index: &str, category: &str) -> Result<QueryResult> {
        let docs = self.load(index, "search")?;
        let hits: Vec<SearchHit> = docs
            .into_iter()
            .filter(|d| d.category == category)
            .map(|d| SearchHit {
                id: d.id,
                category: d.category,
                source: d.source,
            })
            .collect();

        Ok(QueryResult {
            total: hits.len(),
            hits,
        })
    }
}
