//! Resource layout and lifecycle.
//!
//! A resource is a named folder in the storage backend:
//!
//! ```text
//! <root>
//! |-- <resource>
//!     |-- .splitby                  split key, written once at creation
//!     |-- <resource>-<keyValue>     shard files (newline-delimited JSON)
//!     |-- <filename>.indexed        zero-byte index markers
//! ```

use crate::error::{Result, ShardPipeError};
use crate::record::{self, Record};
use crate::storage::{StorageBackend, MARKER_SUFFIX, SPLIT_KEY_FILE};

/// Deterministic shard file name for one split-key value.
pub fn shard_file_name(resource: &str, key_value: &str) -> String {
    format!("{resource}-{key_value}")
}

/// Storage path of a file inside a resource folder.
pub fn shard_path(resource: &str, filename: &str) -> String {
    format!("{resource}/{filename}")
}

/// Storage path of the index marker for a shard file.
pub fn marker_path(resource: &str, filename: &str) -> String {
    format!("{resource}/{filename}{MARKER_SUFFIX}")
}

/// Name of the search index built from a shard file.
pub fn index_name(resource: &str, filename: &str) -> String {
    format!("{resource}-{filename}")
}

/// Stable document identity for one shard-file line. Derivable, so
/// re-submitting the same line after a crashed build upserts instead of
/// duplicating.
pub fn doc_id(resource: &str, filename: &str, line_no: usize) -> String {
    format!("{resource}:{filename}:{line_no}")
}

fn split_key_path(resource: &str) -> String {
    format!("{resource}/{SPLIT_KEY_FILE}")
}

/// Create a resource folder and persist its split key. The split key is
/// immutable afterwards; there is no update operation.
pub fn create_resource(storage: &dyn StorageBackend, name: &str, split_key: &str) -> Result<()> {
    storage.create_folder(name)?;
    storage.write_file(&split_key_path(name), split_key.as_bytes())?;
    log::debug!("created resource '{name}' with split key '{split_key}'");
    Ok(())
}

/// Read back the split key persisted at resource creation.
pub fn resource_split_key(storage: &dyn StorageBackend, name: &str) -> Result<String> {
    if !storage.path_exists(&split_key_path(name))? {
        return Err(ShardPipeError::ResourceNotFound {
            name: name.to_string(),
        });
    }
    let bytes = storage.read_file(&split_key_path(name))?;
    String::from_utf8(bytes)
        .map_err(|e| ShardPipeError::Other(format!("split key for '{name}' is not UTF-8: {e}")))
}

/// List resources: folders under the root that carry a split-key file.
pub fn list_resources(storage: &dyn StorageBackend) -> Result<Vec<String>> {
    let mut resources = Vec::new();
    for name in storage.list_folder("")? {
        if storage.path_exists(&split_key_path(&name))? {
            resources.push(name);
        }
    }
    Ok(resources)
}

/// Recursively delete a resource folder and everything in it.
pub fn delete_resource(storage: &dyn StorageBackend, name: &str) -> Result<()> {
    if !storage.path_exists(name)? {
        return Err(ShardPipeError::ResourceNotFound {
            name: name.to_string(),
        });
    }
    storage.remove_path(name, true)?;
    log::debug!("deleted resource '{name}'");
    Ok(())
}

/// List the files in a resource folder, excluding dot-file metadata.
pub fn list_files(storage: &dyn StorageBackend, resource: &str) -> Result<Vec<String>> {
    if !storage.path_exists(resource)? {
        return Err(ShardPipeError::ResourceNotFound {
            name: resource.to_string(),
        });
    }
    let names = storage
        .list_folder(resource)?
        .into_iter()
        .filter(|n| !n.starts_with('.'))
        .collect();
    Ok(names)
}

/// Read a shard file back as decoded records.
pub fn read_shard(
    storage: &dyn StorageBackend,
    resource: &str,
    filename: &str,
) -> Result<Vec<Record>> {
    let path = shard_path(resource, filename);
    if !storage.path_exists(&path)? {
        return Err(ShardPipeError::ShardFileNotFound {
            resource: resource.to_string(),
            filename: filename.to_string(),
        });
    }
    let bytes = storage.read_file(&path)?;
    record::decode_records(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LocalStorage) {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        (tmp, storage)
    }

    #[test]
    fn test_create_and_read_split_key() {
        let (_tmp, storage) = setup();
        create_resource(&storage, "sales", "region").unwrap();
        assert_eq!(resource_split_key(&storage, "sales").unwrap(), "region");
    }

    #[test]
    fn test_missing_resource() {
        let (_tmp, storage) = setup();
        let err = resource_split_key(&storage, "sales").unwrap_err();
        assert!(matches!(err, ShardPipeError::ResourceNotFound { .. }));
    }

    #[test]
    fn test_list_resources_skips_plain_folders() {
        let (_tmp, storage) = setup();
        create_resource(&storage, "sales", "region").unwrap();
        create_resource(&storage, "orders", "country").unwrap();
        storage.create_folder("scratch").unwrap();

        let resources = list_resources(&storage).unwrap();
        assert_eq!(resources, vec!["orders".to_string(), "sales".to_string()]);
    }

    #[test]
    fn test_delete_resource() {
        let (_tmp, storage) = setup();
        create_resource(&storage, "sales", "region").unwrap();
        storage.write_file("sales/sales-east", b"{}\n").unwrap();

        delete_resource(&storage, "sales").unwrap();
        assert!(!storage.path_exists("sales").unwrap());

        let err = delete_resource(&storage, "sales").unwrap_err();
        assert!(matches!(err, ShardPipeError::ResourceNotFound { .. }));
    }

    #[test]
    fn test_list_files_hides_metadata() {
        let (_tmp, storage) = setup();
        create_resource(&storage, "sales", "region").unwrap();
        storage.write_file("sales/sales-east", b"{}\n").unwrap();
        storage.touch_marker("sales/sales-east.indexed").unwrap();

        let files = list_files(&storage, "sales").unwrap();
        assert_eq!(
            files,
            vec!["sales-east".to_string(), "sales-east.indexed".to_string()]
        );
    }

    #[test]
    fn test_read_shard_missing() {
        let (_tmp, storage) = setup();
        create_resource(&storage, "sales", "region").unwrap();
        let err = read_shard(&storage, "sales", "sales-east").unwrap_err();
        assert!(matches!(err, ShardPipeError::ShardFileNotFound { .. }));
    }

    #[test]
    fn test_naming() {
        assert_eq!(shard_file_name("sales", "east"), "sales-east");
        assert_eq!(shard_path("sales", "sales-east"), "sales/sales-east");
        assert_eq!(marker_path("sales", "sales-east"), "sales/sales-east.indexed");
        assert_eq!(index_name("sales", "sales-east"), "sales-sales-east");
        assert_eq!(doc_id("sales", "sales-east", 0), "sales:sales-east:0");
    }
}
