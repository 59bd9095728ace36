//! JSON records on top of the string key-value store.

use serde::Serialize;
use serde::de::DeserializeOwned;
use storage::repository::{KeyValueStore, StorageError};

/// Read and decode `key`. Records that no longer decode are logged and read
/// as absent, so one corrupt entry never blocks the rest of a scan.
pub(crate) async fn read_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            tracing::warn!(key, error = %err, "ignoring unreadable record");
            Ok(None)
        }
    }
}

pub(crate) async fn write_json<T: Serialize + Sync>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let encoded =
        serde_json::to_string(value).map_err(|err| StorageError::Serialization(err.to_string()))?;
    store.set(key, &encoded).await
}
