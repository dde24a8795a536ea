//! JSON file helpers shared by the entry store and the stats ledger

use crate::error::{CacheError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use tokio::fs;

const TEMP_SUFFIX: &str = ".tmp";

/// Read and parse a JSON file
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)
        .await
        .map_err(|e| CacheError::io(path, e))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Write a value as pretty-printed JSON, replacing the target atomically.
///
/// The bytes go to a sibling temp file which is then renamed over `path`,
/// so a concurrent reader sees either the old or the new document.
pub(crate) async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(
        ".{}.{}{}",
        file_name,
        uuid::Uuid::new_v4(),
        TEMP_SUFFIX
    ));

    if let Err(e) = fs::write(&tmp_path, content.as_bytes()).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(CacheError::io(&tmp_path, e));
    }

    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(CacheError::io(path, e));
    }

    Ok(())
}

/// True for the hidden temp files `write_json_atomic` stages its writes in
pub(crate) fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.') && n.ends_with(TEMP_SUFFIX))
}
