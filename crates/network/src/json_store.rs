//! Whole-file JSON persistence.
//!
//! Files are rewritten in full on every save through a sibling temp file
//! and a rename, so a crash mid-write leaves the previous version intact.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::NodeError;

/// Read `path`, falling back to `T::default()` when the file is missing or
/// unreadable. Corrupt files are logged, not fatal.
pub async fn load_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to read JSON store");
            return T::default();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Corrupt JSON store, starting empty");
            T::default()
        }
    }
}

/// Serialize `value` and replace `path` with it.
pub async fn save<T>(path: &Path, value: &T) -> Result<(), NodeError>
where
    T: Serialize + ?Sized,
{
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let body = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, body).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
