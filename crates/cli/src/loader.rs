//! Snapshot discovery and parallel loading.
//!
//! Reading is the only parallel stage of the whole pipeline: up to
//! `parallelism` snapshots are read and parsed concurrently, and the caller
//! merges each one into the graph strictly serially as the tasks finish.

use anyhow::Context;
use cadaver::AssemblyBinary;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use walkdir::WalkDir;

/// Finds every `*.json` assembly snapshot under `root`, sorted for a stable
/// merge order (the graph does not need it, but logs read better).
pub fn find_snapshots(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|s| s.to_str()) == Some("json")
        {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Spawns one bounded read-and-parse task per snapshot. The returned set
/// yields `(path, binary)` pairs in completion order.
pub fn spawn_loads(
    files: Vec<PathBuf>,
    parallelism: usize,
) -> JoinSet<anyhow::Result<(PathBuf, AssemblyBinary)>> {
    let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
    let mut set = JoinSet::new();

    for path in files {
        let semaphore = semaphore.clone();
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let mut binary: AssemblyBinary = serde_json::from_slice(&bytes)
                .with_context(|| format!("parsing {}", path.display()))?;
            if binary.path.is_none() {
                let canonical = dunce::canonicalize(&path).unwrap_or_else(|_| path.clone());
                binary.path = Some(canonical.display().to_string());
            }
            Ok((path, binary))
        });
    }
    set
}
