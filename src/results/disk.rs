use super::{ResourceHandle, ResourceStore};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Stores each resource as a file inside a working directory
///
/// Releasing a handle deletes its file.
pub struct DiskStore {
    dir: PathBuf,
    next_id: u64,
    live: HashSet<u64>,
}

impl DiskStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create work directory {}", dir.display()))?;

        tracing::debug!("Resource store at {}", dir.display());

        Ok(Self {
            dir,
            next_id: 0,
            live: HashSet::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of handles materialized and not yet released
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

impl ResourceStore for DiskStore {
    fn materialize(&mut self, bytes: &[u8], extension: &str) -> Result<ResourceHandle> {
        self.next_id += 1;
        let id = self.next_id;
        // Process id keeps concurrent CLI runs sharing a work dir apart
        let path = self
            .dir
            .join(format!("resource-{}-{}.{}", std::process::id(), id, extension));

        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        self.live.insert(id);
        Ok(ResourceHandle::new(id, path))
    }

    fn release(&mut self, handle: ResourceHandle) {
        self.live.remove(&handle.id());
        if let Err(e) = std::fs::remove_file(handle.path()) {
            tracing::warn!("Failed to remove {}: {}", handle.path().display(), e);
        }
    }
}
