mod disk;

pub use disk::DiskStore;

use crate::media::{MediaKind, SourceFile};
use anyhow::{Context, Result};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// A revocable reference to locally materialized bytes
///
/// Not `Clone`: releasing consumes the handle, so it can only be released once.
#[derive(Debug, PartialEq, Eq)]
pub struct ResourceHandle {
    id: u64,
    path: PathBuf,
}

impl ResourceHandle {
    pub fn new(id: u64, path: PathBuf) -> Self {
        Self { id, path }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Displayable/downloadable URI for this resource
    pub fn uri(&self) -> String {
        reqwest::Url::from_file_path(&self.path)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| self.path.display().to_string())
    }
}

/// Trait for places that can hold result bytes
pub trait ResourceStore {
    /// Persist `bytes` and hand back a handle to them
    fn materialize(&mut self, bytes: &[u8], extension: &str) -> Result<ResourceHandle>;

    /// Give the resource back; the handle is gone afterwards
    fn release(&mut self, handle: ResourceHandle);
}

/// A successful removal, ready to display or download
#[derive(Debug)]
pub struct ProcessedResult {
    kind: MediaKind,
    handle: ResourceHandle,
    size: usize,
    content_type: Option<String>,
    dimensions: Option<(u32, u32)>,
}

impl ProcessedResult {
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    pub fn uri(&self) -> String {
        self.handle.uri()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Pixel size for image results whose header could be decoded
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    /// File extension matching the result's content
    pub fn extension(&self) -> &'static str {
        extension_for(self.kind, self.content_type.as_deref())
    }
}

/// Pick a file extension from the media kind and response content type
pub fn extension_for(kind: MediaKind, content_type: Option<&str>) -> &'static str {
    let content_type = content_type.unwrap_or("");
    match kind {
        MediaKind::Image if content_type.contains("jpeg") => "jpg",
        MediaKind::Image if content_type.contains("webp") => "webp",
        MediaKind::Image => "png",
        MediaKind::Video if content_type.contains("quicktime") => "mov",
        MediaKind::Video if content_type.contains("webm") => "webm",
        MediaKind::Video => "mp4",
    }
}

fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Owns the current result and the original-file preview
///
/// Every replacement releases the previous handle first; dropping the
/// lifecycle releases whatever it still holds.
pub struct ResultLifecycle {
    store: Box<dyn ResourceStore>,
    current: Option<ProcessedResult>,
    preview: Option<ResourceHandle>,
}

impl ResultLifecycle {
    pub fn new(store: Box<dyn ResourceStore>) -> Self {
        Self {
            store,
            current: None,
            preview: None,
        }
    }

    pub fn current(&self) -> Option<&ProcessedResult> {
        self.current.as_ref()
    }

    /// Materialize a response body as the new current result
    pub fn install(
        &mut self,
        kind: MediaKind,
        content_type: Option<String>,
        body: &[u8],
    ) -> Result<&ProcessedResult> {
        self.clear();

        let extension = extension_for(kind, content_type.as_deref());
        let handle = self
            .store
            .materialize(body, extension)
            .with_context(|| format!("Failed to store {kind} result"))?;

        let dimensions = match kind {
            MediaKind::Image => probe_dimensions(body),
            MediaKind::Video => None,
        };

        tracing::info!(
            "Installed {} result {} ({} bytes)",
            kind,
            handle.path().display(),
            body.len()
        );

        Ok(&*self.current.insert(ProcessedResult {
            kind,
            handle,
            size: body.len(),
            content_type,
            dimensions,
        }))
    }

    /// Release the current result, if any
    pub fn clear(&mut self) {
        if let Some(previous) = self.current.take() {
            tracing::debug!("Releasing result {}", previous.handle.path().display());
            self.store.release(previous.handle);
        }
    }

    /// Preview handle for the original input, materialized once per selection
    pub fn preview(&mut self, file: &SourceFile) -> Result<&ResourceHandle> {
        let handle = match self.preview.take() {
            Some(handle) => handle,
            None => {
                let extension = file.extension().unwrap_or_else(|| "bin".to_string());
                self.store
                    .materialize(file.bytes(), &extension)
                    .with_context(|| format!("Failed to create preview for {}", file.name()))?
            }
        };
        Ok(&*self.preview.insert(handle))
    }

    pub fn clear_preview(&mut self) {
        if let Some(handle) = self.preview.take() {
            self.store.release(handle);
        }
    }

    /// Copy the current result to `dest`
    pub fn save_to(&self, dest: &Path) -> Result<u64> {
        let result = self
            .current
            .as_ref()
            .context("No result available to save")?;
        let written = std::fs::copy(result.handle.path(), dest)
            .with_context(|| format!("Failed to save result to {}", dest.display()))?;
        tracing::info!("Saved {} result to {}", result.kind, dest.display());
        Ok(written)
    }
}

impl Drop for ResultLifecycle {
    fn drop(&mut self) {
        self.clear();
        self.clear_preview();
    }
}
