//! The store seam shared by the primary and local backends.

use async_trait::async_trait;
use std::path::PathBuf;
use vlens_models::{AnalyzedVideo, VideoId, VideoRecord};

use crate::error::StorageResult;

/// The uploaded source file kept alongside a record.
#[derive(Debug, Clone)]
pub struct OriginalFile {
    /// File name as submitted
    pub name: String,
    /// Where the bytes currently live
    pub path: PathBuf,
}

impl OriginalFile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// A store of analyzed videos.
///
/// Both backends expose the same logical record schema.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Succeeds when the store can serve requests.
    async fn health(&self) -> StorageResult<()>;

    /// Persist a video and, when given, its original file.
    ///
    /// `id` asks the store to reuse an existing identifier; stores that
    /// assign their own may ignore it.
    async fn save(
        &self,
        video: &AnalyzedVideo,
        original: Option<&OriginalFile>,
        id: Option<&VideoId>,
    ) -> StorageResult<VideoRecord>;

    async fn list(&self) -> StorageResult<Vec<VideoRecord>>;

    async fn get(&self, id: &VideoId) -> StorageResult<Option<VideoRecord>>;

    /// Case-insensitive match on name and summary.
    async fn search(&self, query: &str) -> StorageResult<Vec<VideoRecord>>;

    /// Returns whether anything was removed.
    async fn delete(&self, id: &VideoId) -> StorageResult<bool>;
}
