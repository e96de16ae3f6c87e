//! Filesystem store used as the fallback and backup.
//!
//! Layout under the data directory:
//! - `videos/<id>.json`: one record per file
//! - `originals/<id>_<name>`: the uploaded source

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use vlens_models::{AnalyzedVideo, VideoId, VideoRecord};

use crate::error::{StorageError, StorageResult};
use crate::store::{OriginalFile, VideoStore};

/// Configuration for the local store.
#[derive(Debug, Clone)]
pub struct LocalStoreConfig {
    pub data_dir: PathBuf,
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl LocalStoreConfig {
    pub fn from_env() -> Self {
        Self {
            data_dir: std::env::var("LOCAL_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| Self::default().data_dir),
        }
    }
}

/// Only IDs made of these characters ever touch the filesystem.
fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Strip directory components and awkward characters from a file name.
fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "original".to_string()
    } else {
        cleaned
    }
}

fn local_err(context: &str, e: impl std::fmt::Display) -> StorageError {
    StorageError::local(format!("{}: {}", context, e))
}

/// Filesystem-backed store.
pub struct LocalVideoStore {
    config: LocalStoreConfig,
}

impl LocalVideoStore {
    pub fn new(config: LocalStoreConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(LocalStoreConfig::from_env())
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    fn videos_dir(&self) -> PathBuf {
        self.config.data_dir.join("videos")
    }

    fn originals_dir(&self) -> PathBuf {
        self.config.data_dir.join("originals")
    }

    fn record_path(&self, id: &VideoId) -> Option<PathBuf> {
        is_safe_id(id.as_str()).then(|| self.videos_dir().join(format!("{}.json", id)))
    }

    async fn ensure_dirs(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(self.videos_dir())
            .await
            .map_err(|e| local_err("create videos dir", e))?;
        tokio::fs::create_dir_all(self.originals_dir())
            .await
            .map_err(|e| local_err("create originals dir", e))?;
        Ok(())
    }

    async fn read_record(path: &Path) -> StorageResult<VideoRecord> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| local_err("read record", e))?;
        serde_json::from_slice(&bytes).map_err(|e| local_err("parse record", e))
    }

    async fn read_all(&self) -> StorageResult<Vec<VideoRecord>> {
        let mut entries = match tokio::fs::read_dir(self.videos_dir()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(local_err("list records", e)),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| local_err("list records", e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_record(&path).await {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), "Skipping unreadable record: {}", e),
            }
        }

        records.sort_by(|a, b| b.video.created_at.cmp(&a.video.created_at));
        Ok(records)
    }
}

#[async_trait]
impl VideoStore for LocalVideoStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn health(&self) -> StorageResult<()> {
        self.ensure_dirs().await
    }

    async fn save(
        &self,
        video: &AnalyzedVideo,
        original: Option<&OriginalFile>,
        id: Option<&VideoId>,
    ) -> StorageResult<VideoRecord> {
        self.ensure_dirs().await?;

        let id = id.cloned().unwrap_or_default();
        let record_path = self
            .record_path(&id)
            .ok_or_else(|| StorageError::local(format!("unsafe video id: {}", id)))?;

        let file_path = match original {
            Some(original) => {
                let target = self
                    .originals_dir()
                    .join(format!("{}_{}", id, sanitize_file_name(&original.name)));
                if original.path != target {
                    tokio::fs::copy(&original.path, &target)
                        .await
                        .map_err(|e| local_err("copy original", e))?;
                }
                Some(target.to_string_lossy().into_owned())
            }
            None => None,
        };

        let record = VideoRecord::new(id, file_path, video.clone());
        let json = serde_json::to_vec_pretty(&record)?;

        // Write-then-rename so readers never see a partial record.
        let tmp = record_path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| local_err("write record", e))?;
        tokio::fs::rename(&tmp, &record_path)
            .await
            .map_err(|e| local_err("commit record", e))?;

        info!(video_id = %record.id, path = %record_path.display(), "Saved video to local store");
        Ok(record)
    }

    async fn list(&self) -> StorageResult<Vec<VideoRecord>> {
        self.read_all().await
    }

    async fn get(&self, id: &VideoId) -> StorageResult<Option<VideoRecord>> {
        let Some(path) = self.record_path(id) else {
            return Ok(None);
        };
        match tokio::fs::metadata(&path).await {
            Ok(_) => Self::read_record(&path).await.map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(local_err("stat record", e)),
        }
    }

    async fn search(&self, query: &str) -> StorageResult<Vec<VideoRecord>> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .filter(|r| r.video.matches(query))
            .collect())
    }

    async fn delete(&self, id: &VideoId) -> StorageResult<bool> {
        let Some(path) = self.record_path(id) else {
            return Ok(false);
        };

        let removed = match tokio::fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(local_err("delete record", e)),
        };

        let prefix = format!("{}_", id);
        if let Ok(mut entries) = tokio::fs::read_dir(self.originals_dir()).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                if entry.file_name().to_string_lossy().starts_with(&prefix) {
                    if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                        warn!(path = %entry.path().display(), "Failed to delete original: {}", e);
                    }
                }
            }
        }

        debug!(video_id = %id, removed, "Deleted video from local store");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vlens_models::{AnalysisData, FrameAnalysis};

    fn video(name: &str, summary: &str) -> AnalyzedVideo {
        AnalyzedVideo::new(
            name,
            AnalysisData {
                summary: summary.to_string(),
                frame_analyses: vec![FrameAnalysis {
                    frame_index: 0,
                    timestamp: Some(0.0),
                    description: "frame".to_string(),
                }],
            },
            &[],
            Vec::new(),
        )
    }

    fn store(dir: &tempfile::TempDir) -> LocalVideoStore {
        LocalVideoStore::new(LocalStoreConfig {
            data_dir: dir.path().to_path_buf(),
        })
    }

    #[tokio::test]
    async fn test_save_get_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let source = dir.path().join("upload.bin");
        tokio::fs::write(&source, b"video bytes").await.unwrap();
        let original = OriginalFile::new("../evil/My Clip.mp4", &source);

        let record = store
            .save(&video("My Clip.mp4", "a dog runs"), Some(&original), None)
            .await
            .unwrap();

        let file_path = PathBuf::from(record.file_path.clone().unwrap());
        assert!(file_path.starts_with(dir.path().join("originals")));
        assert!(file_path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("_My_Clip.mp4"));
        assert_eq!(tokio::fs::read(&file_path).await.unwrap(), b"video bytes");

        let fetched = store.get(&record.id).await.unwrap().unwrap();
        assert_eq!(fetched, record);
        assert_eq!(store.list().await.unwrap().len(), 1);

        assert!(store.delete(&record.id).await.unwrap());
        assert!(!file_path.exists());
        assert!(store.get(&record.id).await.unwrap().is_none());
        assert!(!store.delete(&record.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_save_reuses_given_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let id = VideoId::from("primary-42");

        let record = store.save(&video("a.mp4", "x"), None, Some(&id)).await.unwrap();
        assert_eq!(record.id, id);
        assert!(dir.path().join("videos/primary-42.json").exists());
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.save(&video("Beach.mp4", "waves at sunset"), None, None).await.unwrap();
        store.save(&video("city.mp4", "traffic"), None, None).await.unwrap();

        assert_eq!(store.search("SUNSET").await.unwrap().len(), 1);
        assert_eq!(store.search("beach").await.unwrap().len(), 1);
        assert_eq!(store.search("").await.unwrap().len(), 2);
        assert!(store.search("mountain").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsafe_ids_never_touch_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        assert!(store.get(&VideoId::from("../../etc/passwd")).await.unwrap().is_none());
        assert!(!store.delete(&VideoId::from("a/b")).await.unwrap());
        assert!(store
            .save(&video("a.mp4", "x"), None, Some(&VideoId::from("../x")))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_list_skips_corrupt_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.save(&video("ok.mp4", "fine"), None, None).await.unwrap();
        tokio::fs::write(dir.path().join("videos/bad.json"), b"{not json")
            .await
            .unwrap();

        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_store_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVideoStore::new(LocalStoreConfig {
            data_dir: dir.path().join("never-created"),
        });
        assert!(store.list().await.unwrap().is_empty());
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_file_name("/tmp/a b.mov"), "a_b.mov");
        assert_eq!(sanitize_file_name(".."), "original");
    }
}
