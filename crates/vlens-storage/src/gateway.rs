//! Persistence gateway: primary store first, local store as fallback.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{info, warn};
use vlens_models::{AnalyzedVideo, VideoId, VideoRecord};

use crate::error::{StorageError, StorageResult};
use crate::metrics::{record_fallback, record_primary_health};
use crate::store::{OriginalFile, VideoStore};

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// How long a health probe result is trusted
    pub health_ttl: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            health_ttl: Duration::from_secs(30),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            health_ttl: std::env::var("PRIMARY_HEALTH_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.health_ttl),
        }
    }
}

/// Cached availability of the primary store.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreHealth {
    pub last_checked: Option<Instant>,
    pub is_healthy: bool,
}

impl StoreHealth {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.last_checked.is_some_and(|at| at.elapsed() < ttl)
    }
}

/// Which store accepted a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreLocation {
    Primary,
    Local,
}

impl StoreLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreLocation::Primary => "primary",
            StoreLocation::Local => "local",
        }
    }
}

/// Result of a successful save.
#[derive(Debug, Clone)]
pub struct SaveReceipt {
    pub record: VideoRecord,
    pub location: StoreLocation,
}

/// Per-store outcome of a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteReport {
    pub primary: bool,
    pub local: bool,
}

impl DeleteReport {
    pub fn any(&self) -> bool {
        self.primary || self.local
    }
}

/// Routes persistence between the primary and local stores.
pub struct PersistenceGateway {
    primary: Arc<dyn VideoStore>,
    local: Arc<dyn VideoStore>,
    health: RwLock<StoreHealth>,
    config: GatewayConfig,
}

impl PersistenceGateway {
    pub fn new(primary: Arc<dyn VideoStore>, local: Arc<dyn VideoStore>, config: GatewayConfig) -> Self {
        Self {
            primary,
            local,
            health: RwLock::new(StoreHealth::default()),
            config,
        }
    }

    /// Snapshot of the cached health state.
    pub async fn health(&self) -> StoreHealth {
        *self.health.read().await
    }

    /// Whether the primary store is believed available, probing when the
    /// cached result is stale.
    pub async fn primary_healthy(&self) -> bool {
        {
            let health = self.health.read().await;
            if health.is_fresh(self.config.health_ttl) {
                return health.is_healthy;
            }
        }

        let mut health = self.health.write().await;
        // Another caller may have probed while we waited for the lock.
        if health.is_fresh(self.config.health_ttl) {
            return health.is_healthy;
        }

        let healthy = match self.primary.health().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Primary store health probe failed: {}", e);
                false
            }
        };
        *health = StoreHealth {
            last_checked: Some(Instant::now()),
            is_healthy: healthy,
        };
        record_primary_health(healthy);
        healthy
    }

    async fn mark_unhealthy(&self, operation: &str, error: &StorageError) {
        warn!(operation, "Primary store failed, falling back to local store: {}", error);
        *self.health.write().await = StoreHealth {
            last_checked: Some(Instant::now()),
            is_healthy: false,
        };
        record_primary_health(false);
        record_fallback(operation);
    }

    /// Persist a video, preferring the primary store.
    ///
    /// Only a local-store failure is returned as an error.
    pub async fn save(
        &self,
        video: &AnalyzedVideo,
        original: Option<&OriginalFile>,
    ) -> StorageResult<SaveReceipt> {
        if self.primary_healthy().await {
            match self.primary.save(video, original, None).await {
                Ok(record) => {
                    if let Err(e) = self.local.save(video, original, Some(&record.id)).await {
                        warn!(video_id = %record.id, "Local backup write failed: {}", e);
                    }
                    return Ok(SaveReceipt {
                        record,
                        location: StoreLocation::Primary,
                    });
                }
                Err(e) => self.mark_unhealthy("save", &e).await,
            }
        } else {
            record_fallback("save");
        }

        let record = self
            .local
            .save(video, original, None)
            .await
            .map_err(|e| match e {
                StorageError::Local(_) => e,
                other => StorageError::local(other.to_string()),
            })?;
        info!(video_id = %record.id, "Saved video to local store only");
        Ok(SaveReceipt {
            record,
            location: StoreLocation::Local,
        })
    }

    /// Primary records first, then local records the primary does not know.
    async fn merged<F, Fut>(&self, operation: &str, fetch: F) -> StorageResult<Vec<VideoRecord>>
    where
        F: Fn(Arc<dyn VideoStore>) -> Fut,
        Fut: std::future::Future<Output = StorageResult<Vec<VideoRecord>>>,
    {
        let mut records = Vec::new();
        if self.primary_healthy().await {
            match fetch(self.primary.clone()).await {
                Ok(primary) => records = primary,
                Err(e) => self.mark_unhealthy(operation, &e).await,
            }
        } else {
            record_fallback(operation);
        }

        let local = match fetch(self.local.clone()).await {
            Ok(local) => local,
            Err(e) if !records.is_empty() => {
                warn!(operation, "Local store read failed: {}", e);
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let known: HashSet<VideoId> = records.iter().map(|r| r.id.clone()).collect();
        records.extend(local.into_iter().filter(|r| !known.contains(&r.id)));
        Ok(records)
    }

    pub async fn get_all(&self) -> StorageResult<Vec<VideoRecord>> {
        self.merged("list", |store| async move { store.list().await }).await
    }

    pub async fn search(&self, query: &str) -> StorageResult<Vec<VideoRecord>> {
        let query = query.to_string();
        self.merged("search", |store| {
            let query = query.clone();
            async move { store.search(&query).await }
        })
        .await
    }

    pub async fn get_by_id(&self, id: &VideoId) -> StorageResult<Option<VideoRecord>> {
        if self.primary_healthy().await {
            match self.primary.get(id).await {
                Ok(Some(record)) => return Ok(Some(record)),
                Ok(None) => {}
                Err(e) => self.mark_unhealthy("get", &e).await,
            }
        } else {
            record_fallback("get");
        }
        self.local.get(id).await
    }

    /// Best-effort delete from both stores independently.
    ///
    /// The primary is attempted regardless of cached health.
    pub async fn delete(&self, id: &VideoId) -> DeleteReport {
        let primary = match self.primary.delete(id).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(video_id = %id, "Primary delete failed: {}", e);
                self.mark_unhealthy("delete", &e).await;
                false
            }
        };

        let local = match self.local.delete(id).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(video_id = %id, "Local delete failed: {}", e);
                false
            }
        };

        DeleteReport { primary, local }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::{LocalStoreConfig, LocalVideoStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use vlens_models::{AnalysisData, FrameAnalysis};

    /// In-memory primary that can be switched off.
    #[derive(Default)]
    struct FakePrimary {
        down: AtomicBool,
        fail_saves: AtomicBool,
        probes: AtomicUsize,
        records: Mutex<Vec<VideoRecord>>,
    }

    impl FakePrimary {
        fn check(&self) -> StorageResult<()> {
            if self.down.load(Ordering::SeqCst) {
                Err(StorageError::primary_unavailable("connection refused"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl VideoStore for FakePrimary {
        fn name(&self) -> &'static str {
            "fake-primary"
        }

        async fn health(&self) -> StorageResult<()> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.check()
        }

        async fn save(
            &self,
            video: &AnalyzedVideo,
            _original: Option<&OriginalFile>,
            _id: Option<&VideoId>,
        ) -> StorageResult<VideoRecord> {
            self.check()?;
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(StorageError::from_http_status(500, "write failed"));
            }
            let record = VideoRecord::new(VideoId::new(), None, video.clone());
            self.records.lock().unwrap().push(record.clone());
            Ok(record)
        }

        async fn list(&self) -> StorageResult<Vec<VideoRecord>> {
            self.check()?;
            Ok(self.records.lock().unwrap().clone())
        }

        async fn get(&self, id: &VideoId) -> StorageResult<Option<VideoRecord>> {
            self.check()?;
            Ok(self.records.lock().unwrap().iter().find(|r| &r.id == id).cloned())
        }

        async fn search(&self, query: &str) -> StorageResult<Vec<VideoRecord>> {
            self.check()?;
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.video.matches(query))
                .cloned()
                .collect())
        }

        async fn delete(&self, id: &VideoId) -> StorageResult<bool> {
            self.check()?;
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|r| &r.id != id);
            Ok(records.len() != before)
        }
    }

    fn video(name: &str) -> AnalyzedVideo {
        AnalyzedVideo::new(
            name,
            AnalysisData {
                summary: format!("summary of {}", name),
                frame_analyses: vec![FrameAnalysis {
                    frame_index: 0,
                    timestamp: None,
                    description: "d".to_string(),
                }],
            },
            &[],
            Vec::new(),
        )
    }

    fn gateway(primary: Arc<FakePrimary>, dir: &tempfile::TempDir) -> PersistenceGateway {
        let local = Arc::new(LocalVideoStore::new(LocalStoreConfig {
            data_dir: dir.path().to_path_buf(),
        }));
        PersistenceGateway::new(primary, local, GatewayConfig::default())
    }

    #[tokio::test]
    async fn test_primary_down_saves_locally_and_lists_from_local() {
        let dir = tempfile::tempdir().unwrap();
        let primary = Arc::new(FakePrimary::default());
        primary.down.store(true, Ordering::SeqCst);
        let gateway = gateway(primary.clone(), &dir);

        let receipt = gateway.save(&video("offline.mp4"), None).await.unwrap();
        assert_eq!(receipt.location, StoreLocation::Local);
        assert!(primary.records.lock().unwrap().is_empty());

        let all = gateway.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, receipt.record.id);
        assert_eq!(all[0].name(), "offline.mp4");
    }

    #[tokio::test]
    async fn test_primary_save_writes_local_backup() {
        let dir = tempfile::tempdir().unwrap();
        let primary = Arc::new(FakePrimary::default());
        let gateway = gateway(primary.clone(), &dir);

        let receipt = gateway.save(&video("online.mp4"), None).await.unwrap();
        assert_eq!(receipt.location, StoreLocation::Primary);
        assert!(dir
            .path()
            .join(format!("videos/{}.json", receipt.record.id))
            .exists());

        // The backup shares the primary ID, so listings do not duplicate it.
        assert_eq!(gateway.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_primary_write_failure_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let primary = Arc::new(FakePrimary::default());
        primary.fail_saves.store(true, Ordering::SeqCst);
        let gateway = gateway(primary.clone(), &dir);

        let receipt = gateway.save(&video("flaky.mp4"), None).await.unwrap();
        assert_eq!(receipt.location, StoreLocation::Local);
        assert!(!gateway.health().await.is_healthy);

        let fetched = gateway.get_by_id(&receipt.record.id).await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn test_local_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // A plain file where the data directory should be.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let primary = Arc::new(FakePrimary::default());
        primary.down.store(true, Ordering::SeqCst);
        let local = Arc::new(LocalVideoStore::new(LocalStoreConfig { data_dir: blocker }));
        let gateway = PersistenceGateway::new(primary, local, GatewayConfig::default());

        let err = gateway.save(&video("nowhere.mp4"), None).await.unwrap_err();
        assert!(matches!(err, StorageError::Local(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_probe_cached_for_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let primary = Arc::new(FakePrimary::default());
        let gateway = gateway(primary.clone(), &dir);

        assert!(gateway.primary_healthy().await);
        primary.down.store(true, Ordering::SeqCst);
        assert!(gateway.primary_healthy().await, "cached result still trusted");
        assert_eq!(primary.probes.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(!gateway.primary_healthy().await);
        assert_eq!(primary.probes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_merged_search_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let primary = Arc::new(FakePrimary::default());
        let gateway = gateway(primary.clone(), &dir);

        let online = gateway.save(&video("cats.mp4"), None).await.unwrap();
        primary.down.store(true, Ordering::SeqCst);
        gateway.mark_unhealthy("test", &StorageError::primary_unavailable("x")).await;
        let offline = gateway.save(&video("dogs.mp4"), None).await.unwrap();

        let hits = gateway.search("DOGS").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, offline.record.id);

        let report = gateway.delete(&online.record.id).await;
        assert!(!report.primary);
        assert!(report.local, "backup copy removed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_reaches_primary_while_marked_unhealthy() {
        let dir = tempfile::tempdir().unwrap();
        let primary = Arc::new(FakePrimary::default());
        let gateway = gateway(primary.clone(), &dir);

        let saved = gateway.save(&video("cats.mp4"), None).await.unwrap();
        assert_eq!(saved.location, StoreLocation::Primary);

        // A transient failure elsewhere leaves the primary flagged as down.
        gateway
            .mark_unhealthy("list", &StorageError::primary_unavailable("timeout"))
            .await;

        let report = gateway.delete(&saved.record.id).await;
        assert_eq!(report, DeleteReport { primary: true, local: true });
        assert!(primary.records.lock().unwrap().is_empty());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(gateway.primary_healthy().await);
        assert!(gateway.get_all().await.unwrap().is_empty());
        assert!(gateway.get_by_id(&saved.record.id).await.unwrap().is_none());
    }
}
