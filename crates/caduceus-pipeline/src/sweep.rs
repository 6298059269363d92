//! Background maintenance: expiry sweeps for mappings, cache, and windows.

use caduceus_gateway::CostRouter;
use caduceus_ratelimit::RateLimiter;
use caduceus_redaction::MappingStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a running maintenance task.
#[derive(Debug)]
pub struct MaintenanceTask {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl MaintenanceTask {
    /// Stop the task and wait for it to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
        tracing::info!("maintenance task stopped");
    }

    /// Whether the task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Spawn the periodic maintenance sweep.
///
/// Each tick purges expired mapping sets, expired cache entries, and
/// stale rate windows. Deletions are idempotent and hold per-key locks
/// only momentarily, so the sweep is safe to run concurrently with
/// request handling.
#[must_use]
pub fn spawn_maintenance(
    mapping_store: Arc<MappingStore>,
    router: Arc<CostRouter>,
    limiter: Arc<RateLimiter>,
    interval: Duration,
) -> MaintenanceTask {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so a fresh pipeline
        // doesn't sweep before anything can expire.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = ticker.tick() => {
                    let now = Utc::now();
                    let mappings = mapping_store.purge_expired_at(now).await;
                    let cache_entries = router.cache().sweep_at(now).await;
                    let windows = limiter.purge_stale_at(now).await;

                    if mappings + cache_entries + windows > 0 {
                        tracing::info!(
                            mappings,
                            cache_entries,
                            windows,
                            "maintenance sweep purged expired state"
                        );
                    } else {
                        tracing::debug!("maintenance sweep found nothing to purge");
                    }
                }
            }
        }
    });

    MaintenanceTask { handle, cancel }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caduceus_core::{EntityKind, OwnerKey, PipelineConfig};
    use caduceus_gateway::{CompletionRequest, ModelBackend, ModelCompletion};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    struct NullBackend;

    #[async_trait]
    impl ModelBackend for NullBackend {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> caduceus_gateway::Result<ModelCompletion> {
            Ok(ModelCompletion {
                text: String::new(),
                model: request.model,
                input_tokens: 0,
                output_tokens: 0,
            })
        }

        fn backend_id(&self) -> &str {
            "null"
        }
    }

    #[tokio::test]
    async fn test_sweep_purges_expired_mappings() {
        let mapping_store = Arc::new(MappingStore::with_retention_hours(24));
        let router = Arc::new(CostRouter::new(
            Arc::new(NullBackend),
            &PipelineConfig::default(),
        ));
        let limiter = Arc::new(RateLimiter::new(
            PipelineConfig::default().limits,
        ));

        let owner = OwnerKey::new("alice", "s1").expect("valid owner key");
        let old = Utc::now() - ChronoDuration::hours(25);
        mapping_store
            .reserve_at(&owner, EntityKind::Person, "John Smith", old)
            .await
            .expect("reserve");

        let task = spawn_maintenance(
            mapping_store.clone(),
            router,
            limiter,
            Duration::from_millis(20),
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(mapping_store.is_empty().await);

        task.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_task() {
        let task = spawn_maintenance(
            Arc::new(MappingStore::with_retention_hours(24)),
            Arc::new(CostRouter::new(
                Arc::new(NullBackend),
                &PipelineConfig::default(),
            )),
            Arc::new(RateLimiter::new(PipelineConfig::default().limits)),
            Duration::from_secs(3600),
        );

        assert!(task.is_running());
        task.shutdown().await;
    }
}
