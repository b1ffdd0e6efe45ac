//! Audit trail recording and retention

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use wd_core::config::AuditConfig;
use wd_core::{Page, PageParams, WdResult};
use wd_db::AuditStore;
use wd_models::{AuditFilter, AuditLog};

#[derive(Clone)]
pub struct AuditService {
    store: Arc<dyn AuditStore>,
    config: AuditConfig,
}

impl AuditService {
    pub fn new(store: Arc<dyn AuditStore>, config: AuditConfig) -> Self {
        Self { store, config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Write an entry. A failed write is logged and otherwise ignored so the
    /// audited operation still succeeds.
    pub async fn record(&self, entry: AuditLog) {
        if !self.config.enabled {
            return;
        }
        if let Err(e) = self.store.insert(&entry).await {
            tracing::error!(
                action = %entry.action,
                resource = ?entry.resource,
                resource_id = ?entry.resource_id,
                error = %e,
                "Failed to write audit log"
            );
        }
    }

    pub async fn list(&self, filter: &AuditFilter, params: &PageParams) -> WdResult<Page<AuditLog>> {
        let (items, total) = self
            .store
            .list(filter, params.limit(), params.offset())
            .await?;
        Ok(Page::new(items, total, params))
    }

    /// Delete entries older than the retention window
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> WdResult<u64> {
        let cutoff = now - Duration::days(self.config.retention_days);
        let purged = self.store.purge_older_than(cutoff).await?;
        if purged > 0 {
            tracing::info!(purged, cutoff = %cutoff, "Purged expired audit logs");
        }
        Ok(purged)
    }
}
