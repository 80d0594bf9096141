//! # Reconciliation Sweep
//!
//! Bounds the windows where the metadata store and the blob store disagree:
//! blobs without a row (a failed compensating delete, a crash mid-upload) are
//! removed once older than a grace period; rows without a blob (a crash
//! mid-delete) are reported and optionally pruned.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::backend::BlobStore;
use super::errors::{StorageError, StorageResult};
use super::metadata::MetadataStore;
use super::object::ObjectSummary;

/// Default age before an unreferenced blob counts as orphaned
pub const DEFAULT_GRACE: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Unreferenced blobs younger than this may belong to an in-flight upload
    pub grace: Duration,

    /// Delete rows whose blob is missing instead of only reporting them
    pub prune_dangling: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            grace: DEFAULT_GRACE,
            prune_dangling: false,
        }
    }
}

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub orphaned_blobs_removed: Vec<String>,
    pub dangling_objects: Vec<ObjectSummary>,
    pub dangling_pruned: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.orphaned_blobs_removed.is_empty() && self.dangling_objects.is_empty()
    }
}

pub struct Reconciler {
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
}

impl Reconciler {
    pub fn new(metadata: Arc<dyn MetadataStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { metadata, blobs }
    }

    /// Run one sweep
    pub async fn run(&self, options: &ReconcileOptions) -> StorageResult<ReconcileReport> {
        // Rows first: a blob written after this snapshot is protected by the grace period
        let objects = self.metadata.list_all().await?;
        let blobs = self.blobs.list().await?;

        let referenced: HashSet<&str> = objects.iter().map(|o| o.blob_key.as_str()).collect();
        let present: HashSet<&str> = blobs.iter().map(|b| b.key.as_str()).collect();

        let grace = chrono::Duration::from_std(options.grace)
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        let cutoff = Utc::now() - grace;

        let mut report = ReconcileReport::default();

        for blob in blobs.iter().filter(|b| !referenced.contains(b.key.as_str())) {
            if blob.last_modified > cutoff {
                continue;
            }
            match self.blobs.delete(&blob.key).await {
                Ok(()) | Err(StorageError::NotFound(_)) => {
                    info!(blob_key = %blob.key, size = blob.size, "orphaned blob removed");
                    report.orphaned_blobs_removed.push(blob.key.clone());
                }
                Err(e) => warn!(blob_key = %blob.key, error = %e, "failed to remove orphaned blob"),
            }
        }

        for object in objects.iter().filter(|o| !present.contains(o.blob_key.as_str())) {
            // A delete may have raced the listing; confirm before flagging
            if self.blobs.exists(&object.blob_key).await? {
                continue;
            }
            warn!(
                id = object.id,
                filename = %object.filename,
                owner = %object.owner,
                blob_key = %object.blob_key,
                "metadata row has no blob"
            );
            report.dangling_objects.push(ObjectSummary::from(object));

            if options.prune_dangling {
                self.metadata.delete_with_grants(object.id).await?;
                report.dangling_pruned += 1;
            }
        }

        info!(
            orphaned = report.orphaned_blobs_removed.len(),
            dangling = report.dangling_objects.len(),
            pruned = report.dangling_pruned,
            "reconcile finished"
        );
        Ok(report)
    }

    /// Sweep every `period` until the task is aborted
    pub fn spawn_periodic(
        self,
        period: Duration,
        options: ReconcileOptions,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.run(&options).await {
                    warn!(error = %e, "reconcile sweep failed");
                }
            }
        })
    }
}
