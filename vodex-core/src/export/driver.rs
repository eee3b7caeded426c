use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::library::MediaLibrary;
use crate::store::ObjectStore;
use crate::transcoder::{ConversionJob, TranscodeService};

use super::diff::missing_formats;
use super::error::{ExportError, ExportResult};
use super::key::{is_duplicate, Catalog};
use super::materialize::get_or_create_source;
use super::migrate::{migrate_legacy, LEGACY_TARGET_FORMAT};

/// Outcome of one reconciliation run: how many ids were dispatched (or
/// counted, under dry-run) and which ids ended in error, sorted.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RunReport {
    pub converted: usize,
    pub errored: Vec<String>,
}

/// Top-level reconciliation driver. Scans the converted store, diffs it
/// against the library's id list, and turns each missing (id, format) pair
/// into a transcode job — one id fully processed before the next, failures
/// isolated per id.
pub struct Exporter {
    converted: Arc<dyn ObjectStore>,
    unconverted: Arc<dyn ObjectStore>,
    library: Arc<dyn MediaLibrary>,
    transcoder: Arc<dyn TranscodeService>,
    downloadable: BTreeSet<String>,
}

impl Exporter {
    pub fn new(
        converted: Arc<dyn ObjectStore>,
        unconverted: Arc<dyn ObjectStore>,
        library: Arc<dyn MediaLibrary>,
        transcoder: Arc<dyn TranscodeService>,
        downloadable: BTreeSet<String>,
    ) -> Self {
        Self {
            converted,
            unconverted,
            library,
            transcoder,
            downloadable,
        }
    }

    /// Compute the missing-formats map without acting on it.
    pub async fn missing(&self) -> ExportResult<BTreeMap<String, BTreeSet<String>>> {
        let catalog = Catalog::scan(self.converted.as_ref()).await?;
        let ids = self.library.list_video_ids().await?;
        Ok(missing_formats(&ids, &catalog, &self.downloadable))
    }

    /// Full run: scan, diff, reconcile. `max_videos` bounds the number of
    /// successful dispatches; `dry_run` counts would-be work without
    /// fetching, uploading, migrating, or submitting anything.
    pub async fn convert_missing(
        &self,
        max_videos: usize,
        dry_run: bool,
    ) -> ExportResult<RunReport> {
        info!("searching for videos missing from the converted store");
        let catalog = Catalog::scan(self.converted.as_ref()).await?;
        let ids = self.library.list_video_ids().await?;
        let missing = missing_formats(&ids, &catalog, &self.downloadable);
        self.reconcile(&missing, &catalog.legacy, max_videos, dry_run)
            .await
    }

    pub async fn reconcile(
        &self,
        missing: &BTreeMap<String, BTreeSet<String>>,
        legacy: &HashSet<String>,
        max_videos: usize,
        dry_run: bool,
    ) -> ExportResult<RunReport> {
        let mut report = RunReport::default();
        for (content_id, missing_set) in missing {
            if report.converted >= max_videos {
                info!("stopping: max videos reached");
                break;
            }
            if is_duplicate(content_id) {
                info!(%content_id, "skipping id carrying the duplicate marker");
                continue;
            }

            let mut formats_to_create = missing_set.clone();
            if legacy.contains(content_id) && formats_to_create.contains(LEGACY_TARGET_FORMAT) {
                if dry_run {
                    info!(%content_id, "dry-run: skipping copy of legacy content");
                } else {
                    match migrate_legacy(self.converted.as_ref(), content_id).await {
                        Ok(copied) => {
                            info!(%content_id, copied, "legacy content copied to canonical naming");
                        }
                        Err(err @ ExportError::MigrationInvariant { .. }) => return Err(err),
                        Err(err) => {
                            warn!(%content_id, error = %err, "legacy migration failed; skipping");
                            report.errored.push(content_id.clone());
                            continue;
                        }
                    }
                }
                // migrated legacy content satisfies the mp4 requirement
                formats_to_create.remove(LEGACY_TARGET_FORMAT);
            }

            if formats_to_create.is_empty() {
                continue;
            }

            info!(
                %content_id,
                formats = %join_formats(&formats_to_create),
                "starting conversion"
            );

            if dry_run {
                info!(%content_id, "dry-run: skipping fetch and job submission");
                report.converted += 1;
                continue;
            }

            let source_url = match get_or_create_source(
                self.unconverted.as_ref(),
                self.library.as_ref(),
                content_id,
            )
            .await
            {
                Ok(Some(url)) => url,
                Ok(None) => {
                    warn!(%content_id, "no source object materialized; skipping");
                    report.errored.push(content_id.clone());
                    continue;
                }
                Err(err) => {
                    warn!(%content_id, error = %err, "source materialization failed; skipping");
                    report.errored.push(content_id.clone());
                    continue;
                }
            };

            let job = ConversionJob {
                content_id: content_id.clone(),
                input: source_url,
                formats: formats_to_create,
            };
            match self.transcoder.submit(&job).await {
                Ok(()) => report.converted += 1,
                Err(err) => {
                    warn!(%content_id, error = %err, "job submission failed; skipping");
                    report.errored.push(content_id.clone());
                }
            }
        }
        report.errored.sort();
        Ok(report)
    }
}

fn join_formats(formats: &BTreeSet<String>) -> String {
    formats
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
