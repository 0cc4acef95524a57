//! `ftpScan`: detect new files on a remote server and stage them.
//!
//! For every matching file the step waits for the size to settle, hashes
//! the content, consults the state store, copies the bytes to
//! `{rawPrefix}{fileId}.csv`, publishes one continuation message, and only
//! then marks the content processed. A crash between the copy and the mark
//! re-ingests the file on the next scan instead of losing it.

use super::{step_names, HandlerDependencies, StepContext, StepHandler};
use crate::cancellation::CancellationToken;
use crate::config::FtpDetectionSettings;
use crate::core::{payload_keys, FileId, PipelineEvent, StepOutcome};
use crate::definition::PipelineStep;
use crate::errors::StepError;
use crate::remote::{directory_path, join_path, FtpConnection, RemoteEntry, RemoteFileSource};
use crate::storage::{DedupDecision, DedupPolicy};
use crate::utils::wildcard_to_regex;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::time::Duration;
use tracing::{info, warn};

/// Effective scan settings for one step: step parameters over defaults.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Remote directory, normalised by [`directory_path`].
    pub directory: String,
    /// Compiled filename mask.
    pub mask: Regex,
    /// Maximum age; `None` disables the freshness filter.
    pub max_age: Option<chrono::Duration>,
    /// Delay between size checks; zero disables the stability check.
    pub stable_for: Duration,
    /// Duplicate handling.
    pub dedup: DedupPolicy,
}

impl ScanOptions {
    /// Reads `searchPath`, `byMask`, `NotOlderThanInSeconds` (or the legacy
    /// `NotOlderThenInSeconds`) and `stableForSeconds` from the step.
    ///
    /// Non-numeric values are logged and skipped; only an invalid mask fails.
    pub fn resolve(defaults: &FtpDetectionSettings, step: &PipelineStep) -> Result<Self, StepError> {
        let search_path = step
            .parameters
            .first_non_blank(&["searchPath"])
            .unwrap_or(&defaults.search_path);

        let mask_text = step
            .parameters
            .first_non_blank(&["byMask", "mask"])
            .unwrap_or(&defaults.mask);
        let mask = wildcard_to_regex(mask_text).map_err(|e| StepError::InvalidParameter {
            name: "byMask".to_string(),
            value: mask_text.to_string(),
            message: e.to_string(),
        })?;

        let max_age_seconds = numeric_parameter(
            step,
            &["NotOlderThanInSeconds", "NotOlderThenInSeconds"],
            defaults.not_older_than_seconds,
        );
        let stable_for_seconds =
            numeric_parameter(step, &["stableForSeconds"], defaults.stable_for_seconds);

        Ok(Self {
            directory: directory_path(search_path),
            mask,
            max_age: if max_age_seconds > 0 {
                chrono::Duration::try_seconds(max_age_seconds)
            } else {
                None
            },
            stable_for: Duration::from_secs(stable_for_seconds),
            dedup: defaults.deduplication.mode,
        })
    }

    /// Filters a listing down to ingestion candidates. A named target skips
    /// the freshness filter but must still match the mask.
    #[must_use]
    pub fn select(
        &self,
        entries: Vec<RemoteEntry>,
        target: Option<&str>,
        now: DateTime<Utc>,
    ) -> Vec<RemoteEntry> {
        let cutoff = self.max_age.and_then(|age| now.checked_sub_signed(age));
        entries
            .into_iter()
            .filter(|e| e.is_file && self.mask.is_match(&e.name))
            .filter(|e| match target {
                Some(name) => e.name.eq_ignore_ascii_case(name),
                None => cutoff.map_or(true, |cutoff| e.modified >= cutoff),
            })
            .collect()
    }
}

/// First of `keys` holding a parseable number, else `default`.
fn numeric_parameter<T>(step: &PipelineStep, keys: &[&str], default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    for key in keys {
        let Some(raw) = step.parameters.first_non_blank(&[*key]) else {
            continue;
        };
        match raw.trim().parse::<T>() {
            Ok(value) => return value,
            Err(e) => warn!(parameter = %key, value = raw, error = %e, "ignoring non-numeric step parameter"),
        }
    }
    default
}

struct ScanRun<'a> {
    ctx: &'a StepContext,
    event: &'a PipelineEvent,
    source: &'a dyn RemoteFileSource,
    options: &'a ScanOptions,
    targeted: bool,
}

enum FileDisposition {
    Published,
    Unstable,
    Duplicate,
}

/// Remote file ingestion.
pub struct FtpScanHandler {
    deps: HandlerDependencies,
}

impl FtpScanHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(deps: HandlerDependencies) -> Self {
        Self { deps }
    }

    async fn ingest(
        &self,
        run: &ScanRun<'_>,
        entry: &RemoteEntry,
        cancel: &CancellationToken,
    ) -> Result<FileDisposition, StepError> {
        let ScanRun {
            ctx,
            event,
            source,
            options,
            targeted,
        } = *run;
        let remote_path = join_path(&options.directory, &entry.name);
        info!(file = %entry.name, size = entry.size, modified = %entry.modified, "remote file found");

        if !options.stable_for.is_zero() {
            cancel.sleep(options.stable_for).await?;
            let size_now = cancel.guard(source.size(&remote_path)).await??;
            if size_now != entry.size {
                info!(file = %entry.name, before = entry.size, after = size_now, "file is still changing");
                return Ok(FileDisposition::Unstable);
            }
        }

        let content = cancel.guard(source.download(&remote_path)).await??;
        let file_id = FileId::from_content(&content);
        let already_processed = cancel.guard(self.deps.state.is_processed(&file_id)).await??;

        match options.dedup.decide(already_processed, targeted) {
            DedupDecision::Skip => {
                info!(file = %entry.name, %file_id, policy = %options.dedup, "file already processed; skipped");
                return Ok(FileDisposition::Duplicate);
            }
            DedupDecision::Reemit => {
                info!(file = %entry.name, %file_id, "duplicate content re-emitted for target");
            }
            DedupDecision::Ingest => {}
        }

        let raw_key = format!("{}{}.csv", self.deps.settings.storage_paths.raw_prefix, file_id);
        cancel.guard(self.deps.storage.put(&raw_key, content)).await??;

        let next = ctx.next_event(
            event,
            [
                (payload_keys::FILE_ID, file_id.to_string()),
                (payload_keys::S3_PATH, raw_key.clone()),
                (payload_keys::PATH, remote_path),
                (payload_keys::FILE_NAME, entry.name.clone()),
                (payload_keys::IS_DUPLICATE, already_processed.to_string()),
            ],
        );
        cancel.guard(self.deps.bus.publish(next)).await??;

        if !already_processed {
            cancel.guard(self.deps.state.mark_processed(&file_id)).await??;
        }

        info!(file = %entry.name, s3_path = %raw_key, duplicate = already_processed, "file ingested");
        Ok(FileDisposition::Published)
    }
}

#[async_trait]
impl StepHandler for FtpScanHandler {
    fn step_name(&self) -> &str {
        step_names::FTP_SCAN
    }

    fn enabled(&self) -> bool {
        self.deps.settings.is_handler_enabled(self.step_name())
    }

    async fn handle(
        &self,
        ctx: &StepContext,
        event: &PipelineEvent,
        cancel: &CancellationToken,
    ) -> Result<StepOutcome, StepError> {
        let options = ScanOptions::resolve(&self.deps.settings.ftp_detection, &ctx.step)?;
        let connection = FtpConnection::resolve(&self.deps.settings.ftp_connection, &ctx.step);
        info!(host = %connection.host, port = connection.port, directory = %options.directory, "remote scan started");

        let source = cancel.guard(self.deps.connector.connect(&connection)).await??;
        let listing = cancel.guard(source.list(&options.directory)).await??;

        let target = event.get_non_blank(payload_keys::FILE_NAME);
        let candidates = options.select(listing, target, Utc::now());
        info!(matched = candidates.len(), target = target.unwrap_or("-"), "remote files matched");

        if candidates.is_empty() {
            return Ok(StepOutcome::skip("no matching files"));
        }

        let run = ScanRun {
            ctx,
            event,
            source: source.as_ref(),
            options: &options,
            targeted: target.is_some(),
        };
        let mut published = 0;
        for entry in &candidates {
            cancel.check()?;
            match self.ingest(&run, entry, cancel).await {
                Ok(FileDisposition::Published) => published += 1,
                Ok(FileDisposition::Unstable | FileDisposition::Duplicate) => {}
                Err(StepError::Cancelled(c)) => return Err(c.into()),
                Err(e) => warn!(file = %entry.name, error = %e, "file ingestion failed"),
            }
        }

        if published == 0 {
            Ok(StepOutcome::skip("no files ingested"))
        } else {
            Ok(StepOutcome::Published { count: published })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Topic;
    use pretty_assertions::assert_eq;

    fn entry(name: &str, age_seconds: i64, now: DateTime<Utc>) -> RemoteEntry {
        RemoteEntry {
            name: name.to_string(),
            size: 10,
            modified: now - chrono::Duration::seconds(age_seconds),
            is_file: true,
        }
    }

    fn step() -> PipelineStep {
        PipelineStep::new(Topic::new("orders.scan").unwrap(), "ftpScan")
    }

    #[test]
    fn test_defaults_apply_without_parameters() {
        let options = ScanOptions::resolve(&FtpDetectionSettings::default(), &step()).unwrap();
        assert_eq!(options.directory, "");
        assert!(options.mask.is_match("a.CSV"));
        assert_eq!(options.max_age, Some(chrono::Duration::seconds(3600)));
        assert!(options.stable_for.is_zero());
        assert_eq!(options.dedup, DedupPolicy::Skip);
    }

    #[test]
    fn test_step_parameters_override() {
        let step = step()
            .with_parameter("searchPath", "/incoming")
            .with_parameter("byMask", "orders_*.txt")
            .with_parameter("NotOlderThenInSeconds", "0")
            .with_parameter("stableForSeconds", "5");
        let options = ScanOptions::resolve(&FtpDetectionSettings::default(), &step).unwrap();
        assert_eq!(options.directory, "incoming/");
        assert!(options.mask.is_match("orders_1.txt"));
        assert!(!options.mask.is_match("orders_1.csv"));
        assert_eq!(options.max_age, None);
        assert_eq!(options.stable_for, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_number_falls_back_to_default() {
        let step = step()
            .with_parameter("NotOlderThanInSeconds", "soon")
            .with_parameter("stableForSeconds", "a while");
        let options = ScanOptions::resolve(&FtpDetectionSettings::default(), &step).unwrap();
        assert_eq!(options.max_age, Some(chrono::Duration::seconds(3600)));
        assert!(options.stable_for.is_zero());
    }

    #[test]
    fn test_invalid_number_falls_through_to_legacy_key() {
        let step = step()
            .with_parameter("NotOlderThanInSeconds", "soon")
            .with_parameter("NotOlderThenInSeconds", " 120 ");
        let options = ScanOptions::resolve(&FtpDetectionSettings::default(), &step).unwrap();
        assert_eq!(options.max_age, Some(chrono::Duration::seconds(120)));
    }

    #[test]
    fn test_select_applies_mask_and_freshness() {
        let now = Utc::now();
        let options = ScanOptions::resolve(&FtpDetectionSettings::default(), &step()).unwrap();
        let mut directory = entry("archive", 10, now);
        directory.is_file = false;

        let selected = options.select(
            vec![
                entry("fresh.csv", 60, now),
                entry("stale.csv", 7200, now),
                entry("notes.txt", 60, now),
                directory,
            ],
            None,
            now,
        );
        let names: Vec<_> = selected.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["fresh.csv"]);
    }

    #[test]
    fn test_select_target_bypasses_freshness_only() {
        let now = Utc::now();
        let options = ScanOptions::resolve(&FtpDetectionSettings::default(), &step()).unwrap();
        let entries = vec![
            entry("fresh.csv", 60, now),
            entry("stale.csv", 7200, now),
            entry("stale.txt", 7200, now),
        ];

        let selected = options.select(entries.clone(), Some("STALE.csv"), now);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "stale.csv");

        assert!(options.select(entries, Some("stale.txt"), now).is_empty());
    }
}
