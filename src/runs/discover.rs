// runtablesync/src/runs/discover.rs
use std::collections::BTreeMap;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;

use super::record::{RunRecord, format_upload_date};
use super::summary::{BasecallModels, FinalSummary};
use crate::storage::{BucketClient, BucketUri, ObjectSummary};

static FINAL_SUMMARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/final_summary.*\.txt").expect("static regex"));
static SEQUENCING_SUMMARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/sequencing_summary.*\.txt").expect("static regex"));

fn dirname(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Groups a bucket listing into run directories.
///
/// A run directory is the grandparent of every passing `.fast5` file
/// (`<run>/fast5_pass/x.fast5`); files with `fail` anywhere in their key are
/// ignored, as is the listing root `inputs` itself. Each directory maps to the
/// latest creation time among its files.
pub fn discover_run_directories(
    objects: &[ObjectSummary],
) -> BTreeMap<String, Option<DateTime<Utc>>> {
    let mut runs: BTreeMap<String, Option<DateTime<Utc>>> = BTreeMap::new();
    for object in objects {
        if !object.key.ends_with(".fast5") || object.key.contains("fail") {
            continue;
        }
        let run_dir = dirname(dirname(&object.key));
        if run_dir.is_empty() || run_dir == "inputs" {
            continue;
        }
        let seen = runs.entry(run_dir.to_string()).or_insert(None);
        if object.created > *seen {
            *seen = object.created;
        }
    }
    runs
}

/// Locations of the summary files found inside one run directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryFiles {
    pub final_summary: Option<String>,
    pub sequencing_summary: Option<String>,
}

pub fn find_summary_files(objects: &[ObjectSummary]) -> SummaryFiles {
    let mut files = SummaryFiles::default();
    for object in objects {
        if files.final_summary.is_none() && FINAL_SUMMARY_RE.is_match(&object.key) {
            files.final_summary = Some(object.key.clone());
        }
        if files.sequencing_summary.is_none() && SEQUENCING_SUMMARY_RE.is_match(&object.key) {
            files.sequencing_summary = Some(object.key.clone());
        }
    }
    files
}

/// Assembles a run record from what was found in the bucket.
pub fn derive_run_record(
    bucket: &BucketUri,
    run_dir: &str,
    created: Option<DateTime<Utc>>,
    files: &SummaryFiles,
    summary: &FinalSummary,
    models: &BasecallModels,
) -> RunRecord {
    let locate = |key: &Option<String>| {
        key.as_deref()
            .map(|k| bucket.object_path(k))
            .unwrap_or_else(|| "unknown".to_string())
    };
    let protocol = summary.get("protocol");

    RunRecord {
        fast5_dir: bucket.object_path(run_dir),
        final_summary: locate(&files.final_summary),
        sequencing_summary: locate(&files.sequencing_summary),
        instrument: summary.get("instrument").to_string(),
        position: summary.get("position").to_string(),
        protocol_group_id: summary.get("protocol_group_id").to_string(),
        flow_cell_id: summary.get("flow_cell_id").to_string(),
        protocol: protocol.to_string(),
        upload_date: format_upload_date(created),
        sample_name: summary.get("sample_id").to_string(),
        basecalling_model: models.model_for_protocol(protocol),
    }
}

/// Scans one bucket and returns a record per run directory found under
/// `listing_prefix`.
pub async fn scan_bucket(
    client: &BucketClient,
    bucket: &BucketUri,
    listing_prefix: &str,
    models: &BasecallModels,
) -> Result<Vec<RunRecord>> {
    tracing::info!(bucket = %bucket, prefix = listing_prefix, "Scanning bucket for runs");

    let listing = client
        .list_objects(&bucket.bucket, listing_prefix)
        .await
        .with_context(|| format!("Failed to scan {}", bucket))?;
    let runs = discover_run_directories(&listing);
    tracing::info!(bucket = %bucket, runs = runs.len(), "Found run directories");

    let mut records = Vec::with_capacity(runs.len());
    for (run_dir, created) in runs {
        let objects = client
            .list_objects(&bucket.bucket, &format!("{}/", run_dir))
            .await
            .with_context(|| format!("Failed to list run directory {}", bucket.object_path(&run_dir)))?;
        let files = find_summary_files(&objects);

        let summary = match &files.final_summary {
            Some(key) => {
                let text = client
                    .download_text(&bucket.bucket, key)
                    .await
                    .with_context(|| format!("Failed to read {}", bucket.object_path(key)))?;
                FinalSummary::parse(&text)
            }
            None => {
                tracing::warn!(run = %bucket.object_path(&run_dir), "No final summary found");
                FinalSummary::default()
            }
        };

        let record = derive_run_record(bucket, &run_dir, created, &files, &summary, models);
        tracing::debug!(run = %record.fast5_dir, flow_cell = %record.flow_cell_id, "Derived run record");
        records.push(record);
    }
    Ok(records)
}
