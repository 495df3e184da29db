// runtablesync/src/sync/logic.rs
use anyhow::{Context, Result};

use crate::config::{AppConfig, SyncConfig};
use crate::entities::{EntityClient, EntityRef, build_sample_sets, table_from_entities, to_tsv};
use crate::runs::{BASENAME_COLUMN, RunRecord, build_run_table, scan_bucket};
use crate::storage::BucketClient;
use crate::table::{RunTable, SAMPLE_ID_COLUMN, merge_tables};

const SAMPLE_ENTITY: &str = "sample";
const SAMPLE_SET_ENTITY: &str = "sample_set";
const FLOW_CELL_COLUMN: &str = "flow_cell_id";

/// Flow cell value of runs whose final summary was never found.
const UNKNOWN_FLOW_CELL: &str = "unknown";

/// Turns scanned run records and the stored table into the table to upload.
///
/// 1. Collapse the scan by run directory basename, keeping the earliest upload.
/// 2. Merge with the stored table by sample id.
/// 3. Collapse by flow cell, preferring rows that have a final summary.
/// 4. Put the sample id column first.
pub fn reconcile_tables(stored: Option<&RunTable>, records: &[RunRecord]) -> Result<RunTable> {
    let scanned = build_run_table(records);
    let mut new_table = scanned
        .collapse_by(BASENAME_COLUMN, &[BASENAME_COLUMN, "upload_date"])
        .context("Failed to collapse scanned runs by directory")?;
    new_table.drop_column(BASENAME_COLUMN);
    new_table.move_column_first(SAMPLE_ID_COLUMN)?;
    tracing::info!(
        scanned = scanned.len(),
        unique = new_table.len(),
        "Collapsed scanned runs by directory name"
    );

    let merged = merge_tables(stored, &new_table, SAMPLE_ID_COLUMN)
        .context("Failed to merge stored and scanned tables")?;
    tracing::info!(
        stored = stored.map_or(0, RunTable::len),
        merged = merged.len(),
        "Merged stored and scanned tables"
    );

    let mut final_table = merged
        .collapse_by_except(
            FLOW_CELL_COLUMN,
            &["final_summary", FLOW_CELL_COLUMN, "reference"],
            &[UNKNOWN_FLOW_CELL],
        )
        .context("Failed to collapse merged table by flow cell")?;
    final_table.move_column_first(SAMPLE_ID_COLUMN)?;
    Ok(final_table)
}

/// Fetches the stored sample table, scans the buckets, reconciles both and
/// prints or uploads the result.
pub async fn perform_sync_orchestration(app_config: &AppConfig) -> Result<()> {
    let sync_config = &app_config.sync;
    tracing::info!(
        namespace = %sync_config.namespace,
        workspace = %sync_config.workspace,
        project = sync_config.project.as_deref().unwrap_or("-"),
        buckets = sync_config.buckets.len(),
        dry_run = !sync_config.run,
        "Starting sample table sync"
    );

    let entity_client = EntityClient::new(&app_config.entity_api)
        .context("Failed to set up the entity API client")?;
    let user = entity_client
        .whoami()
        .await
        .context("Failed to identify the entity API caller")?;
    tracing::info!(%user, "Authenticated to the entity API");

    let stored_entities = entity_client
        .get_entities(&sync_config.namespace, &sync_config.workspace, SAMPLE_ENTITY)
        .await
        .with_context(|| {
            format!(
                "Failed to fetch {} entities from {}/{}",
                SAMPLE_ENTITY, sync_config.namespace, sync_config.workspace
            )
        })?;
    let stored = table_from_entities(&stored_entities, SAMPLE_ID_COLUMN);
    tracing::info!(rows = stored_entities.len(), "Fetched stored sample table");

    let bucket_client = BucketClient::connect(&app_config.storage).await;
    let mut records = Vec::new();
    for bucket in &sync_config.buckets {
        let found = scan_bucket(
            &bucket_client,
            bucket,
            &app_config.storage.listing_prefix,
            &app_config.basecall_models,
        )
        .await?;
        records.extend(found);
    }
    tracing::info!(runs = records.len(), "Scanned all buckets");

    let final_table = reconcile_tables(stored.as_ref(), &records)?;
    if final_table.is_empty() {
        tracing::warn!("No runs found and no stored samples, nothing to sync");
        return Ok(());
    }
    let payload = to_tsv(&final_table).context("Failed to encode sample table")?;

    if sync_config.run {
        entity_client
            .upload_entities(&sync_config.namespace, &sync_config.workspace, &payload)
            .await
            .context("Failed to upload sample table")?;
        tracing::info!(rows = final_table.len(), "Uploaded sample table");
    } else {
        println!("{}", payload);
        tracing::info!(rows = final_table.len(), "Dry run: sample table not uploaded (pass --run to upload)");
    }

    if let Some(column) = &sync_config.sample_set_column {
        sync_sample_sets(&entity_client, sync_config, &final_table, column).await?;
    }

    Ok(())
}

/// Replaces every sample set with one set per distinct value of `column`.
async fn sync_sample_sets(
    entity_client: &EntityClient,
    sync_config: &SyncConfig,
    table: &RunTable,
    column: &str,
) -> Result<()> {
    let payloads = build_sample_sets(table, column)
        .with_context(|| format!("Failed to group samples into sets by '{}'", column))?;
    let sets_tsv = to_tsv(&payloads.sets)?;
    let membership_tsv = to_tsv(&payloads.membership)?;

    if !sync_config.run {
        println!("{}", sets_tsv);
        println!("{}", membership_tsv);
        tracing::info!(
            sets = payloads.sets.len(),
            members = payloads.membership.len(),
            "Dry run: sample sets not uploaded"
        );
        return Ok(());
    }

    let (namespace, workspace) = (&sync_config.namespace, &sync_config.workspace);
    let existing = entity_client
        .get_entities(namespace, workspace, SAMPLE_SET_ENTITY)
        .await
        .context("Failed to fetch existing sample sets")?;
    let refs: Vec<EntityRef> = existing.iter().map(EntityRef::from).collect();
    entity_client
        .delete_entities(namespace, workspace, &refs)
        .await
        .context("Failed to delete existing sample sets")?;
    tracing::info!(deleted = refs.len(), "Deleted old sample sets");

    entity_client
        .upload_entities(namespace, workspace, &sets_tsv)
        .await
        .context("Failed to upload sample sets")?;
    tracing::info!(sets = payloads.sets.len(), "Uploaded sample sets");

    entity_client
        .upload_entities(namespace, workspace, &membership_tsv)
        .await
        .context("Failed to upload sample set members")?;
    tracing::info!(members = payloads.membership.len(), "Uploaded sample set members");
    Ok(())
}
