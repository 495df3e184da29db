// runtablesync/src/entities/sample_sets.rs
use std::collections::HashSet;

use crate::errors::{AppError, Result};
use crate::table::{RunTable, SAMPLE_ID_COLUMN, is_absent};

pub const SAMPLE_SET_ID_COLUMN: &str = "entity:sample_set_id";
pub const MEMBERSHIP_COLUMN: &str = "membership:sample_set_id";

/// The two uploads that rebuild the `sample_set` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSetPayloads {
    /// One row per distinct set.
    pub sets: RunTable,
    /// One row per distinct (set, sample) pair.
    pub membership: RunTable,
}

/// Groups samples into sets by the values of `group_column`.
///
/// Rows whose group value is absent belong to no set.
pub fn build_sample_sets(table: &RunTable, group_column: &str) -> Result<SampleSetPayloads> {
    let group_idx = table
        .column_index(group_column)
        .ok_or_else(|| AppError::MissingColumn(group_column.to_string()))?;
    let sample_idx = table
        .column_index(SAMPLE_ID_COLUMN)
        .ok_or_else(|| AppError::MissingColumn(SAMPLE_ID_COLUMN.to_string()))?;

    let mut sets = RunTable::new([SAMPLE_SET_ID_COLUMN]);
    let mut membership = RunTable::new([MEMBERSHIP_COLUMN, "sample"]);
    let mut seen_sets = HashSet::new();
    let mut seen_members = HashSet::new();

    for row in table.rows() {
        let group = &row[group_idx];
        let Some(set_id) = group.as_deref().filter(|_| !is_absent(group)) else {
            continue;
        };
        if seen_sets.insert(set_id) {
            sets.push_record([(SAMPLE_SET_ID_COLUMN, Some(set_id.to_string()))]);
        }
        let Some(sample) = row[sample_idx].as_deref() else {
            continue;
        };
        if seen_members.insert((set_id, sample)) {
            membership.push_record([
                (MEMBERSHIP_COLUMN, Some(set_id.to_string())),
                ("sample", Some(sample.to_string())),
            ]);
        }
    }

    Ok(SampleSetPayloads { sets, membership })
}
