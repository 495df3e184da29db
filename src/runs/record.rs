// runtablesync/src/runs/record.rs
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};

use crate::table::{RunTable, SAMPLE_ID_COLUMN};

/// Column holding the run directory's last path component. It only exists
/// until the scanned table has been collapsed by it.
pub const BASENAME_COLUMN: &str = "fast5_dir_basename";

/// Header of a freshly scanned run table, identifier first.
pub const RUN_TABLE_COLUMNS: &[&str] = &[
    SAMPLE_ID_COLUMN,
    "fast5_dir",
    "final_summary",
    "sequencing_summary",
    "instrument",
    "position",
    "protocol_group_id",
    "flow_cell_id",
    "protocol",
    "upload_date",
    "sample_name",
    "basecalling_model",
    "barcode_kit",
    "notes",
    BASENAME_COLUMN,
];

/// Metadata describing one sequencing run directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    /// `gs://bucket/path/to/run`
    pub fast5_dir: String,
    pub final_summary: String,
    pub sequencing_summary: String,
    pub instrument: String,
    pub position: String,
    pub protocol_group_id: String,
    pub flow_cell_id: String,
    pub protocol: String,
    pub upload_date: String,
    pub sample_name: String,
    pub basecalling_model: String,
}

impl RunRecord {
    /// Stable identifier derived from the run directory path.
    pub fn sample_id(&self) -> String {
        sample_id_for_path(&self.fast5_dir)
    }

    pub fn basename(&self) -> &str {
        self.fast5_dir
            .rsplit_once('/')
            .map(|(_, base)| base)
            .unwrap_or(&self.fast5_dir)
    }

    fn cells(&self) -> [String; 15] {
        [
            self.sample_id(),
            self.fast5_dir.clone(),
            self.final_summary.clone(),
            self.sequencing_summary.clone(),
            self.instrument.clone(),
            self.position.clone(),
            self.protocol_group_id.clone(),
            self.flow_cell_id.clone(),
            self.protocol.clone(),
            self.upload_date.clone(),
            self.sample_name.clone(),
            self.basecalling_model.clone(),
            "NA".to_string(),
            "none".to_string(),
            self.basename().to_string(),
        ]
    }
}

/// Lowercase hex MD5 of a run directory path.
pub fn sample_id_for_path(path: &str) -> String {
    hex::encode(Md5::digest(path.as_bytes()))
}

/// Renders an object creation time the way stored tables already carry it,
/// e.g. `2021-05-17 14:03:22.123000+00:00`.
pub fn format_upload_date(created: Option<DateTime<Utc>>) -> String {
    match created {
        Some(t) if t.timestamp_subsec_nanos() == 0 => t.format("%Y-%m-%d %H:%M:%S%:z").to_string(),
        Some(t) => t.format("%Y-%m-%d %H:%M:%S%.6f%:z").to_string(),
        None => "unknown".to_string(),
    }
}

/// Builds the scanned run table from records, one row per record.
pub fn build_run_table(records: &[RunRecord]) -> RunTable {
    let mut table = RunTable::new(RUN_TABLE_COLUMNS.iter().copied());
    for record in records {
        table.push_record(
            RUN_TABLE_COLUMNS
                .iter()
                .zip(record.cells())
                .map(|(column, value)| (*column, Some(value))),
        );
    }
    table
}
