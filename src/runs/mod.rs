// runtablesync/src/runs/mod.rs
pub(crate) mod discover;
pub(crate) mod record;
pub(crate) mod summary;

pub use discover::scan_bucket;
pub use record::{BASENAME_COLUMN, RunRecord, build_run_table};
pub use summary::BasecallModels;
