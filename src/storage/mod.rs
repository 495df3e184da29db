// runtablesync/src/storage/mod.rs
pub(crate) mod client;
pub(crate) mod uri;

pub use client::{BucketClient, ObjectSummary};
pub use uri::{BucketUri, parse_bucket_uri};
