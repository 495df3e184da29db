// runtablesync/src/entities/mod.rs
pub(crate) mod client;
pub(crate) mod sample_sets;
pub(crate) mod tsv;

pub use client::{EntityClient, EntityRef};
pub use sample_sets::build_sample_sets;
pub use tsv::{table_from_entities, to_tsv};
