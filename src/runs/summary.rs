// runtablesync/src/runs/summary.rs
use std::collections::{BTreeMap, HashMap};

/// Attributes read from a run's `final_summary*.txt`, with defaults for the
/// ones the run table always carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalSummary {
    fields: BTreeMap<String, String>,
}

const UNKNOWN: &str = "unknown";

/// Keys present in every summary even when the file lacks them.
const DEFAULT_KEYS: &[&str] = &[
    "instrument",        // instrument=MC-110675
    "position",          // position=MC-110675_0
    "protocol_group_id", // protocol_group_id=coi2_17may2021
    "flow_cell_id",      // flow_cell_id=FAO99587
    "sample_id",         // sample_id=no_sample
    "protocol",          // protocol=sequencing/sequencing_MIN106_DNA:FLO-MIN106:SQK-LSK109
    "basecalling_enabled",
];

impl Default for FinalSummary {
    fn default() -> Self {
        Self {
            fields: DEFAULT_KEYS
                .iter()
                .map(|k| (k.to_string(), UNKNOWN.to_string()))
                .collect(),
        }
    }
}

impl FinalSummary {
    /// Parses `key=value` lines. Lines without `=` are skipped and empty
    /// values never override a default.
    pub fn parse(text: &str) -> Self {
        let mut summary = Self::default();
        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim_end_matches('\r');
            if !value.is_empty() {
                summary.fields.insert(key.to_string(), value.to_string());
            }
        }
        summary
    }

    /// Value for `key`, or `"unknown"`.
    pub fn get(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or(UNKNOWN)
    }
}

/// Flow cell → kit → basecaller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasecallModels {
    table: HashMap<String, HashMap<String, String>>,
}

impl Default for BasecallModels {
    fn default() -> Self {
        let mut models = Self {
            table: HashMap::new(),
        };
        for (flow_cell, kit, model) in [
            ("FLO-MIN106", "SQK-LSK109", "dna_r9.4.1_450bps_sup.cfg"),
            ("FLO-MIN111", "SQK-LSK109", "dna_r9.4.1_450bps_sup.cfg"),
            ("FLO-MIN111", "SQK-LSK110", "dna_r10.3_450bps_sup.cfg"),
            ("FLO-MIN112", "SQK-LSK112", "dna_r10.4_e8.1_sup.cfg"),
            ("FLO-PRO002", "SQK-LSK109", "dna_r9.4.1_450bps_sup_prom.cfg"),
        ] {
            models.insert(flow_cell, kit, model);
        }
        models
    }
}

impl BasecallModels {
    pub fn insert(&mut self, flow_cell: &str, kit: &str, model: &str) {
        self.table
            .entry(flow_cell.to_string())
            .or_default()
            .insert(kit.to_string(), model.to_string());
    }

    /// Adds or replaces entries, e.g. from `config.json`.
    pub fn extend(&mut self, overrides: &HashMap<String, HashMap<String, String>>) {
        for (flow_cell, kits) in overrides {
            for (kit, model) in kits {
                self.insert(flow_cell, kit, model);
            }
        }
    }

    pub fn lookup(&self, flow_cell: &str, kit: &str) -> Option<&str> {
        self.table.get(flow_cell)?.get(kit).map(String::as_str)
    }

    /// Basecaller configuration for a protocol string such as
    /// `sequencing/sequencing_MIN106_DNA:FLO-MIN106:SQK-LSK109`.
    ///
    /// Protocols that do not split into instrument, flow cell and kit yield an
    /// empty model; so does a flow cell/kit pair missing from the table.
    pub fn model_for_protocol(&self, protocol: &str) -> String {
        let stripped = protocol.replace("sequencing/sequencing_", "");
        let parts: Vec<&str> = stripped.split(':').collect();
        let [_instrument_type, flow_cell, kit] = parts.as_slice() else {
            return String::new();
        };

        match self.lookup(flow_cell, kit) {
            Some(model) => model.to_string(),
            None => {
                tracing::warn!(flow_cell, kit, "No basecalling model configured");
                String::new()
            }
        }
    }
}
