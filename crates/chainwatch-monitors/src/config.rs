//! Per-monitor configuration, deserialized from the daemon's TOML file.
//!
//! Every metric a monitor exposes is named `<name>_<suffix>`, so `name`
//! doubles as a metric prefix.

use serde::{Deserialize, Serialize};

fn default_validator_label() -> String {
    "validator".to_string()
}

fn default_id_pointer() -> String {
    "/id".to_string()
}

fn default_code_pointer() -> String {
    "/code".to_string()
}

fn default_gas_pointer() -> String {
    "/gas_used".to_string()
}

fn default_next_pointer() -> String {
    "/next".to_string()
}

/// One gauge read from a response document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeField {
    /// Suffix appended to the monitor name.
    pub metric: String,
    pub pointer: String,
}

/// `[[query]]`: publish numeric fields of one response as gauges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    pub name: String,
    pub path: String,
    pub gauges: Vec<GaugeField>,
}

/// `[[distribution]]`: per-label amounts with outlier flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionConfig {
    pub name: String,
    pub path: String,
    /// Pointer to the array of items.
    pub items_pointer: String,
    /// Pointer, relative to an item, to its label.
    pub label_pointer: String,
    /// Pointer, relative to an item, to its integer amount.
    pub amount_pointer: String,
    #[serde(default = "default_validator_label")]
    pub label_key: String,
    /// Overrides the global `n_mads` threshold.
    pub n_mads: Option<u64>,
}

/// `[[tx_history]]`: counters over a paginated transaction listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxHistoryConfig {
    pub name: String,
    /// Listing path; `{cursor}` is replaced by the page cursor (empty for
    /// the newest page).
    pub path: String,
    pub entries_pointer: String,
    #[serde(default = "default_id_pointer")]
    pub id_pointer: String,
    /// A missing or zero code means the transaction succeeded.
    #[serde(default = "default_code_pointer")]
    pub code_pointer: String,
    #[serde(default = "default_gas_pointer")]
    pub gas_pointer: String,
    pub fee_pointer: String,
    #[serde(default = "default_next_pointer")]
    pub next_pointer: String,
}

/// `[[missed_blocks]]`: per-signer count of blocks not signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissedBlocksConfig {
    pub name: String,
    pub latest_height_path: String,
    pub latest_height_pointer: String,
    /// Block path; `{height}` is replaced by the height.
    pub block_path: String,
    /// Pointer to the array of signatures in a block document.
    pub signers_pointer: String,
    /// Pointer, relative to a signature, to the signer address. Empty when
    /// the array holds plain strings.
    #[serde(default)]
    pub signer_field: String,
    /// Signer addresses to watch.
    pub validators: Vec<String>,
    #[serde(default = "default_validator_label")]
    pub label_key: String,
}

/// `[[fingerprint]]`: detect changes of a remote document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintConfig {
    pub name: String,
    pub path: String,
    /// Only digest the value at this pointer.
    pub pointer: Option<String>,
}
