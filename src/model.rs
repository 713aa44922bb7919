//! Wire payloads (as the backend serves them) and the validated domain
//! types the store keeps. Payload fields that the backend leaves loose
//! (`configuration`, `extra_parameters`) stay `serde_json::Value`;
//! everything else is normalized when the reducer admits it.
//!
//! Maps feeding enumeration-order contracts (batch fallback, first
//! reference candidate) are `BTreeMap`, so "first" means lexicographic
//! key order and is deterministic across runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Wire payloads

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectPayload {
    #[serde(default)]
    pub data: ProjectDataPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectDataPayload {
    #[serde(default)]
    pub qatools_config: SiteConfig,
    #[serde(default)]
    pub qatools_metrics: MetricCatalogPayload,
}

/// Site configuration attached to a project or commit. Only
/// `reference_branch` is interpreted here; the rest is viewer
/// configuration carried through opaque.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub reference_branch: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricCatalogPayload {
    #[serde(default)]
    pub available_metrics: BTreeMap<String, PartialMetric>,
    #[serde(default)]
    pub main_metrics: Vec<String>,
    #[serde(default)]
    pub default_metric: Option<String>,
}

/// A metric descriptor as served: every field optional,
/// `smaller_is_better` possibly a bool or a string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialMetric {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub short_label: Option<String>,
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default)]
    pub smaller_is_better: Option<Value>,
    #[serde(default)]
    pub target: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitPayload {
    pub id: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub data: Option<CommitDataPayload>,
    #[serde(default)]
    pub batches: BTreeMap<String, BatchPayload>,
}

/// Commit-level overrides of the project-level configuration/metrics.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitDataPayload {
    #[serde(default)]
    pub qatools_config: Option<SiteConfig>,
    #[serde(default)]
    pub qatools_metrics: Option<MetricCatalogPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchPayload {
    pub id: String,
    #[serde(default)]
    pub outputs: BTreeMap<String, OutputPayload>,
    #[serde(default)]
    pub valid_outputs: u32,
    #[serde(default)]
    pub running_outputs: u32,
    #[serde(default)]
    pub pending_outputs: u32,
    #[serde(default)]
    pub failed_outputs: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputPayload {
    #[serde(default)]
    pub test_input_path: String,
    #[serde(default)]
    pub configuration: Value,
    #[serde(default)]
    pub extra_parameters: Value,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub is_pending: bool,
    #[serde(default)]
    pub is_failed: bool,
    #[serde(default)]
    pub output_dir_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitSummary {
    pub id: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub committer: Option<String>,
    #[serde(default)]
    pub authored_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Domain types (store-side)

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectData {
    pub config: SiteConfig,
    pub metrics: MetricCatalog,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricCatalog {
    pub available_metrics: BTreeMap<String, Metric>,
    pub main_metrics: Vec<String>,
    pub default_metric: Option<String>,
}

/// Fully defaulted metric descriptor; see `metrics::fill_metric_defaults`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub key: String,
    pub label: String,
    pub short_label: String,
    pub scale: f64,
    pub suffix: String,
    pub smaller_is_better: bool,
    pub target: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Commit {
    pub id: String,
    pub branch: Option<String>,
    pub config_override: Option<SiteConfig>,
    pub metrics_override: Option<MetricCatalog>,
    pub batches: BTreeMap<String, Batch>,
}

impl Commit {
    pub fn has_pending_outputs(&self) -> bool {
        self.batches.values().any(|b| b.pending_outputs > 0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    pub id: String,
    pub label: String,
    pub outputs: BTreeMap<String, Output>,
    pub valid_outputs: u32,
    pub running_outputs: u32,
    pub pending_outputs: u32,
    pub failed_outputs: u32,
}

impl Batch {
    pub fn empty(label: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            label: label.into(),
            outputs: BTreeMap::new(),
            valid_outputs: 0,
            running_outputs: 0,
            pending_outputs: 0,
            failed_outputs: 0,
        }
    }

    pub fn from_payload(label: &str, payload: BatchPayload) -> Self {
        let outputs = payload
            .outputs
            .into_iter()
            .map(|(id, o)| {
                let output = Output::from_payload(&id, o);
                (id, output)
            })
            .collect();
        Self {
            id: payload.id,
            label: label.to_string(),
            outputs,
            valid_outputs: payload.valid_outputs,
            running_outputs: payload.running_outputs,
            pending_outputs: payload.pending_outputs,
            failed_outputs: payload.failed_outputs,
        }
    }
}

/// One test-case result. Immutable once stored; derived fields live on
/// `OutputView`, never here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Output {
    pub id: String,
    pub test_input_path: String,
    pub configuration: Value,
    pub extra_parameters: Value,
    pub metrics: BTreeMap<String, f64>,
    pub is_pending: bool,
    pub is_failed: bool,
    pub output_dir_url: Option<String>,
}

impl Output {
    pub fn from_payload(id: &str, payload: OutputPayload) -> Self {
        Self {
            id: id.to_string(),
            test_input_path: payload.test_input_path,
            configuration: payload.configuration,
            extra_parameters: payload.extra_parameters,
            metrics: payload.metrics,
            is_pending: payload.is_pending,
            is_failed: payload.is_failed,
            output_dir_url: payload.output_dir_url,
        }
    }
}

/// Selector-produced view of an output: the raw fields plus the derived
/// ones (`configurations_str`, merged `params`, reference match).
#[derive(Debug, Clone, Serialize)]
pub struct OutputView {
    pub id: String,
    pub test_input_path: String,
    pub configuration: Value,
    pub configurations_str: String,
    pub params: BTreeMap<String, Value>,
    pub metrics: BTreeMap<String, f64>,
    pub is_pending: bool,
    pub is_failed: bool,
    pub output_dir_url: Option<String>,
    pub reference_id: Option<String>,
    pub reference_mismatch: bool,
}

// ---------------------------------------------------------------------------
// Selection state

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Ascending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchRole {
    New,
    Reference,
}

/// Per-project UI selection. Transient: excluded from persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selection {
    pub new_commit_id: Option<String>,
    pub reference_commit_id: Option<String>,
    pub new_batch: String,
    pub reference_batch: String,
    pub filter_new: String,
    pub filter_reference: String,
    pub sort_by: String,
    pub sort_order: SortOrder,
    pub selected_metrics: Vec<String>,
    pub selected_view: Option<String>,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            new_commit_id: None,
            reference_commit_id: None,
            new_batch: "default".to_string(),
            reference_batch: "default".to_string(),
            filter_new: String::new(),
            filter_reference: String::new(),
            sort_by: "test_input_path".to_string(),
            sort_order: SortOrder::Ascending,
            selected_metrics: Vec::new(),
            selected_view: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSettings {
    pub name: Option<String>,
}

/// A fetch failure recorded alongside (never replacing) slice data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchError {
    pub message: String,
    pub at: DateTime<Utc>,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            at: Utc::now(),
        }
    }
}
