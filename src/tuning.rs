//! Tuning-run submission: the form state kept per project, its
//! field-level validation, and the payload forwarded to the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::FieldError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Grid,
    Optimizer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningSearch {
    pub search_type: SearchType,
    /// Grid: parameter name → candidate value list. Optimizer: spec object.
    #[serde(default)]
    pub parameter_search: Value,
    #[serde(default)]
    pub search_options: Value,
}

impl Default for TuningSearch {
    fn default() -> Self {
        Self {
            search_type: SearchType::Grid,
            parameter_search: Value::Object(Default::default()),
            search_options: Value::Object(Default::default()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningForm {
    #[serde(default)]
    pub batch_label: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default)]
    pub tuning_search: TuningSearch,
    #[serde(default)]
    pub selected_group: String,
    #[serde(default)]
    pub overwrite: bool,
}

fn default_platform() -> String {
    "linux".to_string()
}

impl Default for TuningForm {
    fn default() -> Self {
        Self {
            batch_label: String::new(),
            platform: default_platform(),
            tuning_search: TuningSearch::default(),
            selected_group: String::new(),
            overwrite: false,
        }
    }
}

impl TuningForm {
    /// Field-level validation. An empty result means the form can be
    /// submitted; each entry names the field and the reason it blocks.
    pub fn validate(&self, user: Option<&str>) -> Vec<FieldError> {
        let mut errors = Vec::new();
        let mut reject = |field: &str, reason: &str| {
            errors.push(FieldError {
                field: field.to_string(),
                reason: reason.to_string(),
            });
        };

        if self.batch_label.trim().is_empty() {
            reject("batch_label", "must not be empty");
        } else if self.batch_label == "default" && !self.overwrite {
            reject(
                "batch_label",
                "would overwrite the shared default batch; set overwrite to confirm",
            );
        }

        if self.platform.trim().is_empty() {
            reject("platform", "must not be empty");
        }

        if self.selected_group.trim().is_empty() {
            reject("selected_group", "choose an input group to run on");
        }

        match self.tuning_search.search_type {
            SearchType::Grid => match &self.tuning_search.parameter_search {
                Value::Object(grid) if !grid.is_empty() => {
                    for (name, candidates) in grid {
                        match candidates {
                            Value::Array(values) if !values.is_empty() => {}
                            Value::Array(_) => {
                                reject("parameter_search", &format!("{name}: empty value list"));
                            }
                            _ => {
                                reject(
                                    "parameter_search",
                                    &format!("{name}: expected a list of candidate values"),
                                );
                            }
                        }
                    }
                }
                _ => reject("parameter_search", "grid search needs at least one parameter"),
            },
            SearchType::Optimizer => {
                if !self.tuning_search.search_options.is_object() {
                    reject("search_options", "optimizer search needs an options object");
                }
            }
        }

        if user.map_or(true, |u| u.trim().is_empty()) {
            reject("user", "set a user name before submitting");
        }

        errors
    }

    pub fn to_submission(&self, user: &str) -> BatchSubmission {
        BatchSubmission {
            batch_label: self.batch_label.clone(),
            platform: self.platform.clone(),
            tuning_search: self.tuning_search.clone(),
            selected_group: self.selected_group.clone(),
            user: user.to_string(),
            overwrite: self.overwrite,
        }
    }
}

/// Body of `POST /api/v1/commit/<id>/batch`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSubmission {
    pub batch_label: String,
    pub platform: String,
    pub tuning_search: TuningSearch,
    pub selected_group: String,
    pub user: String,
    pub overwrite: bool,
}

/// One accepted submission, kept in the tuning slice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: Uuid,
    pub project: String,
    pub commit_id: String,
    pub batch_label: String,
    pub at: DateTime<Utc>,
}

impl SubmissionRecord {
    pub fn new(project: &str, commit_id: &str, batch_label: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            project: project.to_string(),
            commit_id: commit_id.to_string(),
            batch_label: batch_label.to_string(),
            at: Utc::now(),
        }
    }
}
