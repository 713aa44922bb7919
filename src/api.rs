//! Client for the results backend's HTTP JSON API. Paths and query
//! parameters follow the backend's contract; response shapes are the
//! wire payloads in `model`.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use crate::config::HTTP_TIMEOUT_SECS;
use crate::error::DashboardError;
use crate::model::{CommitPayload, CommitSummary, ProjectPayload};
use crate::tuning::BatchSubmission;

pub struct ApiClient {
    http: Client,
    base: Url,
}

#[derive(Debug, Clone, Default)]
pub struct CommitListQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub metrics: Option<String>,
    pub committer: Option<String>,
}

impl ApiClient {
    pub fn new(base: Url) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .pool_max_idle_per_host(4)
            .build()
            .expect("Failed to create HTTP client");
        Self { http, base }
    }

    /// `GET /api/v1/projects`
    pub async fn projects(&self) -> Result<BTreeMap<String, ProjectPayload>, DashboardError> {
        self.get_json(self.endpoint("api/v1/projects", &[])?).await
    }

    /// `GET /api/v1/project/branches?project=`
    pub async fn branches(&self, project: &str) -> Result<Vec<String>, DashboardError> {
        let url = self.endpoint("api/v1/project/branches", &[])?;
        self.get_json(with_query(url, &[("project", Some(project))]))
            .await
    }

    /// `GET /api/v1/commits[/<branch>]?project=&from=&to=&metrics=&committer=`
    pub async fn commits(
        &self,
        project: &str,
        branch: Option<&str>,
        query: &CommitListQuery,
    ) -> Result<Vec<CommitSummary>, DashboardError> {
        let url = self.endpoint("api/v1/commits", branch.as_slice())?;
        let url = with_query(
            url,
            &[
                ("project", Some(project)),
                ("from", query.from.as_deref()),
                ("to", query.to.as_deref()),
                ("metrics", query.metrics.as_deref()),
                ("committer", query.committer.as_deref()),
            ],
        );
        self.get_json(url).await
    }

    /// `GET /api/v1/commit[/<id>]?project=&branch=&batch=`
    pub async fn commit(
        &self,
        project: &str,
        id: Option<&str>,
        branch: Option<&str>,
        batch: Option<&str>,
    ) -> Result<CommitPayload, DashboardError> {
        let url = self.endpoint("api/v1/commit", id.as_slice())?;
        let url = with_query(
            url,
            &[
                ("project", Some(project)),
                ("branch", branch),
                ("batch", batch),
            ],
        );
        self.get_json(url).await
    }

    /// `POST /api/v1/commit/<id>/batch?project=`
    pub async fn submit_batch(
        &self,
        project: &str,
        commit_id: &str,
        submission: &BatchSubmission,
    ) -> Result<Value, DashboardError> {
        let url = self.endpoint("api/v1/commit", &[commit_id, "batch"])?;
        let url = with_query(url, &[("project", Some(project))]);
        let response = self.http.post(url).json(submission).send().await?;
        check_status(response).await?.json().await.map_err(Into::into)
    }

    /// `GET /api/v1/tests/group?project=&name=&commit=`
    pub async fn test_group(
        &self,
        project: &str,
        name: &str,
        commit: &str,
    ) -> Result<Vec<String>, DashboardError> {
        let url = self.endpoint("api/v1/tests/group", &[])?;
        let url = with_query(
            url,
            &[
                ("project", Some(project)),
                ("name", Some(name)),
                ("commit", Some(commit)),
            ],
        );
        self.get_json(url).await
    }

    fn endpoint(&self, path: &str, segments: &[&str]) -> Result<Url, DashboardError> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| DashboardError::Other(e.to_string()))?;
        if !segments.is_empty() {
            let mut parts = url
                .path_segments_mut()
                .map_err(|_| DashboardError::Other("backend URL cannot be a base".to_string()))?;
            for segment in segments {
                parts.push(segment);
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, DashboardError> {
        let response = self.http.get(url).send().await?;
        check_status(response).await?.json().await.map_err(Into::into)
    }
}

fn with_query(mut url: Url, params: &[(&str, Option<&str>)]) -> Url {
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            if let Some(value) = value {
                pairs.append_pair(key, value);
            }
        }
    }
    url
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, DashboardError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(DashboardError::BackendStatus {
        status: status.as_u16(),
        message,
    })
}
