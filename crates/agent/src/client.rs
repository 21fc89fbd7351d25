// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collector API client
//!
//! Blocking by design: callers in async loops push calls through
//! `spawn_blocking`. The check-in endpoint is not here — only the run helper
//! reports job outcomes.

use cor_core::JobDefinition;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from collector requests (transport and non-2xx statuses)
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("collector request failed: {0}")]
    Transport(#[from] ureq::Error),
}

/// One-time endpoint enrollment request
#[derive(Debug, Clone, Serialize)]
pub struct EnrollRequest {
    pub name: String,
    pub hostname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
    pub platform: String,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrollResponse {
    pub endpoint_id: u64,
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatRequest {
    pub status: String,
    pub platform: String,
    pub version: String,
}

/// Discovered candidate as the collector accepts it
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredJobPayload {
    pub name: String,
    pub namespace: String,
    pub schedule: String,
    pub command: String,
}

impl From<&JobDefinition> for DiscoveredJobPayload {
    fn from(job: &JobDefinition) -> Self {
        Self {
            name: job.name.clone(),
            namespace: job.namespace.clone(),
            schedule: job.schedule.clone(),
            command: job.full_command(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DiscoverRequest {
    jobs: Vec<DiscoveredJobPayload>,
}

/// HTTP client for the collector backend
#[derive(Debug, Clone)]
pub struct CollectorClient {
    base_url: String,
    agent: ureq::Agent,
    token: Option<String>,
}

impl CollectorClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            agent: ureq::Agent::new_with_defaults(),
            token: None,
        }
    }

    /// The endpoint token used on every authenticated call.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Exchange the operator's enrollment token for an endpoint id and an
    /// endpoint token.
    pub fn enroll(
        &self,
        request: &EnrollRequest,
        enrollment_token: &str,
    ) -> Result<EnrollResponse, CollectorError> {
        let url = format!("{}/api/endpoints/enroll", self.base_url);
        let auth = format!("Bearer {}", enrollment_token);
        let mut response = self
            .agent
            .post(url.as_str())
            .header("Authorization", auth.as_str())
            .send_json(request)?;
        Ok(response.body_mut().read_json()?)
    }

    pub fn heartbeat(
        &self,
        endpoint_id: u64,
        request: &HeartbeatRequest,
    ) -> Result<(), CollectorError> {
        let url = format!("{}/api/endpoints/{}/heartbeat", self.base_url, endpoint_id);
        self.post_authenticated(&url, request)
    }

    /// Hand discovered candidates to the authoring system for persistence.
    pub fn report_discovered(
        &self,
        endpoint_id: u64,
        jobs: &[JobDefinition],
    ) -> Result<(), CollectorError> {
        let url = format!(
            "{}/api/endpoints/{}/discovered-jobs",
            self.base_url, endpoint_id
        );
        let request = DiscoverRequest {
            jobs: jobs.iter().map(DiscoveredJobPayload::from).collect(),
        };
        self.post_authenticated(&url, &request)
    }

    fn post_authenticated<T: Serialize>(&self, url: &str, body: &T) -> Result<(), CollectorError> {
        let mut request = self.agent.post(url);
        if let Some(token) = &self.token {
            let auth = format!("Bearer {}", token);
            request = request.header("Authorization", auth.as_str());
        }
        request.send_json(body)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
