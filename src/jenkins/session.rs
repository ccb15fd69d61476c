//! Authenticated Jenkins HTTP session.
//!
//! Wire behavior follows the Jenkins remote-access API: JSON under
//! `/api/json`, job config as XML documents, console logs as plain text.
//! Authentication is basic auth with a user + API token on every request;
//! the session is validated once at connect time with a whoami round-trip.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tracing::debug;

use crate::error::ControlPlaneError;

use super::{BuildStatus, ControlPlane, Identity, JobInfo};

/// Per-request timeout for control-plane calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// An authenticated session against a Jenkins control plane.
///
/// Owns its identity for the lifetime of the run; nothing is persisted
/// across processes.
pub struct JenkinsSession {
    client: Client,
    base_url: String,
    user: String,
    token: String,
}

impl JenkinsSession {
    /// Connect and validate the session with an identity round-trip.
    ///
    /// Any failure here (transport, 401/403, malformed response) is an
    /// `Auth` error: the orchestrator treats it as fatal.
    pub async fn connect(
        base_url: &str,
        user: &str,
        token: &str,
    ) -> Result<(Self, Identity), ControlPlaneError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ControlPlaneError::Auth(format!("Failed to build HTTP client: {e}")))?;

        let session = Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user: user.to_string(),
            token: token.to_string(),
        };

        let identity = session
            .who_am_i()
            .await
            .map_err(|e| ControlPlaneError::Auth(e.to_string()))?;

        Ok((session, identity))
    }

    fn job_url(&self, name: &str, suffix: &str) -> String {
        format!(
            "{}/job/{}/{}",
            self.base_url,
            urlencoding::encode(name),
            suffix
        )
    }

    async fn get(&self, url: &str) -> Result<Response, ControlPlaneError> {
        debug!(url, "GET");
        self.client
            .get(url)
            .basic_auth(&self.user, Some(&self.token))
            .send()
            .await
            .map_err(|e| ControlPlaneError::RequestFailed(e.to_string()))
    }

    async fn post_xml(&self, url: &str, body: &str) -> Result<(), ControlPlaneError> {
        debug!(url, "POST");
        let response = self
            .client
            .post(url)
            .basic_auth(&self.user, Some(&self.token))
            .header("Content-Type", "text/xml; charset=utf-8")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| ControlPlaneError::RequestFailed(e.to_string()))?;

        Self::expect_success(response).await
    }

    async fn expect_success(response: Response) -> Result<(), ControlPlaneError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(ControlPlaneError::ApiError {
            code: status.as_u16(),
            message: truncate(&message, 512),
        })
    }
}

/// Keep error payloads readable; Jenkins error pages are full HTML documents.
fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &text[..end])
    }
}

#[async_trait]
impl ControlPlane for JenkinsSession {
    async fn who_am_i(&self) -> Result<Identity, ControlPlaneError> {
        let url = format!("{}/me/api/json", self.base_url);
        let response = self.get(&url).await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ControlPlaneError::Auth(format!(
                "Identity check rejected with status {}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(ControlPlaneError::ApiError {
                code: status.as_u16(),
                message: "Identity check failed".to_string(),
            });
        }

        response
            .json::<Identity>()
            .await
            .map_err(|e| ControlPlaneError::ParseError(e.to_string()))
    }

    async fn job_config(&self, name: &str) -> Result<String, ControlPlaneError> {
        let url = self.job_url(name, "config.xml");
        let response = self.get(&url).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ControlPlaneError::JobNotFound(name.to_string()));
        }
        if !status.is_success() {
            return Err(ControlPlaneError::ApiError {
                code: status.as_u16(),
                message: "Failed to read job config".to_string(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| ControlPlaneError::ParseError(e.to_string()))
    }

    async fn create_job(&self, name: &str, config_xml: &str) -> Result<(), ControlPlaneError> {
        let url = format!(
            "{}/createItem?name={}",
            self.base_url,
            urlencoding::encode(name)
        );
        self.post_xml(&url, config_xml).await
    }

    async fn reconfigure_job(&self, name: &str, config_xml: &str) -> Result<(), ControlPlaneError> {
        let url = self.job_url(name, "config.xml");
        self.post_xml(&url, config_xml).await
    }

    async fn trigger_build(&self, name: &str) -> Result<(), ControlPlaneError> {
        let url = self.job_url(name, "build");
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.user, Some(&self.token))
            .send()
            .await
            .map_err(|e| ControlPlaneError::RequestFailed(e.to_string()))?;

        Self::expect_success(response).await
    }

    async fn job_info(&self, name: &str) -> Result<JobInfo, ControlPlaneError> {
        let url = self.job_url(name, "api/json");
        let response = self.get(&url).await?;

        if !response.status().is_success() {
            return Err(ControlPlaneError::ApiError {
                code: response.status().as_u16(),
                message: "Failed to read job info".to_string(),
            });
        }

        response
            .json::<JobInfo>()
            .await
            .map_err(|e| ControlPlaneError::ParseError(e.to_string()))
    }

    async fn build_status(
        &self,
        name: &str,
        number: u32,
    ) -> Result<BuildStatus, ControlPlaneError> {
        let url = self.job_url(name, &format!("{number}/api/json"));
        let response = self.get(&url).await?;

        if !response.status().is_success() {
            return Err(ControlPlaneError::ApiError {
                code: response.status().as_u16(),
                message: "Failed to read build status".to_string(),
            });
        }

        response
            .json::<BuildStatus>()
            .await
            .map_err(|e| ControlPlaneError::ParseError(e.to_string()))
    }

    async fn console_output(
        &self,
        name: &str,
        number: u32,
    ) -> Result<String, ControlPlaneError> {
        let url = self.job_url(name, &format!("{number}/consoleText"));
        let response = self.get(&url).await?;

        if !response.status().is_success() {
            return Err(ControlPlaneError::ApiError {
                code: response.status().as_u16(),
                message: "Failed to fetch console output".to_string(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| ControlPlaneError::ParseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_is_unchanged() {
        assert_eq!(truncate("hello", 512), "hello");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "héllo wörld".repeat(100);
        let cut = truncate(&text, 10);
        assert!(cut.chars().count() <= 11);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn test_wire_types_deserialize_jenkins_payloads() {
        let identity: Identity = serde_json::from_str(r#"{"fullName":"admin"}"#).unwrap();
        assert_eq!(identity.full_name, "admin");

        let info: JobInfo =
            serde_json::from_str(r#"{"name":"arc_job","lastBuild":{"number":42}}"#).unwrap();
        assert_eq!(info.last_build.unwrap().number, 42);

        let info: JobInfo = serde_json::from_str(r#"{"lastBuild":null}"#).unwrap();
        assert!(info.last_build.is_none());

        let status: BuildStatus =
            serde_json::from_str(r#"{"building":false,"result":"SUCCESS"}"#).unwrap();
        assert!(!status.building);
    }
}
