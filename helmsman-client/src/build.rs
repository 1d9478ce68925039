//! Build server client (Jenkins-style JSON API)

use reqwest::Client;
use reqwest::header::LOCATION;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::response;
use helmsman_core::domain::build::{BuildStatus, QueuedItem};
use helmsman_core::dto::build::{BuildInfo, CrumbInfo, JobInfo, QueueItemInfo};

/// Authenticated client for a Jenkins-style build server
///
/// The optional CSRF crumb is fetched once at construction and attached
/// to every mutating request afterwards. A server without a crumb issuer
/// is fine; the crumb is simply omitted.
#[derive(Debug, Clone)]
pub struct BuildServerClient {
    base_url: String,
    user: String,
    token: String,
    crumb: Option<CrumbInfo>,
    client: Client,
}

impl BuildServerClient {
    /// Connects to the build server and fetches the CSRF crumb
    ///
    /// Crumb fetch failures are logged and ignored; the server may not
    /// have CSRF protection enabled at all.
    pub async fn connect(
        base_url: impl Into<String>,
        user: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let user = user.into();
        let token = token.into();
        let client = Client::new();

        let crumb = fetch_crumb(&client, &base_url, &user, &token).await;

        Self {
            base_url,
            user,
            token,
            crumb,
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, url: String) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .basic_auth(&self.user, Some(&self.token))
    }

    /// POST with auth and, when present, the CSRF crumb header pair
    fn post(&self, url: String) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .post(url)
            .basic_auth(&self.user, Some(&self.token));
        if let Some(crumb) = &self.crumb {
            request = request.header(&crumb.field, &crumb.crumb);
        }
        request
    }

    /// Fetches job metadata, used to detect parameterized jobs
    pub async fn job_info(&self, job: &str) -> Result<JobInfo> {
        let url = format!("{}/job/{}/api/json", self.base_url, job);
        let response = self.get(url).send().await?;

        response::json(response).await
    }

    /// Submits a build request and returns the queue token
    ///
    /// Parameterized jobs with a nonempty parameter map go through
    /// `buildWithParameters`; everything else through plain `build`.
    /// A response outside the 2xx class, or one without a queue Location
    /// header, fails the trigger.
    pub async fn trigger(
        &self,
        job: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<QueuedItem> {
        let parameterized = match self.job_info(job).await {
            Ok(info) => info.is_parameterized(),
            Err(e) => {
                warn!("Could not probe job '{}' for parameters: {}", job, e);
                false
            }
        };

        let request = if parameterized && !params.is_empty() {
            let url = format!("{}/job/{}/buildWithParameters", self.base_url, job);
            self.post(url).query(params)
        } else {
            let url = format!("{}/job/{}/build", self.base_url, job);
            self.post(url)
        };

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(ClientError::TriggerFailed(format!(
                "build server answered {} for job '{}'",
                status, job
            )));
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                ClientError::TriggerFailed(format!(
                    "no queue location in trigger response for job '{}'",
                    job
                ))
            })?;

        info!("Triggered job '{}', queued at {}", job, location);
        Ok(QueuedItem::new(location))
    }

    /// Fetches the state of a queued build request
    pub async fn queue_item(&self, item: &QueuedItem) -> Result<QueueItemInfo> {
        let url = format!("{}api/json", item.url());
        let response = self.get(url).send().await?;

        response::json(response).await
    }

    /// Fetches the full build record
    pub async fn build_info(&self, job: &str, number: u32) -> Result<BuildInfo> {
        let url = format!("{}/job/{}/{}/api/json", self.base_url, job, number);
        let response = self.get(url).send().await?;

        response::json(response).await
    }

    /// Current status of a build
    ///
    /// A build with the `building` flag set is in progress; once the flag
    /// clears, the server's result field is reported verbatim.
    pub async fn build_status(&self, job: &str, number: u32) -> Result<BuildStatus> {
        let info = self.build_info(job, number).await?;

        if info.building {
            return Ok(BuildStatus::InProgress);
        }

        Ok(info
            .result
            .as_deref()
            .map(BuildStatus::from_result)
            .unwrap_or(BuildStatus::Unknown))
    }

    /// Full console output of a build
    pub async fn console_log(&self, job: &str, number: u32) -> Result<String> {
        let url = format!("{}/job/{}/{}/consoleText", self.base_url, job, number);
        let response = self.get(url).send().await?;

        response::text(response).await
    }

    /// Best-effort build stop
    ///
    /// The server answers with a redirect on success, so both the 2xx and
    /// 3xx classes count.
    pub async fn stop_build(&self, job: &str, number: u32) -> Result<bool> {
        let url = format!("{}/job/{}/{}/stop", self.base_url, job, number);
        let response = self.post(url).send().await?;
        let status = response.status();

        Ok(status.is_success() || status.is_redirection())
    }
}

async fn fetch_crumb(
    client: &Client,
    base_url: &str,
    user: &str,
    token: &str,
) -> Option<CrumbInfo> {
    let url = format!("{}/crumbIssuer/api/json", base_url);
    let result = client
        .get(url)
        .basic_auth(user, Some(token))
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => match response.json().await {
            Ok(crumb) => {
                debug!("CSRF crumb fetched");
                Some(crumb)
            }
            Err(e) => {
                warn!("Could not parse CSRF crumb response: {}", e);
                None
            }
        },
        Ok(response) => {
            warn!("No CSRF crumb available (status {})", response.status());
            None
        }
        Err(e) => {
            warn!("CSRF crumb fetch failed: {}", e);
            None
        }
    }
}
