//! Microsoft Graph source: download the master workbook from SharePoint.
//!
//! Two requests per fetch, both with the caller's bearer token:
//!
//! ```text
//! GET {base}/sites/{host}:/sites/{site}                    → { "id": ... }
//! GET {base}/sites/{id}/drive/root:/{workbook path}:/content → xlsx bytes
//! ```

use crate::config::{ConversionConfig, WorkbookLocation};
use crate::error::MasterOrderError;
use crate::master::workbook::read_code_column;
use crate::master::MasterOrderSource;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct SiteResponse {
    id: String,
}

/// Reads the master column from a workbook stored in a SharePoint site.
#[derive(Debug, Clone)]
pub struct GraphWorkbookSource {
    client: reqwest::Client,
    location: WorkbookLocation,
    timeout: Duration,
}

impl GraphWorkbookSource {
    pub fn new(location: WorkbookLocation, timeout: Duration) -> Result<Self, MasterOrderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MasterOrderError::Request {
                url: location.graph_base_url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            location,
            timeout,
        })
    }

    pub fn from_config(config: &ConversionConfig) -> Result<Self, MasterOrderError> {
        Self::new(config.workbook.clone(), config.request_timeout())
    }

    /// `{base}/sites/{host}:/sites/{site}`
    pub fn site_url(&self) -> Result<Url, MasterOrderError> {
        let loc = &self.location;
        let host = format!("{}:", loc.site_host);
        endpoint(
            &loc.graph_base_url,
            &["sites", host.as_str(), "sites", loc.site_name.as_str()],
        )
    }

    /// `{base}/sites/{id}/drive/root:/{path}:/content`
    pub fn content_url(&self, site_id: &str) -> Result<Url, MasterOrderError> {
        let parts: Vec<&str> = self
            .location
            .workbook_path
            .split('/')
            .filter(|p| !p.is_empty())
            .collect();
        let Some((last, dirs)) = parts.split_last() else {
            return Err(MasterOrderError::MalformedResponse {
                detail: "workbook path is empty".to_string(),
            });
        };

        let last = format!("{last}:");
        let mut segments = vec!["sites", site_id, "drive", "root:"];
        segments.extend(dirs.iter().copied());
        segments.push(last.as_str());
        segments.push("content");
        endpoint(&self.location.graph_base_url, &segments)
    }

    async fn get(&self, url: Url, credential: &str) -> Result<reqwest::Response, MasterOrderError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(credential)
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;
        check_status(&url, response.status())?;
        Ok(response)
    }

    fn transport_error(&self, url: &Url, e: reqwest::Error) -> MasterOrderError {
        if e.is_timeout() {
            MasterOrderError::Timeout {
                url: url.to_string(),
                secs: self.timeout.as_secs(),
            }
        } else {
            MasterOrderError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }

    async fn site_id(&self, credential: &str) -> Result<String, MasterOrderError> {
        let url = self.site_url()?;
        let site: SiteResponse = self
            .get(url.clone(), credential)
            .await?
            .json()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    self.transport_error(&url, e)
                } else {
                    MasterOrderError::MalformedResponse {
                        detail: format!("site lookup: {e}"),
                    }
                }
            })?;
        Ok(site.id)
    }
}

impl MasterOrderSource for GraphWorkbookSource {
    async fn fetch(&self, credential: &str) -> Result<Vec<String>, MasterOrderError> {
        if credential.trim().is_empty() {
            return Err(MasterOrderError::MissingCredential);
        }

        let site_id = self.site_id(credential).await?;
        let url = self.content_url(&site_id)?;
        let bytes = self
            .get(url.clone(), credential)
            .await?
            .bytes()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        info!(
            "Downloaded master workbook '{}' ({} bytes)",
            self.location.workbook_path,
            bytes.len()
        );
        read_code_column(&bytes, &self.location)
    }

    fn kind(&self) -> &'static str {
        "graph"
    }
}

/// Append percent-encoded path segments to `base`.
fn endpoint(base: &str, segments: &[&str]) -> Result<Url, MasterOrderError> {
    let bad_base = || MasterOrderError::Request {
        url: base.to_string(),
        reason: "invalid Graph base URL".to_string(),
    };
    let mut url = Url::parse(base).map_err(|_| bad_base())?;
    url.path_segments_mut()
        .map_err(|_| bad_base())?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// 401/403 are credential problems; anything else non-2xx is a plain status
/// error.
fn check_status(url: &Url, status: StatusCode) -> Result<(), MasterOrderError> {
    if status.is_success() {
        return Ok(());
    }
    let url = url.to_string();
    let status = status.as_u16();
    match status {
        401 | 403 => Err(MasterOrderError::Unauthorized { url, status }),
        _ => Err(MasterOrderError::HttpStatus { url, status }),
    }
}
