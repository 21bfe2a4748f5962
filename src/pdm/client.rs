use crate::models::config::Config;
use crate::models::error::{BackupError, Result};
use crate::pdm::types::{Listing, Node, Payload, Project, ReleasedFile};
use crate::pdm::PdmSource;
use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

/// Connection settings for one run, resolved from configuration.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub base_url: String,
    pub token: String,
    pub request_timeout: Duration,
    pub download_timeout: Duration,
}

impl ConnectionSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.load_api_token()?,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            download_timeout: Duration::from_secs(config.download_timeout_secs),
        })
    }
}

/// Authenticated session against the Bild PDM API.
///
/// Download URLs are presigned, so `downloader` carries no Authorization
/// header and gets the longer timeout.
pub struct BildClient {
    base_url: String,
    token: String,
    http: Client,
    downloader: Client,
}

impl BildClient {
    /// Opens a session and verifies it before anything else runs.
    pub fn connect(settings: &ConnectionSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| BackupError::Connection {
                endpoint: settings.base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let downloader = Client::builder()
            .timeout(settings.download_timeout)
            .build()
            .map_err(|e| BackupError::Connection {
                endpoint: settings.base_url.clone(),
                reason: format!("failed to build download client: {e}"),
            })?;

        let client = Self {
            base_url: settings.base_url.clone(),
            token: settings.token.clone(),
            http,
            downloader,
        };

        client.verify()?;
        info!("Connected to PDM endpoint: {}", client.base_url);
        Ok(client)
    }

    /// Authenticated probe of the projects listing.
    fn verify(&self) -> Result<()> {
        let url = format!("{}/projects", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| BackupError::Connection {
                endpoint: self.base_url.clone(),
                reason: e.to_string(),
            })?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(BackupError::Connection {
                endpoint: self.base_url.clone(),
                reason: format!("authentication rejected (status {})", response.status()),
            }),
            status => Err(BackupError::Connection {
                endpoint: self.base_url.clone(),
                reason: format!("unexpected status {status}"),
            }),
        }
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, scope: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| BackupError::Enumeration {
                scope: scope.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackupError::Enumeration {
                scope: scope.to_string(),
                reason: format!("status {status}"),
            });
        }

        response.json::<T>().map_err(|e| BackupError::Enumeration {
            scope: scope.to_string(),
            reason: format!("invalid response body: {e}"),
        })
    }
}

impl PdmSource for BildClient {
    fn projects(&self) -> Result<Vec<Project>> {
        let url = format!("{}/projects", self.base_url);
        let listing: Listing<Project> = self.get_json(&url, "projects")?;
        Ok(listing.into_items())
    }

    fn project_files(&self, project_id: &str) -> Result<Vec<Node>> {
        let url = format!("{}/projects/{}/files", self.base_url, project_id);
        let scope = format!("files of project {project_id}");
        let listing: Listing<Node> = self.get_json(&url, &scope)?;
        Ok(listing.into_items())
    }

    fn resolve_download(
        &self,
        project_id: &str,
        branch_id: &str,
        file_id: &str,
    ) -> Result<ReleasedFile> {
        let url = format!(
            "{}/projects/{}/branches/{}/files/{}/released",
            self.base_url, project_id, branch_id, file_id
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| BackupError::Retrieve {
                file: file_id.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackupError::Retrieve {
                file: file_id.to_string(),
                reason: format!("status {status}"),
            });
        }

        let payload: Payload<ReleasedFile> =
            response.json().map_err(|e| BackupError::Retrieve {
                file: file_id.to_string(),
                reason: format!("invalid response body: {e}"),
            })?;
        Ok(payload.into_inner())
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        debug!("Downloading {} -> {}", url, dest.display());

        let result = self.stream_to_file(url, dest);
        if result.is_err() {
            // Never leave a truncated file behind.
            let _ = fs::remove_file(dest);
        }
        result
    }
}

impl BildClient {
    fn stream_to_file(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = self
            .downloader
            .get(url)
            .send()
            .map_err(|e| BackupError::Retrieve {
                file: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackupError::Retrieve {
                file: url.to_string(),
                reason: format!("status {status}"),
            });
        }

        let mut response = response;
        let mut file = fs::File::create(dest).map_err(|cause| BackupError::FileCopy {
            file: url.to_string(),
            to: dest.to_path_buf(),
            cause,
        })?;

        io::copy(&mut response, &mut file).map_err(|cause| BackupError::FileCopy {
            file: url.to_string(),
            to: dest.to_path_buf(),
            cause,
        })
    }
}
