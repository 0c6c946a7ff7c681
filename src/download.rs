//! Verified, retryable streaming download of server binaries.
//!
//! A source is either a per-version manifest (JSON naming the server jar and
//! its SHA-1) or the binary itself. Each attempt re-runs resolve, stream and
//! verify from scratch; a failed attempt never leaves its file behind.

use std::{path::Path, time::Duration};

use reqwest::{Client, Response, header::CONTENT_TYPE};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
    time::sleep,
};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::{
    config::EngineConfig, error::DownloadError, integrity::IntegrityCheck,
    manifests::vanilla::VanillaReleaseManifest,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    /// Binary URL actually downloaded, after manifest resolution.
    pub source_url: String,
    pub expected_sha1: Option<String>,
    pub total_bytes: u64,
    pub downloaded_bytes: u64,
}

struct Resolved {
    url: String,
    response: Response,
    check: Option<IntegrityCheck>,
}

#[derive(Debug, Clone)]
pub struct DownloadManager {
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl DownloadManager {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }

    pub fn from_config(client: Client, config: &EngineConfig) -> Self {
        Self::new(client)
            .with_retries(config.max_retries)
            .with_retry_delay(config.retry_delay())
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Downloads `source` to `destination`, calling `progress(downloaded, total)`
    /// after every chunk. On error the last attempt's error is returned and
    /// `destination` does not exist.
    pub async fn fetch<F>(
        &self,
        source: &str,
        destination: &Path,
        mut progress: F,
    ) -> Result<FetchReport, DownloadError>
    where
        F: FnMut(u64, u64),
    {
        let mut attempt = 1;
        loop {
            debug!(attempt, source, "starting download attempt");
            match self.attempt(source, destination, &mut progress).await {
                Ok(report) => {
                    info!(
                        url = %report.source_url,
                        bytes = report.downloaded_bytes,
                        verified = report.expected_sha1.is_some(),
                        "download complete"
                    );
                    return Ok(report);
                }
                Err(err) => {
                    discard(destination).await;
                    if attempt >= self.max_retries {
                        warn!(attempt, source, error = %err, "download failed, giving up");
                        return Err(err);
                    }
                    warn!(attempt, source, error = %err, "download attempt failed, retrying");
                    attempt += 1;
                    if !self.retry_delay.is_zero() {
                        sleep(self.retry_delay).await;
                    }
                }
            }
        }
    }

    async fn attempt<F>(
        &self,
        source: &str,
        destination: &Path,
        progress: &mut F,
    ) -> Result<FetchReport, DownloadError>
    where
        F: FnMut(u64, u64),
    {
        let Resolved {
            url,
            response,
            mut check,
        } = self.resolve(source).await?;

        let expected_sha1 = check.as_ref().map(|c| c.expected().to_string());
        let content_length = response.content_length();

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| DownloadError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let io_err = |source| DownloadError::Io {
            path: destination.to_path_buf(),
            source,
        };

        let mut file = File::create(destination).await.map_err(io_err)?;
        let body = response.bytes_stream();
        tokio::pin!(body);
        let mut downloaded: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|source| DownloadError::Network {
                url: url.clone(),
                source,
            })?;

            if let Some(check) = check.as_mut() {
                check.update(&chunk);
            }
            file.write_all(&chunk).await.map_err(io_err)?;

            downloaded += chunk.len() as u64;
            let total = content_length.unwrap_or(downloaded).max(downloaded);
            progress(downloaded, total);
        }

        file.flush().await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;
        drop(file);

        if let Some(check) = check {
            check
                .finish()
                .map_err(|source| DownloadError::Integrity {
                    url: url.clone(),
                    source,
                })?;
        }

        Ok(FetchReport {
            source_url: url,
            expected_sha1,
            total_bytes: content_length.unwrap_or(downloaded),
            downloaded_bytes: downloaded,
        })
    }

    async fn resolve(&self, source: &str) -> Result<Resolved, DownloadError> {
        let response = self.get(source).await?;
        if !is_json(&response) {
            return Ok(Resolved {
                url: source.to_string(),
                response,
                check: None,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DownloadError::Network {
                url: source.to_string(),
                source: e,
            })?;

        let manifest: VanillaReleaseManifest =
            serde_json::from_slice(&body).map_err(|e| DownloadError::Manifest {
                url: source.to_string(),
                reason: e.to_string(),
            })?;

        let artifact = manifest
            .server()
            .ok_or_else(|| DownloadError::Manifest {
                url: source.to_string(),
                reason: "no server download listed".to_string(),
            })?;

        debug!(manifest = source, url = %artifact.url, "resolved manifest to server binary");

        let response = self.get(&artifact.url).await?;
        Ok(Resolved {
            url: artifact.url.clone(),
            response,
            check: Some(IntegrityCheck::new(&artifact.sha1)),
        })
    }

    async fn get(&self, url: &str) -> Result<Response, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| DownloadError::Network {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("json"))
}

async fn discard(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial download"),
    }
}
