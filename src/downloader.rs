use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use futures_util::StreamExt;
use reqwest::{header, Client, Proxy, RequestBuilder, Response};

use crate::config::DeployConfig;
use crate::error::{Error, Result};
use crate::progress::ProgressFn;
use crate::release::{Asset, Release};

/// Whether an asset was fetched or already present in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Downloaded,
}

/// Queries release metadata and downloads release assets into the cache.
///
/// Requests run one at a time and are never retried. Downloaded archives
/// are not checked against any hash or signature; a same-named file with
/// the declared byte size is trusted as-is.
pub struct Downloader<'a> {
    config: &'a DeployConfig,
    client: Client,
    /// Optional progress callback.
    pub progress: Option<ProgressFn>,
}

impl<'a> Downloader<'a> {
    /// Create a downloader for `config`, without progress output.
    pub fn new(config: &'a DeployConfig) -> Result<Self> {
        Ok(Self {
            config,
            client: build_client(config)?,
            progress: None,
        })
    }

    /// Attach a progress callback (builder).
    pub fn with_progress(mut self, progress: Option<ProgressFn>) -> Self {
        self.progress = progress;
        self
    }

    /// Fetch the release document for `tag`, or the latest release.
    pub async fn fetch_release(&self, tag: Option<&str>) -> Result<Release> {
        let url = self.config.release_url(tag);
        tracing::info!("[FETCH] Fetching release info: {url}");

        let resp = self
            .authorized(self.client.get(&url))
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .timeout(self.config.api_timeout)
            .send()
            .await?;
        let resp = check_status(&url, resp)?;

        let body = resp.bytes().await?;
        let release: Release =
            serde_json::from_slice(&body).map_err(|source| Error::Json { url, source })?;
        tracing::info!("  Tag: {}", release.tag_name);
        Ok(release)
    }

    /// True if `cache_dir` holds a file named after `asset` with exactly its size.
    pub fn is_cached(asset: &Asset, cache_dir: &Path) -> bool {
        std::fs::metadata(cache_dir.join(&asset.name))
            .map(|meta| meta.is_file() && meta.len() == asset.size)
            .unwrap_or(false)
    }

    /// Ensure `asset` is present in `cache_dir`, downloading it if needed.
    ///
    /// An existing file of the wrong size is overwritten from scratch; there
    /// is no resume. An interrupted download leaves a truncated file behind
    /// that the next run's size check will normally reject.
    pub async fn download_to_cache(
        &self,
        asset: &Asset,
        cache_dir: &Path,
    ) -> Result<(PathBuf, CacheStatus)> {
        let dest = cache_dir.join(&asset.name);
        if Self::is_cached(asset, cache_dir) {
            tracing::info!("  [CACHE] {} already exists, skipping download", asset.name);
            return Ok((dest, CacheStatus::Hit));
        }

        std::fs::create_dir_all(cache_dir).map_err(|e| Error::io(cache_dir, e))?;
        tracing::info!("  [DOWNLOAD] {}", asset.name);
        self.stream_to_file(&asset.url, &asset.name, &dest).await?;
        Ok((dest, CacheStatus::Downloaded))
    }

    /// Stream `url` into `dest`, writing and reporting in fixed-size chunks.
    async fn stream_to_file(&self, url: &str, name: &str, dest: &Path) -> Result<()> {
        let resp = self
            .authorized(self.client.get(url))
            .header(header::ACCEPT, "application/octet-stream")
            .timeout(self.config.download_timeout)
            .send()
            .await?;
        let resp = check_status(url, resp)?;

        let total = resp.content_length().unwrap_or(0);
        let chunk_size = self.config.chunk_size.max(1);
        let mut file = File::create(dest).map_err(|e| Error::io(dest, e))?;
        let mut pending: Vec<u8> = Vec::with_capacity(chunk_size);
        let mut written: u64 = 0;
        let start = Instant::now();
        let mut stream = resp.bytes_stream();

        while let Some(bytes) = stream.next().await {
            pending.extend_from_slice(&bytes?);
            while pending.len() >= chunk_size {
                file.write_all(&pending[..chunk_size])
                    .map_err(|e| Error::io(dest, e))?;
                pending.drain(..chunk_size);
                written += chunk_size as u64;
                self.report(name, written, total, start, false);
            }
        }

        if !pending.is_empty() {
            file.write_all(&pending).map_err(|e| Error::io(dest, e))?;
            written += pending.len() as u64;
        }
        file.flush().map_err(|e| Error::io(dest, e))?;
        self.report(name, written, total, start, true);
        Ok(())
    }

    fn report(&self, name: &str, written: u64, total: u64, start: Instant, complete: bool) {
        if let Some(progress) = &self.progress {
            let elapsed = start.elapsed().as_secs_f64();
            let mib_per_sec = if elapsed > 0.0 {
                (written as f64) / (1024.0 * 1024.0) / elapsed
            } else {
                0.0
            };
            progress(name, written, total, mib_per_sec, complete);
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Build an HTTP client; the only proxy honoured is the configured one.
fn build_client(config: &DeployConfig) -> Result<Client> {
    let builder = Client::builder().user_agent(concat!("maafetch/", env!("CARGO_PKG_VERSION")));
    let builder = match &config.proxy {
        Some(proxy_url) => builder.proxy(Proxy::all(proxy_url)?),
        None => builder.no_proxy(),
    };
    Ok(builder.build()?)
}

fn check_status(url: &str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(Error::Http {
            url: url.to_owned(),
            status,
        })
    }
}
