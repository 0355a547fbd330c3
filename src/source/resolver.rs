//! Turning a [`PdfSource`] into bytes under the configured access policy

use super::PdfSource;
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::pdf::check_pdf_header;
use base64::Engine;
use futures_util::StreamExt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Timeout for downloading a PDF from a URL source
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
/// Redirect hops followed before a download is abandoned
const MAX_REDIRECTS: usize = 10;

/// Resolves sources, enforcing directory sandboxing, SSRF protection and size limits
pub struct SourceResolver {
    resource_dirs: Vec<String>,
    allow_private_urls: bool,
    max_download_bytes: u64,
    client: reqwest::Client,
}

impl SourceResolver {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        // Redirects are followed by hand so every hop passes the URL checks
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(Error::HttpRequest)?;

        Ok(Self {
            resource_dirs: config.resource_dirs.clone(),
            allow_private_urls: config.allow_private_urls,
            max_download_bytes: config.max_download_bytes,
            client,
        })
    }

    /// Fetch the bytes behind `source` and check they carry a PDF header
    pub async fn resolve(&self, source: &PdfSource) -> Result<Vec<u8>> {
        let data = match source {
            PdfSource::Path { path } => read_file(&self.check_path_access(path)?)?,
            PdfSource::Base64 { base64 } => {
                base64::engine::general_purpose::STANDARD.decode(base64.trim())?
            }
            PdfSource::Url { url } => self.download(url).await?,
        };

        check_pdf_header(&data)?;
        Ok(data)
    }

    /// Confine `path` to the resource directories.
    /// With no resource directories configured every path is allowed.
    pub fn check_path_access(&self, path: &str) -> Result<PathBuf> {
        if self.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let denied = || Error::PathAccessDenied {
            path: path.to_string(),
        };
        let canonical = std::fs::canonicalize(path).map_err(|_| denied())?;

        let inside = self.resource_dirs.iter().any(|dir| {
            std::fs::canonicalize(dir)
                .map(|dir| canonical.starts_with(dir))
                .unwrap_or(false)
        });

        if inside {
            Ok(canonical)
        } else {
            Err(denied())
        }
    }

    /// Scheme and SSRF checks applied to the initial URL and to every redirect target
    async fn check_url(&self, url: &url::Url) -> Result<()> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::SourceResolution {
                reason: format!("Unsupported URL scheme: {}", url.scheme()),
            });
        }
        if !self.allow_private_urls {
            ensure_public_host(url).await?;
        }
        Ok(())
    }

    /// GET `url`, following up to [`MAX_REDIRECTS`] checked redirects
    async fn fetch(&self, url: &str) -> Result<reqwest::Response> {
        let mut current = url::Url::parse(url).map_err(|e| Error::SourceResolution {
            reason: format!("Invalid URL: {}", e),
        })?;

        for _ in 0..=MAX_REDIRECTS {
            self.check_url(&current).await?;

            tracing::debug!(url = %current, "downloading PDF");
            let response = self.client.get(current.clone()).send().await?;
            if !response.status().is_redirection() {
                return Ok(response);
            }

            current = redirect_target(&current, &response)?;
        }

        Err(Error::SourceResolution {
            reason: format!("Too many redirects (max: {})", MAX_REDIRECTS),
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.fetch(url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::SourceResolution {
                reason: format!("Download failed with status: {}", status),
            });
        }

        let limit = self.max_download_bytes;
        let too_large = |size: u64| Error::DownloadTooLarge {
            size,
            max_size: limit,
        };

        if let Some(declared) = response.content_length() {
            if declared > limit {
                return Err(too_large(declared));
            }
        }

        // Content-Length may be absent or wrong; enforce the limit while streaming
        let mut data = Vec::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            data.extend_from_slice(&chunk?);
            if data.len() as u64 > limit {
                return Err(too_large(data.len() as u64));
            }
        }

        Ok(data)
    }
}

/// The absolute URL a redirect response points to; relative locations resolve against `current`
fn redirect_target(current: &url::Url, response: &reqwest::Response) -> Result<url::Url> {
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| Error::SourceResolution {
            reason: format!("Redirect ({}) without a Location header", response.status()),
        })?;

    current.join(location).map_err(|e| Error::SourceResolution {
        reason: format!("Invalid redirect location: {}", e),
    })
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(Error::PdfNotFound {
            path: path.display().to_string(),
        });
    }
    Ok(std::fs::read(path)?)
}

/// Addresses a URL source must never reach: loopback, private, link-local
/// (cloud metadata), CGNAT, broadcast and unspecified.
fn is_blocked_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || (a == 100 && (b & 0xC0) == 64)
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_blocked_ip(&IpAddr::V4(mapped));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xFE00) == 0xFC00 // unique local
                || (first & 0xFFC0) == 0xFE80 // link-local
        }
    }
}

/// Resolve the URL's host and reject it if any address is blocked
async fn ensure_public_host(url: &url::Url) -> Result<()> {
    let host = url.host_str().ok_or_else(|| Error::SourceResolution {
        reason: "URL has no host".to_string(),
    })?;
    let port = url.port_or_known_default().unwrap_or(443);

    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| Error::SourceResolution {
            reason: format!("DNS resolution failed for {}: {}", host, e),
        })?;

    for addr in addrs {
        if is_blocked_ip(&addr.ip()) {
            return Err(Error::SsrfBlocked {
                url: url.to_string(),
            });
        }
    }

    Ok(())
}
