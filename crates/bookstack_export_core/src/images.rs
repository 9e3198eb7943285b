use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use reqwest::blocking::Client;

use crate::error::ExportError;
use crate::matchers::LinkMatchers;

pub const DEFAULT_USER_AGENT: &str = "bookstack-export/0.1";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// A thumbnail-wrapped image embed that points back into the wiki's uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLink {
    pub start: usize,
    pub end: usize,
    pub url: String,
    pub filename: String,
}

impl ImageLink {
    pub fn replacement(&self) -> String {
        format!("![]({})", self.filename)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlinedImages {
    pub markdown: String,
    /// Filenames written next to the page, in text order.
    pub filenames: Vec<String>,
}

/// Source of image bytes. The HTTP implementation is the only production one.
pub trait ImageFetcher {
    fn fetch(&mut self, url: &str) -> Result<Vec<u8>>;
    fn request_count(&self) -> usize;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Skip TLS certificate validation for this client only. The wiki is
    /// typically served from an internal host with a self-signed certificate.
    pub accept_invalid_certs: bool,
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            accept_invalid_certs: true,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

pub struct HttpImageFetcher {
    client: Client,
    request_count: usize,
}

impl HttpImageFetcher {
    pub fn new(options: &FetchOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(options.timeout_ms))
            .user_agent(options.user_agent.clone())
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .build()
            .context("failed to build image download HTTP client")?;
        Ok(Self {
            client,
            request_count: 0,
        })
    }
}

impl ImageFetcher for HttpImageFetcher {
    fn fetch(&mut self, url: &str) -> Result<Vec<u8>> {
        self.request_count += 1;
        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|source| ExportError::Transport {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }
        let body = response.bytes().map_err(|source| ExportError::Transport {
            url: url.to_string(),
            source,
        })?;
        debug!("downloaded {} bytes from {url}", body.len());
        Ok(body.to_vec())
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

pub fn find_image_links(text: &str, matchers: &LinkMatchers) -> Vec<ImageLink> {
    matchers
        .image()
        .captures_iter(text)
        .filter_map(|captures| {
            let span = captures.get(0)?;
            Some(ImageLink {
                start: span.start(),
                end: span.end(),
                url: captures.get(1)?.as_str().to_string(),
                filename: captures.get(2)?.as_str().to_string(),
            })
        })
        .collect()
}

/// Downloads every embedded wiki image into `target_dir` and rewrites each
/// embed to a bare `![](filename)`.
///
/// Downloads run rightmost match first and every download completes before
/// the text is rebuilt. The first failure aborts the page.
pub fn inline_images<F>(
    text: &str,
    matchers: &LinkMatchers,
    fetcher: &mut F,
    target_dir: &Path,
    label: &str,
) -> Result<InlinedImages>
where
    F: ImageFetcher + ?Sized,
{
    let links = find_image_links(text, matchers);
    if links.is_empty() {
        return Ok(InlinedImages {
            markdown: text.to_string(),
            filenames: Vec::new(),
        });
    }

    for link in links.iter().rev() {
        info!("Found embedded image in {label}: {}", link.filename);
        let bytes = fetcher.fetch(&link.url)?;
        let destination = target_dir.join(&link.filename);
        fs::write(&destination, &bytes).map_err(|source| ExportError::io(&destination, source))?;
    }

    Ok(InlinedImages {
        markdown: splice(text, &links),
        filenames: links.iter().map(|link| link.filename.clone()).collect(),
    })
}

fn splice(text: &str, links: &[ImageLink]) -> String {
    let mut output = String::with_capacity(text.len());
    let mut cursor = 0usize;
    for link in links {
        output.push_str(&text[cursor..link.start]);
        output.push_str(&link.replacement());
        cursor = link.end;
    }
    output.push_str(&text[cursor..]);
    output
}
