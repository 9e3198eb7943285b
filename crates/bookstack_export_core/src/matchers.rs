use std::fmt;

use anyhow::{Context, Result, bail};
use regex::Regex;
use reqwest::Url;

/// Root URL of a BookStack instance, without a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl {
    raw: String,
}

impl BaseUrl {
    pub fn parse(value: &str) -> Result<Self> {
        let raw = value.trim().trim_end_matches('/').to_string();
        if raw.is_empty() {
            bail!("BookStack URL cannot be empty");
        }
        let url = Url::parse(&raw).with_context(|| format!("invalid BookStack URL: {raw}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!(
                "unsupported BookStack URL scheme `{}` in {raw} (expected http|https)",
                url.scheme()
            );
        }
        if url.host_str().is_none_or(str::is_empty) {
            bail!("BookStack URL has no host: {raw}");
        }
        if url.query().is_some() || url.fragment().is_some() {
            bail!("BookStack URL must not carry a query or fragment: {raw}");
        }
        Ok(Self { raw })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

}

impl fmt::Display for BaseUrl {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.raw)
    }
}

/// Compiled patterns for the two kinds of references a page can hold back to
/// its own wiki. The base URL is escaped before it is spliced in, so `.` or
/// `+` in a hostname or path only ever match themselves.
#[derive(Debug, Clone)]
pub struct LinkMatchers {
    base_url: BaseUrl,
    image: Regex,
    internal: Regex,
}

impl LinkMatchers {
    pub fn new(base_url: &BaseUrl) -> Result<Self> {
        let base = regex::escape(base_url.as_str());
        // [![alt](<base>/uploads/...thumb.ext)](<base>/uploads/.../<file>.ext)
        // Alt text stops at the first `]` and each URL at the first `)`, so a
        // match never spans an unrelated embed or the prose between two.
        let image = Regex::new(&format!(
            r"\[!\[[^\]\n]+\]\({base}/uploads/[^)\s]*?\.\w{{3}}\)\]\(({base}/uploads/[^)\s]*?/([^/)\s]*?\.\w{{3}}))\)"
        ))
        .context("failed to compile image link pattern")?;
        // The book slug is one path segment; the page part may carry a suffix
        // such as `/edit` but never crosses a `)`.
        let internal = Regex::new(&format!(r"{base}/books/([^/)\s]+)/page/([^)\s]+)\)"))
            .context("failed to compile internal link pattern")?;
        Ok(Self {
            base_url: base_url.clone(),
            image,
            internal,
        })
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    pub(crate) fn image(&self) -> &Regex {
        &self.image
    }

    pub(crate) fn internal(&self) -> &Regex {
        &self.internal
    }
}
