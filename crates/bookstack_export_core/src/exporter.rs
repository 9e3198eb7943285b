use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use log::warn;

use crate::error::ExportError;
use crate::headings::normalize_headings;
use crate::images::{ImageFetcher, inline_images};
use crate::links::{InternalLink, find_internal_links};
use crate::matchers::{BaseUrl, LinkMatchers};
use crate::source::PageRecord;

pub const DRAFT_PREFIX: &str = "DRAFT: ";

/// Settings shared by every page of a run.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub output_root: PathBuf,
    matchers: LinkMatchers,
}

impl ExportConfig {
    pub fn new(base_url: &BaseUrl, output_root: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            output_root: output_root.into(),
            matchers: LinkMatchers::new(base_url)?,
        })
    }

    pub fn base_url(&self) -> &BaseUrl {
        self.matchers.base_url()
    }

    pub fn matchers(&self) -> &LinkMatchers {
        &self.matchers
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageExportReport {
    pub path: PathBuf,
    pub images: Vec<String>,
    pub internal_links: Vec<InternalLink>,
}

impl PageExportReport {
    pub fn needs_manual_attention(&self) -> bool {
        !self.internal_links.is_empty()
    }
}

/// `/` would otherwise create a subdirectory.
pub fn sanitize_title(title: &str) -> String {
    title.replace('/', "-")
}

pub fn page_directory(output_root: &Path, page: &PageRecord) -> PathBuf {
    output_root.join(&page.shelf).join(&page.book)
}

pub fn page_output_path(output_root: &Path, page: &PageRecord) -> PathBuf {
    page_directory(output_root, page).join(format!("{}.md", sanitize_title(&page.title)))
}

pub fn title_heading(page: &PageRecord) -> String {
    format!(
        "# {}{}\n\n",
        if page.is_draft { DRAFT_PREFIX } else { "" },
        page.title
    )
}

/// Writes one page (and its images) below `config.output_root`.
///
/// Internal links are reported in the returned value and logged; they never
/// fail the page. Filesystem and download failures do.
pub fn export_page<F>(
    page: &PageRecord,
    config: &ExportConfig,
    fetcher: &mut F,
) -> Result<PageExportReport>
where
    F: ImageFetcher + ?Sized,
{
    let directory = page_directory(&config.output_root, page);
    fs::create_dir_all(&directory).map_err(|source| ExportError::io(&directory, source))?;

    let label = format!("{} => {}", page.book, page.title);
    let inlined = inline_images(
        &page.markdown,
        config.matchers(),
        fetcher,
        &directory,
        &label,
    )?;

    let mut markdown = title_heading(page);
    markdown.push_str(&normalize_headings(&inlined.markdown));

    let internal_links = find_internal_links(&markdown, config.matchers());
    for link in &internal_links {
        warn!(
            ">> Internal link found in [{}] to [{}]/[{}]",
            page.title, link.book_slug, link.page_slug
        );
        for line in link.context_lines() {
            warn!("    {line}");
        }
    }

    let path = page_output_path(&config.output_root, page);
    fs::write(&path, &markdown).map_err(|source| ExportError::io(&path, source))?;

    Ok(PageExportReport {
        path,
        images: inlined.filenames,
        internal_links,
    })
}
