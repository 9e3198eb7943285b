use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;

use crate::exporter::{ExportConfig, export_page};
use crate::images::ImageFetcher;
use crate::source::{PageRecord, PageSource};

pub const MANUAL_CLEANUP_MESSAGE: &str = "Manual cleanup required. See '>>' messages above.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub output_root: PathBuf,
    pub pages_exported: usize,
    pub images_downloaded: usize,
    pub image_requests: usize,
    pub pages_with_internal_links: Vec<PathBuf>,
    pub manual_attention_required: bool,
}

/// Exports `pages` one at a time. The first failing page aborts the run;
/// pages written before it stay on disk.
pub fn run_export<F>(
    pages: &[PageRecord],
    config: &ExportConfig,
    fetcher: &mut F,
) -> Result<ExportSummary>
where
    F: ImageFetcher + ?Sized,
{
    let mut summary = ExportSummary {
        output_root: config.output_root.clone(),
        ..ExportSummary::default()
    };

    let total = pages.len();
    for (index, page) in pages.iter().enumerate() {
        info!(
            "[{}/{total}] {}/{}/{}",
            index + 1,
            page.shelf,
            page.book,
            page.title
        );
        let report = export_page(page, config, fetcher).with_context(|| {
            format!(
                "failed to export page `{}` in {}/{}",
                page.title, page.shelf, page.book
            )
        })?;

        summary.pages_exported += 1;
        summary.images_downloaded += report.images.len();
        if report.needs_manual_attention() {
            summary.manual_attention_required = true;
            summary.pages_with_internal_links.push(report.path);
        }
    }
    summary.image_requests = fetcher.request_count();

    if summary.manual_attention_required {
        warn!("{MANUAL_CLEANUP_MESSAGE}");
    }
    Ok(summary)
}

/// Loads every page from `source` and exports it.
pub fn export_from_source<S, F>(
    source: &mut S,
    config: &ExportConfig,
    fetcher: &mut F,
) -> Result<ExportSummary>
where
    S: PageSource + ?Sized,
    F: ImageFetcher + ?Sized,
{
    info!(
        "Retrieving all pages from {} for {}",
        source.describe(),
        config.base_url()
    );
    let pages = source.load_pages()?;
    info!(
        "Exporting {} pages to {}",
        pages.len(),
        config.output_root.display()
    );
    run_export(&pages, config, fetcher)
}
