//! Exports BookStack pages to a self-contained Markdown tree.
//!
//! Pages are read from BookStack's database ([`source`]), then each page runs
//! through a fixed pipeline ([`exporter::export_page`]): embedded wiki images
//! are downloaded and inlined, headings are shifted so the page has a single
//! top level, a title heading is prepended, and links to other wiki pages are
//! reported for manual cleanup.

pub mod config;
pub mod error;
pub mod exporter;
pub mod headings;
pub mod images;
pub mod links;
pub mod matchers;
pub mod run;
pub mod source;

pub use error::ExportError;
pub use exporter::{ExportConfig, PageExportReport, export_page};
pub use run::{ExportSummary, export_from_source, run_export};
pub use source::PageRecord;
