use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort an export run.
///
/// Library functions return `anyhow::Result`; these variants sit at the bottom
/// of the chain so callers can tell a filesystem failure from a download
/// failure with `downcast_ref`.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("filesystem operation failed for {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP {status} while downloading {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("failed to download {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ExportError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
