//! Errors that callers need to tell apart.
//!
//! Most code just uses [`anyhow::Result`]. The types here exist where the
//! benchmark has to decide what to do next: skip an engine, record a failed
//! image, or give up on the whole run.

use std::{io, time::Duration};

use thiserror::Error;

use crate::prelude::*;

/// An error reported by an OCR engine adapter.
#[derive(Debug, Error)]
pub enum EngineError {
    /// One-time setup failed. The engine is skipped for the rest of the run.
    #[error("could not initialize engine: {0:#}")]
    Init(anyhow::Error),

    /// Recognition failed for a single image.
    #[error("could not recognize image: {0:#}")]
    Execution(anyhow::Error),

    /// Recognition took longer than the configured timeout.
    #[error("recognition timed out after {0:?}")]
    Timeout(Duration),
}

/// A fatal error which ends the benchmark run.
#[derive(Debug, Error)]
pub enum BenchError {
    /// The image directory is missing or unreadable.
    #[error("image directory {path:?} not found or unreadable")]
    CorpusNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The report could not be written.
    #[error("could not write report to {path:?}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}
