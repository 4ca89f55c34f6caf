//! Error types emitted by the VFK CLI.

use std::sync::Arc;

use camino::Utf8PathBuf;
use thiserror::Error;
use vfk_data::ReaderError;

/// Errors emitted by the VFK CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// The requested operation requires a missing compile-time feature.
    #[error("{action} requires the `{feature}` feature to be enabled")]
    MissingFeature {
        feature: &'static str,
        action: &'static str,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Reading the source or its cache failed.
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: ReaderError,
    },
    /// Serialising the summary failed.
    #[error("failed to serialise summary: {0}")]
    SerialiseSummary(#[source] serde_json::Error),
    /// Writing the summary failed.
    #[error("failed to write summary: {0}")]
    WriteOutput(#[source] std::io::Error),
}
