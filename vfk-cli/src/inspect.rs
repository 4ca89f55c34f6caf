//! `inspect` command: read a source and print a JSON summary of its blocks.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use log::debug;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use vfk_core::DataBlock;
#[cfg(feature = "store-sqlite")]
use vfk_data::SqliteReader;
use vfk_data::{Backend, LoadIssue, MemoryReader, Reader, ReaderOptions};

use crate::CliError;

pub(crate) const ARG_SOURCE: &str = "source";
pub(crate) const ENV_SOURCE: &str = "VFK_CMDS_INSPECT_SOURCE";
const ARG_CACHE: &str = "cache";
const ARG_IN_MEMORY: &str = "in-memory";
const ARG_OVERWRITE: &str = "overwrite";
const ARG_NO_SPATIAL: &str = "no-spatial";
const ARG_NO_GEOMETRY: &str = "no-geometry";

/// CLI arguments for the `inspect` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Read a VFK source into memory or through its SQLite cache, \
                 resolve geometry for every block, and print a JSON summary \
                 of the header, the blocks, and any skipped records.",
    about = "Summarise the blocks of a VFK source"
)]
#[ortho_config(prefix = "VFK")]
pub(crate) struct InspectArgs {
    /// Path to the VFK source file.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) source: Option<Utf8PathBuf>,
    /// SQLite cache location. Defaults to the source path with a `.db` extension.
    #[arg(long = ARG_CACHE, value_name = "path")]
    #[serde(default)]
    pub(crate) cache: Option<Utf8PathBuf>,
    /// Read into memory and leave no cache behind.
    #[arg(long = ARG_IN_MEMORY)]
    #[serde(default, skip_serializing_if = "is_unset")]
    pub(crate) in_memory: bool,
    /// Rebuild the cache even when it matches the source.
    #[arg(long = ARG_OVERWRITE)]
    #[serde(default, skip_serializing_if = "is_unset")]
    pub(crate) overwrite: bool,
    /// Do not store resolved geometry in the cache.
    #[arg(long = ARG_NO_SPATIAL)]
    #[serde(default, skip_serializing_if = "is_unset")]
    pub(crate) no_spatial: bool,
    /// Skip geometry resolution entirely.
    #[arg(long = ARG_NO_GEOMETRY)]
    #[serde(default, skip_serializing_if = "is_unset")]
    pub(crate) no_geometry: bool,
}

// Unset flags must not mask values from files or the environment.
const fn is_unset(flag: &bool) -> bool {
    !*flag
}

impl InspectArgs {
    pub(crate) fn into_config(self) -> Result<InspectConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        InspectConfig::try_from(merged)
    }
}

/// Where the reader keeps its blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Storage {
    Memory,
    #[cfg(feature = "store-sqlite")]
    Cache,
}

/// Resolved `inspect` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InspectConfig {
    /// Path to the VFK source.
    pub(crate) source: Utf8PathBuf,
    pub(crate) storage: Storage,
    pub(crate) options: ReaderOptions,
}

impl InspectConfig {
    pub(crate) fn validate_source(&self) -> Result<(), CliError> {
        Self::require_existing(&self.source, ARG_SOURCE)
    }

    fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        match vfk_fs::file_is_file(path) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CliError::SourcePathNotFile {
                field,
                path: path.to_path_buf(),
            }),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(CliError::MissingSourceFile {
                    field,
                    path: path.to_path_buf(),
                })
            }
            Err(source) => Err(CliError::InspectSourcePath {
                field,
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl TryFrom<InspectArgs> for InspectConfig {
    type Error = CliError;

    fn try_from(args: InspectArgs) -> Result<Self, Self::Error> {
        let source = args.source.ok_or(CliError::MissingArgument {
            field: ARG_SOURCE,
            env: ENV_SOURCE,
        })?;
        let storage = if args.in_memory {
            Storage::Memory
        } else {
            cache_storage()?
        };
        let mut options = ReaderOptions::default()
            .with_overwrite(args.overwrite)
            .with_spatial(!args.no_spatial)
            .with_suppress_geometry(args.no_geometry);
        if let Some(cache) = args.cache {
            options = options.with_cache_path(cache);
        }
        Ok(Self {
            source,
            storage,
            options,
        })
    }
}

#[cfg(feature = "store-sqlite")]
fn cache_storage() -> Result<Storage, CliError> {
    Ok(Storage::Cache)
}

#[cfg(not(feature = "store-sqlite"))]
fn cache_storage() -> Result<Storage, CliError> {
    Err(CliError::MissingFeature {
        feature: "store-sqlite",
        action: "caching a source (pass --in-memory instead)",
    })
}

/// JSON summary printed by `inspect`.
#[derive(Debug, Serialize)]
pub(crate) struct InspectSummary {
    pub(crate) source: Utf8PathBuf,
    pub(crate) reused_cache: bool,
    pub(crate) header: Vec<HeaderField>,
    pub(crate) blocks: Vec<BlockSummary>,
    pub(crate) features: u64,
    pub(crate) skipped_rows: u64,
    pub(crate) format_errors: usize,
    pub(crate) reference_errors: usize,
    pub(crate) issues: Vec<IssueSummary>,
}

#[derive(Debug, Serialize)]
pub(crate) struct HeaderField {
    pub(crate) key: String,
    pub(crate) value: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct BlockSummary {
    pub(crate) name: String,
    pub(crate) geometry_kind: &'static str,
    pub(crate) features: u64,
    pub(crate) skipped_rows: u64,
    /// Absent until geometry has been resolved for the block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) geometry: Option<GeometrySummary>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GeometrySummary {
    pub(crate) valid: u64,
    pub(crate) invalid: u64,
    pub(crate) empty: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct IssueSummary {
    pub(crate) line: usize,
    pub(crate) message: String,
}

impl From<&LoadIssue> for IssueSummary {
    fn from(issue: &LoadIssue) -> Self {
        Self {
            line: issue.line,
            message: issue.error.to_string(),
        }
    }
}

pub(crate) fn summarise<B: Backend>(reader: &Reader<B>) -> InspectSummary {
    let report = reader.report();
    let blocks = reader
        .blocks()
        .map(|block| BlockSummary {
            name: block.name().to_owned(),
            geometry_kind: block.geometry_kind().as_str(),
            features: block.feature_count(),
            skipped_rows: block.skipped_rows(),
            geometry: block.geometry_load().map(|load| GeometrySummary {
                valid: load.valid,
                invalid: load.invalid,
                empty: load.empty,
            }),
        })
        .collect::<Vec<_>>();
    InspectSummary {
        source: reader.path().to_path_buf(),
        reused_cache: report.reused_cache,
        header: reader
            .header()
            .iter()
            .map(|(key, value)| HeaderField {
                key: key.clone(),
                value: value.clone(),
            })
            .collect(),
        features: blocks.iter().map(|block| block.features).sum(),
        skipped_rows: blocks.iter().map(|block| block.skipped_rows).sum(),
        blocks,
        format_errors: report.format_errors(),
        reference_errors: report.reference_errors(),
        issues: report.issues.iter().map(IssueSummary::from).collect(),
    }
}

pub(crate) fn run_inspect(args: InspectArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_inspect_with(args, &mut stdout)
}

pub(crate) fn run_inspect_with(args: InspectArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let summary = execute_inspect(args)?;
    write_summary(writer, &summary)
}

fn execute_inspect(args: InspectArgs) -> Result<InspectSummary, CliError> {
    let config = args.into_config()?;
    config.validate_source()?;
    debug!("inspecting {} with {:?} storage", config.source, config.storage);
    let read_error = |source| CliError::Read {
        path: config.source.clone(),
        source,
    };
    match config.storage {
        Storage::Memory => MemoryReader::open(&config.source, config.options.clone())
            .map(|reader| summarise(&reader))
            .map_err(read_error),
        #[cfg(feature = "store-sqlite")]
        Storage::Cache => SqliteReader::open(&config.source, config.options.clone())
            .map(|reader| summarise(&reader))
            .map_err(read_error),
    }
}

fn write_summary(writer: &mut dyn Write, summary: &InspectSummary) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(summary).map_err(CliError::SerialiseSummary)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<InspectConfig, CliError> {
    let merged = InspectArgs::merge_from_layers(layers).map_err(CliError::from)?;
    InspectConfig::try_from(merged)
}
