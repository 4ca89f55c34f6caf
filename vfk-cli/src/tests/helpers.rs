//! Shared fixtures for CLI tests.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

/// A small ASCII source: one valid point, one short row, one stray record.
pub(super) const POINTS_SOURCE: &str = "&HVERZE;\"5.1\"\r\n\
    &BSOBR;ID N30;CISLO_BODU N12;SOURADNICE_Y N10.2;SOURADNICE_X N10.2\r\n\
    &DSOBR;1;1;-700000.00;-1100000.00\r\n\
    &DSOBR;2;2\r\n\
    &DXYZ;1\r\n\
    &K\r\n";

pub(super) fn utf8_dir(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
        .unwrap_or_else(|path| panic!("temporary directory {path:?} is not UTF-8"))
}

pub(super) fn write_source(dir: &Utf8Path, name: &str, text: &str) -> Utf8PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).unwrap_or_else(|err| panic!("failed to write {path}: {err}"));
    path
}

pub(super) fn inspect_json(args: crate::inspect::InspectArgs) -> serde_json::Value {
    let mut output = Vec::new();
    crate::inspect::run_inspect_with(args, &mut output).expect("inspect should succeed");
    assert_eq!(output.last(), Some(&b'\n'), "summary ends with a newline");
    serde_json::from_slice(&output).expect("summary is JSON")
}
