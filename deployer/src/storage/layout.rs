//! Log artifact layout
//!
//! One artifact per (script, target, request timestamp). Names are a pure function of
//! that triple, so concurrent workers never share a file and the collector can find
//! every artifact again without being told. Scripts sharing a basename within one
//! request are told apart by their position in the script list.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::filesys::file::File;

/// Timestamp format shared by every artifact of one request
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Request timestamp for the current local time
pub fn request_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

fn basename(script: &Path) -> String {
    script
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| script.display().to_string())
}

/// Log label of every script of a request, in order.
///
/// The label is the basename, or `<basename>.<position>` (1-based) when another script
/// of the same request has that basename.
pub fn script_labels(scripts: &[PathBuf]) -> Vec<String> {
    let bases: Vec<String> = scripts.iter().map(|s| basename(s)).collect();
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for base in &bases {
        *seen.entry(base.as_str()).or_default() += 1;
    }

    bases
        .iter()
        .enumerate()
        .map(|(index, base)| match seen.get(base.as_str()) {
            Some(count) if *count > 1 => format!("{}.{}", base, index + 1),
            _ => base.clone(),
        })
        .collect()
}

/// `<script label>.<target>.<timestamp>.log`
pub fn log_file_name(label: &str, target: &str, timestamp: &str) -> String {
    [label, target, timestamp, "log"].join(".")
}

/// Where a request's log artifacts live
#[derive(Debug, Clone)]
pub struct LogLayout {
    dir: PathBuf,
    timestamp: String,
}

impl LogLayout {
    pub fn new(dir: impl Into<PathBuf>, timestamp: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            timestamp: timestamp.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Artifact for one script, named by its label, on one target
    pub fn artifact(&self, label: &str, target: &str) -> File {
        File::new(self.dir.join(log_file_name(label, target, &self.timestamp)))
    }
}
