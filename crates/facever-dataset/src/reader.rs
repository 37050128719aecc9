//! Parsing of `path label` list files.
//!
//! Paths may contain spaces, so the label is whatever follows the last
//! space on the line.

use std::path::{Path, PathBuf};

use facever_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// One line of a list file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub path: PathBuf,
    pub label: i64,
}

pub fn parse_list_line(line: &str) -> Result<ListEntry> {
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    let (path, label) = line
        .rsplit_once(' ')
        .ok_or_else(|| Error::Parse(format!("Missing label in list line '{line}'")))?;
    let label = label
        .trim()
        .parse::<i64>()
        .map_err(|e| Error::Parse(format!("Bad label in list line '{line}': {e}")))?;

    Ok(ListEntry {
        path: PathBuf::from(path),
        label,
    })
}

/// Read every non-blank line of a list file.
pub fn read_list_file(path: &Path) -> Result<Vec<ListEntry>> {
    info!("Opening file {:?}", path);
    let content = std::fs::read_to_string(path)?;

    let entries = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(parse_list_line)
        .collect::<Result<Vec<_>>>()?;

    if entries.is_empty() {
        return Err(Error::Parse(format!("File is empty: {}", path.display())));
    }

    info!("A total of {} images.", entries.len());
    Ok(entries)
}
