//! Session directory layout.
//!
//! A MEF 3.0 session is a directory tree, not a single file:
//!
//! ```text
//! <session>.mefd/
//!   <channel>.timd/
//!     <channel>-000000.segd/
//!       <channel>-000000.tdat
//!       <channel>-000000.tidx
//!       <channel>-000000.tmet
//!     <channel>-000001.segd/ …
//! ```
//!
//! This module owns the naming rules: extensions, zero-padded segment
//! numbers, and sorted enumeration of channel and segment directories.

use std::path::{Path, PathBuf};

use crate::blocks::FILE_NUMBERING_DIGITS;
use crate::{Error, Result};

/// Extension of a session directory.
pub const SESSION_DIRECTORY_EXTENSION: &str = "mefd";
/// Extension of a time-series channel directory.
pub const TIME_SERIES_CHANNEL_DIRECTORY_EXTENSION: &str = "timd";
/// Extension of a segment directory.
pub const SEGMENT_DIRECTORY_EXTENSION: &str = "segd";
/// Extension of a time-series data file.
pub const TIME_SERIES_DATA_FILE_EXTENSION: &str = "tdat";
/// Extension of a time-series index file.
pub const TIME_SERIES_INDICES_FILE_EXTENSION: &str = "tidx";
/// Extension of a time-series metadata file.
pub const TIME_SERIES_METADATA_FILE_EXTENSION: &str = "tmet";

/// `<channel>-NNNNNN`, the stem shared by a segment directory and its files.
pub fn segment_name(channel_name: &str, segment_number: i32) -> String {
    format!(
        "{channel_name}-{segment_number:0width$}",
        width = FILE_NUMBERING_DIGITS
    )
}

/// Path of a segment directory inside a channel directory.
pub fn segment_dir(channel_dir: &Path, channel_name: &str, segment_number: i32) -> PathBuf {
    channel_dir.join(format!(
        "{}.{}",
        segment_name(channel_name, segment_number),
        SEGMENT_DIRECTORY_EXTENSION
    ))
}

/// Path of one of the three segment files (`tdat`/`tidx`/`tmet`).
pub fn segment_file(segment_dir: &Path, extension: &str) -> PathBuf {
    let stem = segment_dir
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    segment_dir.join(format!("{stem}.{extension}"))
}

/// Derive the session name from a `.mefd` path: the directory stem with any
/// trailing `.mefd` stripped.
pub fn session_name_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.strip_suffix(".mefd").unwrap_or(&stem).to_string()
}

/// Ensure a session path carries the `.mefd` extension, appending it if the
/// caller omitted it.
pub fn with_session_extension(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext == SESSION_DIRECTORY_EXTENSION => path.to_path_buf(),
        _ => {
            let mut path = path.to_path_buf();
            path.set_extension(SESSION_DIRECTORY_EXTENSION);
            path
        }
    }
}

/// List subdirectories of `dir` with the given extension, sorted by file
/// name.
///
/// Lexicographic order equals numeric order for segment directories because
/// segment numbers are zero-padded.
pub fn sorted_subdirectories(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() && path.extension().is_some_and(|e| e == extension) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Parse the segment number out of a `<channel>-NNNNNN` stem.
pub fn parse_segment_number(segment_stem: &str) -> Result<i32> {
    segment_stem
        .rsplit_once('-')
        .and_then(|(_, digits)| digits.parse::<i32>().ok())
        .ok_or_else(|| {
            Error::InvalidFormat(format!(
                "segment directory {segment_stem:?} has no -NNNNNN suffix"
            ))
        })
}
