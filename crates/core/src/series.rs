//! Series key mapping.

use std::path::{Component, Path};

use crate::limits::ARCHIVE_SUFFIX;

/// Map an archive path to its Graphite series key.
///
/// The path is expected relative to the whisper root: the archive suffix is
/// stripped, path separators become `.` and spaces become `_`, so
/// `servers/web 01/cpu.wsp` maps to `servers.web_01.cpu`.
pub fn series_key(relative_path: &Path) -> String {
    let joined = relative_path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(".");

    let trimmed = joined.strip_suffix(ARCHIVE_SUFFIX).unwrap_or(&joined);
    trimmed.replace(' ', "_")
}

/// Whether the path names a whisper archive.
pub fn is_archive(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().ends_with(ARCHIVE_SUFFIX))
        .unwrap_or(false)
}
