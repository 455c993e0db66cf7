//! Source file discovery.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use migrate_core::{is_archive, Error, Result};
use tracing::{debug, warn};

/// Recursively collect whisper files under `root`, sorted by path.
///
/// A missing root yields no files. Any other failure to read a directory
/// is a [`Error::Discovery`]. Symlinked files are followed; symlinked
/// directories are not.
pub fn find_archive_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(walk_error(
                root,
                io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
            ))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(root = %root.display(), "Whisper directory does not exist");
            return Ok(files);
        }
        Err(e) => return Err(walk_error(root, e)),
    }

    walk(root, &mut files)?;
    files.sort();

    debug!(root = %root.display(), count = files.len(), "Discovered whisper files");
    Ok(files)
}

fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| walk_error(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| walk_error(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| walk_error(&path, e))?;

        if file_type.is_dir() {
            walk(&path, files)?;
        } else if (file_type.is_file() || (file_type.is_symlink() && path.is_file()))
            && is_archive(&path)
        {
            files.push(path);
        }
    }
    Ok(())
}

fn walk_error(path: &Path, source: io::Error) -> Error {
    Error::Discovery {
        path: path.to_path_buf(),
        source,
    }
}
