use crate::error::{Result, SmartExpectedError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

pub const AUDIO_EXTENSION: &str = "mp3";

/// Whether `path` carries the audio extension, ignoring case.
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(AUDIO_EXTENSION))
}

/// Recursively collect the absolute paths of all audio files under `root`.
///
/// Unreadable entries are skipped: a permission error or a file deleted mid-walk does not abort the
/// scan. Only a root that cannot be walked at all is an error. The result is unordered.
pub fn find_audio_files(root: &Path) -> Result<Vec<PathBuf>> {
    let root = match fs::canonicalize(root) {
        Ok(p) if p.is_dir() => p,
        Ok(_) => return Err(SmartExpectedError::NotADirectory { path: root.to_path_buf() }.into()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SmartExpectedError::NotADirectory { path: root.to_path_buf() }.into())
        }
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(&root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("skipping unreadable entry during scan of {}: {}", root.display(), e);
                continue;
            }
        };
        if entry.file_type().is_file() && is_audio_file(entry.path()) {
            files.push(entry.into_path());
        }
    }

    debug!("found {} audio files under {}", files.len(), root.display());
    Ok(files)
}
