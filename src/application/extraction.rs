use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use crate::domain::{ExtractionError, TEMP_SUFFIX};

/// Whole-archive or split-volume suffixes recognized by the first-part
/// heuristic and by post-extraction cleanup.
const ARCHIVE_EXTENSIONS: [&str; 4] = [".rar", ".zip", ".7z", ".001"];

/// Heuristic for the entry-point volume of a multi-part archive.
/// Typical shapes: `base.part1.rar`, `base.rar`, `base.zip`, `base.7z`,
/// `base.7z.001`.
pub fn is_archive_first_part(name: &str) -> bool {
    let low = name.to_ascii_lowercase();
    if low.contains(".part1.") {
        return true;
    }
    ARCHIVE_EXTENSIONS.iter().any(|ext| low.ends_with(ext))
}

/// Locate the first archive part in `dir`, scanning names in
/// lexicographic order.
pub fn find_first_part(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    names.sort();
    names
        .into_iter()
        .find(|n| is_archive_first_part(n))
        .map(|n| dir.join(n))
}

/// Boundary to the external extraction tool. The engine hands over a path
/// and an output directory and treats the rest as opaque.
pub trait Extractor: Send + Sync {
    fn extract(&self, archive: &Path, out_dir: &Path) -> Result<(), ExtractionError>;
}

/// Extraction via an external command-line tool, `7z` by default. The
/// tool itself walks the remaining volumes from the first part.
pub struct CommandExtractor {
    program: String,
}

impl CommandExtractor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for CommandExtractor {
    fn default() -> Self {
        Self::new("7z")
    }
}

impl Extractor for CommandExtractor {
    fn extract(&self, archive: &Path, out_dir: &Path) -> Result<(), ExtractionError> {
        debug!(archive = %archive.display(), "invoking extractor");
        let status = Command::new(&self.program)
            .arg("x")
            .arg("-y")
            .arg(format!("-o{}", out_dir.display()))
            .arg(archive)
            .status()
            .map_err(|e| ExtractionError::Spawn(e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(ExtractionError::Failed(format!(
                "{} exited with {}",
                self.program, status
            )))
        }
    }
}

/// Best-effort removal of consumed part files after extraction. Deletion
/// failures are logged and swallowed, never surfaced.
pub fn cleanup_parts(dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let low = name.to_ascii_lowercase();
        let matches = ARCHIVE_EXTENSIONS.iter().any(|ext| low.ends_with(ext))
            || low.contains(TEMP_SUFFIX);
        if matches {
            if let Err(e) = std::fs::remove_file(entry.path()) {
                warn!(file = %name, error = %e, "could not delete part file");
            }
        }
    }
}
