use std::fs;
use std::path::Path;

use tracing::warn;
use walkdir::WalkDir;

use crate::logger;

/// Conventional name of the staging directory the pipeline's
/// directory-producing tools write into.
pub const OUTPUT_DIR_NAME: &str = "output_dir";

/// Delete every staging directory under `root`, contents included.
///
/// Everything else is left untouched. Returns how many directories were
/// removed.
pub fn remove_output_dirs(root: &Path) -> usize {
    let mut removed = 0;
    let mut walker = WalkDir::new(root).follow_links(false).into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => continue,
        };

        if entry.file_type().is_dir() && entry.file_name() == OUTPUT_DIR_NAME {
            walker.skip_current_dir();
            match fs::remove_dir_all(entry.path()) {
                Ok(()) => {
                    logger::status(&format!(
                        "Cleaned up output directory: {}",
                        entry.path().display()
                    ));
                    removed += 1;
                }
                Err(err) => {
                    warn!(
                        "Error cleaning up output directory {}: {}",
                        entry.path().display(),
                        err
                    );
                }
            }
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_removes_only_output_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(OUTPUT_DIR_NAME)).unwrap();
        fs::write(dir.path().join(OUTPUT_DIR_NAME).join("entry.js"), "x").unwrap();
        fs::create_dir_all(dir.path().join("keep").join(OUTPUT_DIR_NAME)).unwrap();
        fs::write(dir.path().join("keep/source.js"), "y").unwrap();

        let removed = remove_output_dirs(dir.path());

        assert_eq!(removed, 2);
        assert!(!dir.path().join(OUTPUT_DIR_NAME).exists());
        assert!(!dir.path().join("keep").join(OUTPUT_DIR_NAME).exists());
        assert!(dir.path().join("keep/source.js").exists());
    }

    #[test]
    fn test_noop_when_nothing_matches() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("other_dir")).unwrap();

        assert_eq!(remove_output_dirs(dir.path()), 0);
        assert!(dir.path().join("other_dir").exists());
    }
}
