use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// File extensions that qualify a file for processing.
pub const SCRIPT_EXTENSIONS: [&str; 3] = ["js", "cjs", "mjs"];

/// Dependency cache directory that is never descended into.
pub const DEPENDENCY_CACHE_DIR: &str = "node_modules";

pub fn is_script_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SCRIPT_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

fn keep_entry(entry: &DirEntry) -> bool {
    !(entry.file_type().is_dir() && entry.file_name() == DEPENDENCY_CACHE_DIR)
}

/// Count candidate script files under `root` for progress reporting.
pub fn count_script_files(root: &Path) -> usize {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(keep_entry)
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_script_file(e.path()))
        .count()
}

/// Candidate script files under `root` in depth-first traversal order.
pub fn script_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(keep_entry)
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_script_file(e.path()))
        .map(|e| e.into_path())
        .collect()
}

/// Auto-discover directories next to the tool's own location.
///
/// A sibling qualifies when its direct children include at least one
/// recognized script file; the dependency cache never qualifies. When
/// nothing qualifies, the origin directory itself is the fallback target.
pub fn sibling_directories(origin: &Path) -> Result<Vec<PathBuf>> {
    let mut siblings = Vec::new();

    for entry in fs::read_dir(origin)
        .with_context(|| format!("failed to read {}", origin.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_dir() || entry.file_name() == DEPENDENCY_CACHE_DIR {
            continue;
        }

        let path = entry.path();
        let has_script = fs::read_dir(&path)
            .map(|children| children.flatten().any(|c| is_script_file(&c.path())))
            .unwrap_or(false);

        if has_script {
            debug!("sibling qualifies: {}", path.display());
            siblings.push(path);
        }
    }

    if siblings.is_empty() {
        siblings.push(origin.to_path_buf());
    }

    Ok(siblings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_recognizes_script_extensions() {
        assert!(is_script_file(Path::new("a.js")));
        assert!(is_script_file(Path::new("/tmp/b.cjs")));
        assert!(is_script_file(Path::new("dir/c.mjs")));
        assert!(!is_script_file(Path::new("d.ts")));
        assert!(!is_script_file(Path::new("notes.txt")));
        assert!(!is_script_file(Path::new("Makefile")));
    }

    #[test]
    fn test_count_skips_dependency_cache() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.js"), "1").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/b.mjs"), "2").unwrap();
        fs::create_dir(dir.path().join(DEPENDENCY_CACHE_DIR)).unwrap();
        fs::write(dir.path().join(DEPENDENCY_CACHE_DIR).join("c.js"), "3").unwrap();

        assert_eq!(count_script_files(dir.path()), 2);
    }

    #[test]
    fn test_script_files_matches_count() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.js"), "").unwrap();
        fs::create_dir_all(dir.path().join("x/y")).unwrap();
        fs::write(dir.path().join("x/y/deep.cjs"), "").unwrap();
        fs::write(dir.path().join("x/readme.md"), "").unwrap();

        let files = script_files(dir.path());
        assert_eq!(files.len(), count_script_files(dir.path()));
        assert!(files.iter().any(|f| f.ends_with("a.js")));
        assert!(files.iter().any(|f| f.ends_with("x/y/deep.cjs")));
    }

    #[test]
    fn test_sibling_discovery_requires_direct_script() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("with_script")).unwrap();
        fs::write(dir.path().join("with_script/app.js"), "").unwrap();
        fs::create_dir(dir.path().join("no_script")).unwrap();
        fs::write(dir.path().join("no_script/data.json"), "").unwrap();
        fs::create_dir(dir.path().join(DEPENDENCY_CACHE_DIR)).unwrap();
        fs::write(dir.path().join(DEPENDENCY_CACHE_DIR).join("dep.js"), "").unwrap();

        let siblings = sibling_directories(dir.path()).unwrap();
        assert_eq!(siblings, vec![dir.path().join("with_script")]);
    }

    #[test]
    fn test_sibling_discovery_falls_back_to_origin() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();

        let siblings = sibling_directories(dir.path()).unwrap();
        assert_eq!(siblings, vec![dir.path().to_path_buf()]);
    }
}
