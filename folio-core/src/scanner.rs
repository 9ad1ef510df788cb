use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Every `*.md` file below `dir`, ordered by path relative to `dir`.
///
/// The order never depends on what the filesystem happens to return. A
/// missing directory simply has no files.
pub fn collection_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, walkdir::Error> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && is_markdown(entry.path()) {
            paths.push(entry.into_path());
        }
    }

    // sort_by_file_name orders siblings only; flatten to a total order.
    paths.sort_by(|a, b| a.strip_prefix(dir).ok().cmp(&b.strip_prefix(dir).ok()));
    Ok(paths)
}

fn is_markdown(path: &Path) -> bool {
    path.extension().map(|ext| ext == "md").unwrap_or(false)
}
