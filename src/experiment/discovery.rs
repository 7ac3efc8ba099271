//! Run discovery - experiment directories under a sweep root

use std::fs;
use std::path::Path;

use crate::Result;

/// List immediate child directories of `root` whose name starts with
/// `prefix`, sorted lexicographically. No recursion.
///
/// Entries whose names are not valid UTF-8 are skipped.
///
/// # Errors
///
/// Returns error if `root` cannot be read.
pub fn list_runs(root: &Path, prefix: &str) -> Result<Vec<String>> {
    let mut runs = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if name.starts_with(prefix) && entry.path().is_dir() {
            runs.push(name);
        }
    }
    runs.sort();
    Ok(runs)
}
