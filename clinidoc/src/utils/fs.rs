//! Filesystem helpers for staging and publishing run output.
//!
//! Artifacts are written somewhere private first and renamed into place, so
//! a reader of the output directory never sees a half-written file.

use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use uuid::Uuid;

#[allow(clippy::expect_used)]
fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[/\\:*?"<>|\s]+"#).expect("valid file-name pattern"))
}

/// Replaces characters that are unsafe in file names with `_`.
///
/// Leading and trailing underscores are trimmed; an empty result becomes
/// `fallback`.
#[must_use]
pub fn sanitize_file_stem(raw: &str, fallback: &str) -> String {
    let cleaned = unsafe_chars().replace_all(raw.trim(), "_");
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Writes `contents` to `path` via a sibling temp file and a rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let tmp = parent.join(format!(".{file_name}.tmp-{}", Uuid::new_v4().simple()));

    if let Err(e) = fs::write(&tmp, contents) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        e
    })
}

/// Moves every top-level entry of `staging` into `dest`.
///
/// Files replace same-named files in `dest`. Directories are merged into an
/// existing directory of the same name, so output published earlier by
/// another stage is never removed. Returns the published top-level paths
/// keyed by their original staging path.
pub fn publish_dir_contents(staging: &Path, dest: &Path) -> io::Result<Vec<(PathBuf, PathBuf)>> {
    fs::create_dir_all(dest)?;
    let mut moved = Vec::new();

    for entry in sorted_entries(staging)? {
        let from = entry.path();
        let to = dest.join(entry.file_name());
        publish_entry(&from, &to)?;
        moved.push((from, to));
    }

    Ok(moved)
}

fn sorted_entries(dir: &Path) -> io::Result<Vec<fs::DirEntry>> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(fs::DirEntry::file_name);
    Ok(entries)
}

fn publish_entry(from: &Path, to: &Path) -> io::Result<()> {
    if !from.is_dir() {
        return fs::rename(from, to);
    }
    if !to.exists() {
        match fs::rename(from, to) {
            Ok(()) => return Ok(()),
            // another stage created it in the meantime
            Err(_) if to.is_dir() => {}
            Err(e) => return Err(e),
        }
    }
    if !to.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("'{}' exists and is not a directory", to.display()),
        ));
    }
    for entry in sorted_entries(from)? {
        publish_entry(&entry.path(), &to.join(entry.file_name()))?;
    }
    fs::remove_dir(from)
}
