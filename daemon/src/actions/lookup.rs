//! Resolving spoken names to files, folders and applications

use std::path::{Path, PathBuf};

use tracing::trace;
use walkdir::{DirEntry, WalkDir};

/// Extensions tried after the bare-name pass
const APP_EXTENSIONS: &[&str] = &[".exe", ".lnk", ".app", ".desktop"];

/// Directory depth searched below each location
const MAX_DEPTH: usize = 6;

/// Locations searched by name, in priority order
pub fn default_search_dirs(home: &Path) -> Vec<PathBuf> {
    let mut dirs = vec![
        home.join("Desktop"),
        home.join("Documents"),
        home.join("Downloads"),
    ];

    if cfg!(windows) {
        dirs.push(PathBuf::from("C:\\Program Files"));
        dirs.push(PathBuf::from("C:\\Program Files (x86)"));
    } else if cfg!(target_os = "macos") {
        dirs.push(PathBuf::from("/Applications"));
    } else {
        dirs.push(PathBuf::from("/usr/share/applications"));
    }

    dirs.push(home.to_path_buf());
    dirs
}

/// Find what "open `target`" refers to
///
/// An existing path (relative paths against `base`, `~` against `home`)
/// wins. Otherwise each search location is walked for an entry whose name
/// starts with `target`, then for `target` plus an application extension.
/// Names compare case-insensitively.
pub fn resolve_target(
    target: &str,
    base: &Path,
    home: &Path,
    search_dirs: &[PathBuf],
) -> Option<PathBuf> {
    let target = target.trim();
    if target.is_empty() {
        return None;
    }

    let direct = expand(target, base, home);
    if direct.exists() {
        return Some(direct);
    }

    let wanted = target.to_lowercase();
    for location in search_dirs.iter().filter(|d| d.is_dir()) {
        trace!(location = %location.display(), target, "searching");

        if let Some(found) = walk(location).find(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.to_lowercase().starts_with(&wanted))
        }) {
            return Some(found.into_path());
        }

        for ext in APP_EXTENSIONS {
            let exact = format!("{wanted}{ext}");
            if let Some(found) = walk(location).find(|entry| {
                entry.file_type().is_file()
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| name.to_lowercase() == exact)
            }) {
                return Some(found.into_path());
            }
        }
    }

    None
}

fn expand(target: &str, base: &Path, home: &Path) -> PathBuf {
    if let Some(rest) = target.strip_prefix("~/") {
        return home.join(rest);
    }
    if target == "~" {
        return home.to_path_buf();
    }
    let path = Path::new(target);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn walk(location: &Path) -> impl Iterator<Item = DirEntry> {
    WalkDir::new(location)
        .min_depth(1)
        .max_depth(MAX_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|e| e.ok())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|s| s.starts_with('.'))
}
