//! Filesystem access for builds: discovery, reads, writes, and output cleanup.
//!
//! Every I/O failure surfaces as an [`ErrorKind::File`] error carrying the
//! offending path. Deciding whether a failure is fatal is left to callers.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Chainable, Error, ErrorKind, Result};

/// Lists every file under `root` with one of `exts`, sorted by path.
///
/// A missing `root` yields no files.
pub fn discover(root: &Path, exts: &[&str]) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Ok(vec![]);
    }

    let mut files = vec![];
    for entry in walk(root).skip_hidden(false) {
        let entry = entry.map_err(|e| Error::from_std(e).with_kind(ErrorKind::File))
            .chain_with(|| error! {
                "failed to list directory",
                "path" => root.display(),
            })?;

        if !entry.file_type.is_file() {
            continue;
        }

        let path = entry.path();
        if is_hidden(root, &path) {
            continue;
        }

        let known = path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| exts.iter().any(|e| e.eq_ignore_ascii_case(ext)));

        if known {
            files.push(path);
        } else {
            tracing::debug!(path = %path.display(), "skipping file with unknown extension");
        }
    }

    files.sort();
    Ok(files)
}

pub fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).chain_with(|| error! {
        "failed to open file for reading",
        "path" => path.display(),
    })
}

/// Writes `contents` to `path`, creating parent directories as needed.
pub fn write(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).chain_with(|| error! {
            "failed to create output directory",
            "path" => parent.display(),
        })?;
    }

    fs::write(path, contents).chain_with(|| error! {
        "failed to open/create file for writing",
        "path" => path.display(),
    })
}

/// Empties (or creates) the output directory `output`.
///
/// Refuses to touch a directory that contains `project`.
pub fn clean(output: &Path, project: &Path) -> Result<()> {
    let (out, proj) = (absolute(output), absolute(project));
    if proj.starts_with(&out) {
        return Err(error! {
            "refusing to clean an output directory that contains the project",
            "output" => output.display(),
            "project" => project.display(),
        }.with_kind(ErrorKind::File));
    }

    if output.exists() {
        fs::remove_dir_all(output).chain_with(|| error! {
            "failed to clean output directory",
            "path" => output.display(),
        })?;
    }

    fs::create_dir_all(output).chain_with(|| error! {
        "failed to create output directory",
        "path" => output.display(),
    })
}

/// Copies every regular file under `from` into `to`, preserving layout.
/// Returns the destination paths written.
pub fn copy_tree(from: &Path, to: &Path) -> Result<Vec<PathBuf>> {
    if !from.is_dir() {
        return Ok(vec![]);
    }

    let mut written = vec![];
    for entry in walk(from) {
        let entry = entry.map_err(|e| Error::from_std(e).with_kind(ErrorKind::File))?;
        if !entry.file_type.is_file() {
            continue;
        }

        let source = entry.path();
        let Ok(relative) = source.strip_prefix(from) else {
            continue;
        };

        let destination = to.join(relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).chain_with(|| error! {
                "failed to create asset directory",
                "path" => parent.display(),
            })?;
        }

        fs::copy(&source, &destination).chain_with(|| error! {
            "failed to copy asset",
            "source path" => source.display(),
            "destination path" => destination.display(),
        })?;

        written.push(destination);
    }

    Ok(written)
}

/// Walks on the calling thread: builds call this from inside worker pools,
/// where a walker waiting on the pool would never be scheduled.
fn walk(root: &Path) -> jwalk::WalkDir {
    jwalk::WalkDir::new(root)
        .parallelism(jwalk::Parallelism::Serial)
        .follow_links(true)
        .sort(true)
}

fn is_hidden(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root)
        .map(|rel| rel.components().any(|c| c.as_os_str().to_string_lossy().starts_with('.')))
        .unwrap_or(false)
}

fn absolute(path: &Path) -> PathBuf {
    path.canonicalize()
        .or_else(|_| std::env::current_dir().map(|cwd| cwd.join(path)))
        .unwrap_or_else(|_| path.to_path_buf())
}
