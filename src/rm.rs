use crate::index::Index;
use crate::repo::Repository;
use anyhow::{Context, Result, ensure};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Drop `paths` from the index. `delete` also unlinks them from the
/// worktree; `skip_missing` tolerates paths with no index entry (used
/// by `add` to clear stale entries before re-adding).
pub fn rm(repo: &Repository, paths: &[PathBuf], delete: bool, skip_missing: bool) -> Result<()> {
    let mut index = Index::read(repo)?;

    let mut targets = HashSet::new();
    for path in paths {
        let abspath = absolute_path(path)?;
        ensure!(
            abspath.starts_with(&repo.worktree),
            "cannot remove path outside of worktree: {}",
            path.display()
        );
        targets.insert(abspath);
    }

    let mut kept = Vec::new();
    let mut removed = Vec::new();
    for entry in index.entries {
        let full_path = repo.worktree.join(&entry.name);
        if targets.remove(&full_path) {
            removed.push(full_path);
        } else {
            kept.push(entry);
        }
    }
    ensure!(
        targets.is_empty() || skip_missing,
        "cannot remove paths not in the index: {}",
        targets
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    if delete {
        for path in &removed {
            fs::remove_file(path)
                .with_context(|| format!("failed to unlink {}", path.display()))?;
        }
    }
    index.entries = kept;
    index.write(repo)
}

pub fn git_rm(repo: &Repository, paths: &[PathBuf]) -> Result<()> {
    rm(repo, paths, true, false)
}

/// An existing file canonicalizes; a deleted one still needs an
/// absolute form to match its index entry.
fn absolute_path(path: &Path) -> Result<PathBuf> {
    match path.canonicalize() {
        Ok(resolved) => Ok(resolved),
        Err(_) => std::path::absolute(path)
            .with_context(|| format!("cannot resolve {}", path.display())),
    }
}
