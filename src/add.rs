use crate::index::{Index, IndexEntry, MODE_TYPE_REGULAR};
use crate::object_read::Object;
use crate::repo::Repository;
use crate::rm::rm;
use anyhow::{Context, Result, ensure};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;

/// Stage `paths`: store each file as a blob and record it in the index
/// under its worktree-relative name, replacing any previous entry.
pub fn add(repo: &Repository, paths: &[PathBuf]) -> Result<()> {
    // clear stale entries for the same names first
    rm(repo, paths, false, true)?;

    let mut index = Index::read(repo)?;
    for path in paths {
        let abspath = path
            .canonicalize()
            .with_context(|| format!("cannot resolve {}", path.display()))?;
        ensure!(
            abspath.starts_with(&repo.worktree) && abspath.is_file(),
            "not a file, or outside the worktree: {}",
            path.display()
        );
        let name = abspath
            .strip_prefix(&repo.worktree)
            .expect("checked to be under the worktree")
            .to_str()
            .context("path is not valid UTF-8")?
            .to_string();

        let sha = Object::from_blob_file(&abspath)?.write_to_repo(repo)?;
        let metadata = fs::metadata(&abspath)
            .with_context(|| format!("failed to stat {}", abspath.display()))?;
        index.entries.push(IndexEntry {
            ctime_s: metadata.ctime() as u32,
            ctime_ns: metadata.ctime_nsec() as u32,
            mtime_s: metadata.mtime() as u32,
            mtime_ns: metadata.mtime_nsec() as u32,
            dev: metadata.dev() as u32,
            ino: metadata.ino() as u32,
            mode_type: MODE_TYPE_REGULAR,
            mode_perms: 0o644,
            uid: metadata.uid(),
            gid: metadata.gid(),
            fsize: metadata.size() as u32,
            sha,
            flag_assume_valid: false,
            flag_stage: 0,
            name,
        });
    }
    index.write(repo)
}
