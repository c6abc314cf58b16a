use anyhow::{Context, Result, bail, ensure};
use std::fs;
use std::path::{Path, PathBuf};

/// A repository handle: the worktree and its `.git` control directory.
///
/// Both paths are canonical, so worktree-containment checks are plain
/// prefix tests.
pub struct Repository {
    pub worktree: PathBuf,
    pub gitdir: PathBuf,
}

impl Repository {
    /// Locate the repository containing the current directory.
    pub fn find() -> Result<Repository> {
        Repository::find_from(Path::new("."))
    }

    /// Walk from `start` towards the filesystem root looking for `.git`.
    pub fn find_from(start: &Path) -> Result<Repository> {
        let mut dir = start
            .canonicalize()
            .with_context(|| format!("cannot resolve {}", start.display()))?;
        loop {
            if dir.join(".git").is_dir() {
                return Repository::open(&dir);
            }
            if !dir.pop() {
                bail!("not a git repository (or any of its parent directories)");
            }
        }
    }

    /// Open an existing repository rooted at `worktree` and validate its
    /// configuration.
    pub fn open(worktree: &Path) -> Result<Repository> {
        let worktree = worktree
            .canonicalize()
            .with_context(|| format!("cannot resolve {}", worktree.display()))?;
        let gitdir = worktree.join(".git");
        ensure!(gitdir.is_dir(), "no .git directory in {}", worktree.display());
        let config = fs::read_to_string(gitdir.join("config"))
            .with_context(|| format!("failed to read {}", gitdir.join("config").display()))?;
        let version = ini_get(&config, "core", "repositoryformatversion")
            .context("config has no core.repositoryformatversion")?;
        ensure!(
            version == "0",
            "unsupported repositoryformatversion: {version}"
        );
        Ok(Repository { worktree, gitdir })
    }

    /// Create a fresh repository at `path`, which must be an empty
    /// directory or not exist at all.
    pub fn create(path: &Path) -> Result<Repository> {
        if path.exists() {
            ensure!(path.is_dir(), "{} is not a directory", path.display());
            ensure!(
                path.read_dir()
                    .with_context(|| format!("failed to read {}", path.display()))?
                    .next()
                    .is_none(),
                "{} is not empty",
                path.display()
            );
        } else {
            fs::create_dir_all(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
        }
        let worktree = path
            .canonicalize()
            .with_context(|| format!("cannot resolve {}", path.display()))?;
        let gitdir = worktree.join(".git");
        for dir in [
            "branches",
            "objects",
            "refs/tags",
            "refs/heads",
        ] {
            fs::create_dir_all(gitdir.join(dir))
                .with_context(|| format!("failed to create .git/{dir}"))?;
        }
        fs::write(
            gitdir.join("description"),
            "Unnamed repository; edit this file 'description' to name the repository.\n",
        )
        .context("failed to write description")?;
        fs::write(
            gitdir.join("config"),
            "[core]\nrepositoryformatversion = 0\nfilemode = false\nbare = false\n",
        )
        .context("failed to write config")?;
        fs::write(gitdir.join("HEAD"), "ref: refs/heads/master\n")
            .context("failed to write HEAD")?;
        Ok(Repository { worktree, gitdir })
    }

    /// The branch HEAD points at, or `None` when HEAD is detached.
    pub fn branch_get_active(&self) -> Result<Option<String>> {
        let head = fs::read_to_string(self.gitdir.join("HEAD")).context("failed to read HEAD")?;
        Ok(head
            .strip_prefix("ref: refs/heads/")
            .map(|branch| branch.trim_end().to_string()))
    }
}

/// Minimal INI lookup: `key = value` lines under a `[section]` header.
/// Both the repository config and user gitconfig files use this shape.
pub(crate) fn ini_get(text: &str, section: &str, key: &str) -> Option<String> {
    let mut in_section = false;
    for line in text.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_section = line == format!("[{section}]");
        } else if in_section {
            if let Some((k, v)) = line.split_once('=') {
                if k.trim() == key {
                    return Some(v.trim().to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_lays_out_control_directory() {
        let dir = tempdir().unwrap();
        let repo = Repository::create(&dir.path().join("r")).unwrap();
        assert!(repo.gitdir.join("objects").is_dir());
        assert!(repo.gitdir.join("refs/heads").is_dir());
        assert!(repo.gitdir.join("refs/tags").is_dir());
        assert!(repo.gitdir.join("branches").is_dir());
        let head = fs::read_to_string(repo.gitdir.join("HEAD")).unwrap();
        assert_eq!(head, "ref: refs/heads/master\n");
    }

    #[test]
    fn create_refuses_nonempty_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("stray"), "x").unwrap();
        assert!(Repository::create(dir.path()).is_err());
    }

    #[test]
    fn find_walks_up_from_a_subdirectory() {
        let dir = tempdir().unwrap();
        let repo = Repository::create(&dir.path().join("r")).unwrap();
        let nested = repo.worktree.join("a/b");
        fs::create_dir_all(&nested).unwrap();
        let found = Repository::find_from(&nested).unwrap();
        assert_eq!(found.worktree, repo.worktree);
    }

    #[test]
    fn find_fails_outside_any_repository() {
        let dir = tempdir().unwrap();
        assert!(Repository::find_from(dir.path()).is_err());
    }

    #[test]
    fn open_rejects_unsupported_format_version() {
        let dir = tempdir().unwrap();
        let repo = Repository::create(&dir.path().join("r")).unwrap();
        fs::write(
            repo.gitdir.join("config"),
            "[core]\nrepositoryformatversion = 1\n",
        )
        .unwrap();
        assert!(Repository::open(&repo.worktree).is_err());
    }

    #[test]
    fn active_branch_is_none_when_detached() {
        let dir = tempdir().unwrap();
        let repo = Repository::create(&dir.path().join("r")).unwrap();
        assert_eq!(repo.branch_get_active().unwrap().as_deref(), Some("master"));
        fs::write(
            repo.gitdir.join("HEAD"),
            "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391\n",
        )
        .unwrap();
        assert_eq!(repo.branch_get_active().unwrap(), None);
    }

    #[test]
    fn ini_lookup_is_section_aware() {
        let text = "[core]\nname = wrong\n[user]\nname = Ada\nemail = ada@example.com\n";
        assert_eq!(ini_get(text, "user", "name").as_deref(), Some("Ada"));
        assert_eq!(ini_get(text, "core", "name").as_deref(), Some("wrong"));
        assert_eq!(ini_get(text, "user", "missing"), None);
    }
}
