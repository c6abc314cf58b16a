use crate::index::Index;
use crate::object_read::{Object, ObjectKind};
use crate::refs::{object_find, object_resolve};
use crate::repo::Repository;
use crate::tree::{Tree, TreeMode};
use anyhow::{Context, Result, ensure};
use ignore::WalkBuilder;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::sink;
use std::os::unix::fs::MetadataExt;

/// Flatten the tree `reference` points at into worktree-relative path →
/// object id. An unborn HEAD flattens to an empty map.
pub fn tree_to_dict(repo: &Repository, reference: &str) -> Result<HashMap<String, String>> {
    let mut out = HashMap::new();
    if object_resolve(repo, reference)?.is_empty() {
        return Ok(out);
    }
    let tree_sha = object_find(repo, reference, Some(ObjectKind::Tree), true)?;
    flatten_tree(repo, &tree_sha, "", &mut out)?;
    Ok(out)
}

fn flatten_tree(
    repo: &Repository,
    tree_sha: &str,
    prefix: &str,
    out: &mut HashMap<String, String>,
) -> Result<()> {
    let object = Object::read(repo, tree_sha)?;
    ensure!(
        object.kind == ObjectKind::Tree,
        "{tree_sha} is a {}, not a tree",
        object.kind.to_str()
    );
    let tree = Tree::parse(&object.payload()?)?;
    for leaf in tree.items {
        let full_path = if prefix.is_empty() {
            leaf.path
        } else {
            format!("{prefix}/{}", leaf.path)
        };
        if leaf.mode == TreeMode::Directory {
            flatten_tree(repo, &leaf.sha, &full_path, out)?;
        } else {
            out.insert(full_path, leaf.sha);
        }
    }
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct StagedChanges {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

/// HEAD tree vs. index: what the next commit would record.
pub fn staged_changes(repo: &Repository, index: &Index) -> Result<StagedChanges> {
    let mut head = tree_to_dict(repo, "HEAD")?;
    let mut changes = StagedChanges::default();
    for entry in &index.entries {
        match head.remove(&entry.name) {
            Some(sha) => {
                if sha != entry.sha {
                    changes.modified.push(entry.name.clone());
                }
            }
            None => changes.added.push(entry.name.clone()),
        }
    }
    changes.deleted = head.into_keys().collect();
    changes.deleted.sort();
    Ok(changes)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct WorktreeChanges {
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
    pub untracked: Vec<String>,
}

/// Index vs. worktree: what is not staged yet. Timestamps gate the
/// content compare, so an untouched file never gets rehashed.
pub fn worktree_changes(repo: &Repository, index: &Index) -> Result<WorktreeChanges> {
    let mut on_disk = walk_worktree(repo)?;
    let mut changes = WorktreeChanges::default();
    for entry in &index.entries {
        let full_path = repo.worktree.join(&entry.name);
        if !full_path.exists() {
            changes.deleted.push(entry.name.clone());
        } else {
            let metadata = fs::metadata(&full_path)
                .with_context(|| format!("failed to stat {}", full_path.display()))?;
            let touched = metadata.ctime() as u32 != entry.ctime_s
                || metadata.ctime_nsec() as u32 != entry.ctime_ns
                || metadata.mtime() as u32 != entry.mtime_s
                || metadata.mtime_nsec() as u32 != entry.mtime_ns;
            if touched {
                let hash = Object::from_blob_file(&full_path)?.write(&mut sink())?;
                if hex::encode(hash) != entry.sha {
                    changes.modified.push(entry.name.clone());
                }
            }
        }
        on_disk.remove(&entry.name);
    }
    changes.untracked = on_disk.into_iter().collect();
    changes.untracked.sort();
    Ok(changes)
}

/// Every file under the worktree, relative, excluding the control
/// directory.
fn walk_worktree(repo: &Repository) -> Result<HashSet<String>> {
    let walker = WalkBuilder::new(&repo.worktree).hidden(false).build();
    let mut files = HashSet::new();
    for entry in walker {
        let entry = entry.context("failed to walk the worktree")?;
        if entry.depth() == 0 || entry.path().starts_with(&repo.gitdir) {
            continue;
        }
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(&repo.worktree)
            .context("walked path is outside the worktree")?;
        let rel = rel
            .to_str()
            .context("worktree path is not valid UTF-8")?
            .to_string();
        files.insert(rel);
    }
    Ok(files)
}

pub fn git_status(repo: &Repository) -> Result<()> {
    let index = Index::read(repo)?;
    match repo.branch_get_active()? {
        Some(branch) => println!("On branch {branch}"),
        None => println!(
            "HEAD detached at {}",
            object_find(repo, "HEAD", None, true)?
        ),
    }
    let staged = staged_changes(repo, &index)?;
    println!();
    println!("Changes to be committed:");
    for name in &staged.added {
        println!("  added:    {name}");
    }
    for name in &staged.modified {
        println!("  modified: {name}");
    }
    for name in &staged.deleted {
        println!("  deleted:  {name}");
    }
    let unstaged = worktree_changes(repo, &index)?;
    println!();
    println!("Changes not staged for commit:");
    for name in &unstaged.modified {
        println!("  modified: {name}");
    }
    for name in &unstaged.deleted {
        println!("  deleted:  {name}");
    }
    println!();
    println!("Untracked files:");
    for name in &unstaged.untracked {
        println!("  {name}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::add::add;
    use crate::commit::{commit_create, tree_from_index};
    use crate::refs::ref_create;
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempdir().unwrap();
        let repo = Repository::create(&dir.path().join("r")).unwrap();
        (dir, repo)
    }

    fn commit_all(repo: &Repository) {
        let index = Index::read(repo).unwrap();
        let tree = tree_from_index(repo, &index).unwrap();
        let parent = crate::refs::ref_resolve(repo, "HEAD").unwrap();
        let sha = commit_create(
            repo,
            &tree,
            parent.as_deref(),
            "A U Thor <author@example.com>",
            1700000000,
            "+0000",
            "snapshot",
        )
        .unwrap();
        ref_create(repo, "heads/master", &sha).unwrap();
    }

    #[test]
    fn fresh_file_is_untracked_then_added_then_clean() {
        let (_dir, repo) = test_repo();
        fs::write(repo.worktree.join("a.txt"), "hello\n").unwrap();

        let index = Index::read(&repo).unwrap();
        let unstaged = worktree_changes(&repo, &index).unwrap();
        assert_eq!(unstaged.untracked, vec!["a.txt"]);

        add(&repo, &[repo.worktree.join("a.txt")]).unwrap();
        let index = Index::read(&repo).unwrap();
        let staged = staged_changes(&repo, &index).unwrap();
        assert_eq!(staged.added, vec!["a.txt"]);

        commit_all(&repo);
        let index = Index::read(&repo).unwrap();
        let staged = staged_changes(&repo, &index).unwrap();
        assert_eq!(staged, StagedChanges::default());
        let unstaged = worktree_changes(&repo, &index).unwrap();
        assert_eq!(unstaged, WorktreeChanges::default());
    }

    #[test]
    fn touching_a_file_without_changing_it_reports_nothing() {
        let (_dir, repo) = test_repo();
        let file = repo.worktree.join("a.txt");
        fs::write(&file, "hello\n").unwrap();
        add(&repo, &[file.clone()]).unwrap();
        commit_all(&repo);

        // rewrite identical bytes so only the timestamps move
        sleep(Duration::from_millis(20));
        fs::write(&file, "hello\n").unwrap();

        let index = Index::read(&repo).unwrap();
        let unstaged = worktree_changes(&repo, &index).unwrap();
        assert_eq!(unstaged, WorktreeChanges::default());
    }

    #[test]
    fn edits_deletions_and_strays_are_reported() {
        let (_dir, repo) = test_repo();
        fs::write(repo.worktree.join("keep.txt"), "keep\n").unwrap();
        fs::write(repo.worktree.join("gone.txt"), "gone\n").unwrap();
        add(
            &repo,
            &[
                repo.worktree.join("keep.txt"),
                repo.worktree.join("gone.txt"),
            ],
        )
        .unwrap();
        commit_all(&repo);

        sleep(Duration::from_millis(20));
        fs::write(repo.worktree.join("keep.txt"), "changed\n").unwrap();
        fs::remove_file(repo.worktree.join("gone.txt")).unwrap();
        fs::write(repo.worktree.join("new.txt"), "new\n").unwrap();

        let index = Index::read(&repo).unwrap();
        let unstaged = worktree_changes(&repo, &index).unwrap();
        assert_eq!(unstaged.modified, vec!["keep.txt"]);
        assert_eq!(unstaged.deleted, vec!["gone.txt"]);
        assert_eq!(unstaged.untracked, vec!["new.txt"]);
    }

    #[test]
    fn head_deletions_show_after_rm_from_index() {
        let (_dir, repo) = test_repo();
        let file = repo.worktree.join("a.txt");
        fs::write(&file, "hello\n").unwrap();
        add(&repo, &[file.clone()]).unwrap();
        commit_all(&repo);

        crate::rm::rm(&repo, &[file], true, false).unwrap();
        let index = Index::read(&repo).unwrap();
        let staged = staged_changes(&repo, &index).unwrap();
        assert_eq!(staged.deleted, vec!["a.txt"]);
    }

    #[test]
    fn nested_trees_flatten_to_full_paths() {
        let (_dir, repo) = test_repo();
        let sub = repo.worktree.join("src");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("lib.rs"), "pub fn f() {}\n").unwrap();
        fs::write(repo.worktree.join("README"), "read\n").unwrap();
        add(
            &repo,
            &[sub.join("lib.rs"), repo.worktree.join("README")],
        )
        .unwrap();
        commit_all(&repo);

        let map = tree_to_dict(&repo, "HEAD").unwrap();
        let mut paths: Vec<&String> = map.keys().collect();
        paths.sort();
        assert_eq!(paths, ["README", "src/lib.rs"]);
    }

    #[test]
    fn unborn_head_flattens_to_empty() {
        let (_dir, repo) = test_repo();
        assert!(tree_to_dict(&repo, "HEAD").unwrap().is_empty());
    }
}
