use crate::index::Index;
use crate::kvlm::Kvlm;
use crate::object_read::{Object, ObjectKind};
use crate::refs::{ref_resolve, write_ref_file};
use crate::repo::{Repository, ini_get};
use crate::tree::{Tree, TreeLeaf, TreeMode};
use anyhow::{Context, Result, bail};
use chrono::Local;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Fold the index into nested tree objects, deepest directories first,
/// and return the root tree's id.
pub fn tree_from_index(repo: &Repository, index: &Index) -> Result<String> {
    let mut buckets: HashMap<String, Vec<TreeLeaf>> = HashMap::new();
    buckets.insert(String::new(), Vec::new());
    for entry in &index.entries {
        let (dir, base) = split_dir_base(&entry.name);
        // every ancestor directory needs a bucket, even an empty one
        let mut ancestor = dir;
        while !ancestor.is_empty() && !buckets.contains_key(ancestor) {
            buckets.insert(ancestor.to_string(), Vec::new());
            ancestor = split_dir_base(ancestor).0;
        }
        buckets
            .get_mut(dir)
            .expect("bucket was just created")
            .push(TreeLeaf {
                mode: entry.tree_mode()?,
                path: base.to_string(),
                sha: entry.sha.clone(),
            });
    }

    // deepest first, so a parent always sees its finished subtrees
    let mut dirs: Vec<String> = buckets.keys().cloned().collect();
    dirs.sort_by_key(|dir| std::cmp::Reverse(dir.len()));
    for dir in dirs {
        let mut tree = Tree {
            items: buckets.remove(&dir).expect("bucket exists"),
        };
        let payload = tree.serialize()?;
        let sha = Object::from_bytes(ObjectKind::Tree, payload).write_to_repo(repo)?;
        if dir.is_empty() {
            return Ok(sha);
        }
        let (parent, base) = split_dir_base(&dir);
        buckets
            .get_mut(parent)
            .expect("ancestor buckets were created up front")
            .push(TreeLeaf {
                mode: TreeMode::Directory,
                path: base.to_string(),
                sha,
            });
    }
    bail!("index produced no root tree");
}

fn split_dir_base(name: &str) -> (&str, &str) {
    match name.rfind('/') {
        Some(at) => (&name[..at], &name[at + 1..]),
        None => ("", name),
    }
}

/// Write a commit object and return its id. `author` is the
/// `Name <email>` form; the timestamp is unix seconds plus a `±HHMM`
/// offset.
pub fn commit_create(
    repo: &Repository,
    tree: &str,
    parent: Option<&str>,
    author: &str,
    time: i64,
    tz: &str,
    message: &str,
) -> Result<String> {
    let mut kvlm = Kvlm::new();
    kvlm.push(b"tree", tree.as_bytes().to_vec());
    if let Some(parent) = parent {
        kvlm.push(b"parent", parent.as_bytes().to_vec());
    }
    let stamp = format!("{author} {time} {tz}");
    kvlm.push(b"author", stamp.clone().into_bytes());
    kvlm.push(b"committer", stamp.into_bytes());
    let mut body = message.trim().to_string();
    body.push('\n');
    kvlm.body = body.into_bytes();
    Object::from_bytes(ObjectKind::Commit, kvlm.serialize()).write_to_repo(repo)
}

/// Advance the current branch to `sha`, or HEAD itself when detached.
pub fn update_current_branch(repo: &Repository, sha: &str) -> Result<()> {
    match repo.branch_get_active()? {
        Some(branch) => write_ref_file(
            repo,
            &repo.gitdir.join("refs/heads").join(branch),
            &format!("{sha}\n"),
        ),
        None => write_ref_file(repo, &repo.gitdir.join("HEAD"), &format!("{sha}\n")),
    }
}

pub fn git_commit(repo: &Repository, message: &str) -> Result<String> {
    let index = Index::read(repo)?;
    let tree = tree_from_index(repo, &index)?;
    let parent = ref_resolve(repo, "HEAD")?;
    let author = gitconfig_user()?;
    let (time, tz) = local_time_and_offset();
    let sha = commit_create(repo, &tree, parent.as_deref(), &author, time, &tz, message)?;
    update_current_branch(repo, &sha)?;
    Ok(sha)
}

pub(crate) fn local_time_and_offset() -> (i64, String) {
    let now = Local::now();
    let time = now.timestamp();
    let offset_seconds = now.offset().local_minus_utc();
    let hours = offset_seconds / 3600;
    let minutes = offset_seconds.abs() % 3600 / 60;
    let tz = format!("{:+03}{:02}", hours, minutes);
    (time, tz)
}

/// `Name <email>` from the user's git configuration:
/// `$XDG_CONFIG_HOME/git/config` (default `~/.config/git/config`), then
/// `~/.gitconfig`, later files winning per key.
pub(crate) fn gitconfig_user() -> Result<String> {
    let mut name = None;
    let mut email = None;
    for path in gitconfig_paths()? {
        let Ok(text) = fs::read_to_string(&path) else {
            continue;
        };
        if let Some(value) = ini_get(&text, "user", "name") {
            name = Some(value);
        }
        if let Some(value) = ini_get(&text, "user", "email") {
            email = Some(value);
        }
    }
    match (name, email) {
        (Some(name), Some(email)) => Ok(format!("{name} <{email}>")),
        _ => bail!("no identity configured: set user.name and user.email in ~/.gitconfig"),
    }
}

fn gitconfig_paths() -> Result<Vec<PathBuf>> {
    let home = env::home_dir().context("couldn't determine home directory")?;
    let xdg_config = match env::var_os("XDG_CONFIG_HOME") {
        Some(dir) => PathBuf::from(dir),
        None => home.join(".config"),
    };
    Ok(vec![xdg_config.join("git/config"), home.join(".gitconfig")])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::add::add;
    use crate::refs::{object_find, ref_create};
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempdir().unwrap();
        let repo = Repository::create(&dir.path().join("r")).unwrap();
        (dir, repo)
    }

    const AUTHOR: &str = "A U Thor <author@example.com>";

    #[test]
    fn nested_index_folds_into_nested_trees() {
        let (_dir, repo) = test_repo();
        let sub = repo.worktree.join("src/inner");
        fs::create_dir_all(&sub).unwrap();
        fs::write(repo.worktree.join("README"), "top\n").unwrap();
        fs::write(sub.join("deep.rs"), "deep\n").unwrap();
        add(
            &repo,
            &[repo.worktree.join("README"), sub.join("deep.rs")],
        )
        .unwrap();

        let index = Index::read(&repo).unwrap();
        let root_sha = tree_from_index(&repo, &index).unwrap();

        let (kind, payload) = Object::read_payload(&repo, &root_sha).unwrap();
        assert_eq!(kind, ObjectKind::Tree);
        let root = Tree::parse(&payload).unwrap();
        let names: Vec<&String> = root.items.iter().map(|l| &l.path).collect();
        assert_eq!(names, ["README", "src"]);
        let src = root
            .items
            .iter()
            .find(|l| l.path == "src")
            .expect("src subtree");
        assert_eq!(src.mode, TreeMode::Directory);

        let (_, payload) = Object::read_payload(&repo, &src.sha).unwrap();
        let src_tree = Tree::parse(&payload).unwrap();
        assert_eq!(src_tree.items[0].path, "inner");
        assert_eq!(src_tree.items[0].mode, TreeMode::Directory);
    }

    #[test]
    fn commit_records_tree_parent_and_stamps() {
        let (_dir, repo) = test_repo();
        fs::write(repo.worktree.join("a.txt"), "one\n").unwrap();
        add(&repo, &[repo.worktree.join("a.txt")]).unwrap();
        let index = Index::read(&repo).unwrap();
        let tree = tree_from_index(&repo, &index).unwrap();

        let first = commit_create(&repo, &tree, None, AUTHOR, 1700000000, "+0100", "first").unwrap();
        let second =
            commit_create(&repo, &tree, Some(&first), AUTHOR, 1700000100, "+0100", "  second  ")
                .unwrap();

        let (kind, payload) = Object::read_payload(&repo, &second).unwrap();
        assert_eq!(kind, ObjectKind::Commit);
        let kvlm = Kvlm::parse(&payload).unwrap();
        assert_eq!(kvlm.get(b"tree"), Some(tree.as_bytes()));
        assert_eq!(kvlm.get(b"parent"), Some(first.as_bytes()));
        assert_eq!(
            kvlm.get(b"author"),
            Some(format!("{AUTHOR} 1700000100 +0100").as_bytes())
        );
        // the message is stripped and newline-terminated
        assert_eq!(kvlm.body, b"second\n");
    }

    #[test]
    fn branch_advances_while_head_stays_symbolic() {
        let (_dir, repo) = test_repo();
        fs::write(repo.worktree.join("a.txt"), "one\n").unwrap();
        add(&repo, &[repo.worktree.join("a.txt")]).unwrap();
        let index = Index::read(&repo).unwrap();
        let tree = tree_from_index(&repo, &index).unwrap();
        let sha = commit_create(&repo, &tree, None, AUTHOR, 1700000000, "+0000", "first").unwrap();

        update_current_branch(&repo, &sha).unwrap();
        assert_eq!(
            fs::read_to_string(repo.gitdir.join("refs/heads/master")).unwrap(),
            format!("{sha}\n")
        );
        assert_eq!(
            fs::read_to_string(repo.gitdir.join("HEAD")).unwrap(),
            "ref: refs/heads/master\n"
        );
        assert_eq!(object_find(&repo, "HEAD", None, true).unwrap(), sha);
    }

    #[test]
    fn detached_head_advances_in_place() {
        let (_dir, repo) = test_repo();
        fs::write(repo.worktree.join("a.txt"), "one\n").unwrap();
        add(&repo, &[repo.worktree.join("a.txt")]).unwrap();
        let index = Index::read(&repo).unwrap();
        let tree = tree_from_index(&repo, &index).unwrap();
        let first = commit_create(&repo, &tree, None, AUTHOR, 1700000000, "+0000", "first").unwrap();
        ref_create(&repo, "heads/master", &first).unwrap();

        // detach, then advance
        fs::write(repo.gitdir.join("HEAD"), format!("{first}\n")).unwrap();
        let second =
            commit_create(&repo, &tree, Some(&first), AUTHOR, 1700000100, "+0000", "second")
                .unwrap();
        update_current_branch(&repo, &second).unwrap();
        assert_eq!(
            fs::read_to_string(repo.gitdir.join("HEAD")).unwrap(),
            format!("{second}\n")
        );
    }

    #[test]
    fn empty_index_still_produces_a_root_tree() {
        let (_dir, repo) = test_repo();
        let index = Index::read(&repo).unwrap();
        let sha = tree_from_index(&repo, &index).unwrap();
        // the canonical empty tree
        assert_eq!(sha, "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
    }
}
