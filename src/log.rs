use crate::kvlm::Kvlm;
use crate::object_read::{Object, ObjectKind};
use crate::refs::object_find;
use crate::repo::Repository;
use anyhow::{Context, Result, ensure};
use std::collections::HashSet;
use std::io::{Write, stdout};

/// Walk the ancestry of `name`, printing one line per commit: the short
/// id and the first line of the message.
pub fn git_log(repo: &Repository, name: &str) -> Result<()> {
    let start = object_find(repo, name, Some(ObjectKind::Commit), true)?;
    let mut sout = stdout().lock();
    for (sha, summary) in walk_ancestry(repo, start)? {
        writeln!(sout, "{} {}", &sha[..7], summary).context("write to stdout failed")?;
    }
    Ok(())
}

/// Every commit reachable from `start`, visited exactly once even
/// through merge topologies.
fn walk_ancestry(repo: &Repository, start: String) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    let mut pending = vec![start];
    let mut seen = HashSet::new();
    while let Some(sha) = pending.pop() {
        if !seen.insert(sha.clone()) {
            continue;
        }
        let object = Object::read(repo, &sha)?;
        ensure!(
            object.kind == ObjectKind::Commit,
            "{sha} is a {}, not a commit",
            object.kind.to_str()
        );
        let kvlm = Kvlm::parse(&object.payload()?)?;
        let message = String::from_utf8_lossy(&kvlm.body);
        let summary = message.lines().next().unwrap_or("").trim().to_string();
        // parents go on the stack in reverse so the first parent is
        // walked first
        for parent in kvlm.get_all(b"parent").iter().rev() {
            let parent = String::from_utf8(parent.clone())
                .context("parent id is not valid UTF-8")?;
            pending.push(parent);
        }
        out.push((sha, summary));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::add::add;
    use crate::commit::{commit_create, tree_from_index};
    use crate::index::Index;
    use crate::refs::ref_create;
    use std::fs;
    use tempfile::tempdir;

    const AUTHOR: &str = "A U Thor <author@example.com>";

    fn test_repo() -> (tempfile::TempDir, Repository, String) {
        let dir = tempdir().unwrap();
        let repo = Repository::create(&dir.path().join("r")).unwrap();
        fs::write(repo.worktree.join("a.txt"), "hello\n").unwrap();
        add(&repo, &[repo.worktree.join("a.txt")]).unwrap();
        let index = Index::read(&repo).unwrap();
        let tree = tree_from_index(&repo, &index).unwrap();
        (dir, repo, tree)
    }

    #[test]
    fn single_commit_walks_to_one_line() {
        let (_dir, repo, tree) = test_repo();
        let sha = commit_create(&repo, &tree, None, AUTHOR, 1700000000, "+0000", "first").unwrap();
        ref_create(&repo, "heads/master", &sha).unwrap();
        let walked = walk_ancestry(&repo, sha.clone()).unwrap();
        assert_eq!(walked, vec![(sha, "first".to_string())]);
    }

    #[test]
    fn merge_topology_visits_each_commit_once() {
        let (_dir, repo, tree) = test_repo();
        let root = commit_create(&repo, &tree, None, AUTHOR, 1700000000, "+0000", "root").unwrap();
        let left =
            commit_create(&repo, &tree, Some(&root), AUTHOR, 1700000100, "+0000", "left").unwrap();
        let right =
            commit_create(&repo, &tree, Some(&root), AUTHOR, 1700000200, "+0000", "right").unwrap();
        // a merge commit carries two parent headers
        let merge = {
            let mut kvlm = Kvlm::new();
            kvlm.push(b"tree", tree.clone().into_bytes());
            kvlm.push(b"parent", left.clone().into_bytes());
            kvlm.push(b"parent", right.clone().into_bytes());
            kvlm.push(b"author", format!("{AUTHOR} 1700000300 +0000").into_bytes());
            kvlm.push(b"committer", format!("{AUTHOR} 1700000300 +0000").into_bytes());
            kvlm.body = b"merge\n".to_vec();
            Object::from_bytes(ObjectKind::Commit, kvlm.serialize())
                .write_to_repo(&repo)
                .unwrap()
        };

        let walked = walk_ancestry(&repo, merge.clone()).unwrap();
        let shas: Vec<&String> = walked.iter().map(|(sha, _)| sha).collect();
        assert_eq!(walked.len(), 4);
        assert_eq!(shas[0], &merge);
        // the shared root appears exactly once
        assert_eq!(walked.iter().filter(|(sha, _)| *sha == root).count(), 1);
        assert!(shas.contains(&&left) && shas.contains(&&right));
    }

    #[test]
    fn first_message_line_is_the_summary() {
        let (_dir, repo, tree) = test_repo();
        let sha = commit_create(
            &repo,
            &tree,
            None,
            AUTHOR,
            1700000000,
            "+0000",
            "summary line\n\nlong explanation\n",
        )
        .unwrap();
        let walked = walk_ancestry(&repo, sha).unwrap();
        assert_eq!(walked[0].1, "summary line");
    }
}
