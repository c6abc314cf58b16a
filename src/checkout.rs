use crate::object_read::{Object, ObjectKind};
use crate::refs::object_find;
use crate::repo::Repository;
use crate::tree::Tree;
use anyhow::{Context, Result, bail, ensure};
use std::fs;
use std::path::Path;

/// Materialize the tree `name` peels to into `dest`, which must be an
/// empty directory or not exist at all.
pub fn git_checkout(repo: &Repository, name: &str, dest: &Path) -> Result<()> {
    let tree_sha = object_find(repo, name, Some(ObjectKind::Tree), true)?;
    let object = Object::read(repo, &tree_sha)?;
    let tree = Tree::parse(&object.payload()?)?;

    if dest.exists() {
        ensure!(dest.is_dir(), "{} is not a directory", dest.display());
        ensure!(
            dest.read_dir()
                .with_context(|| format!("failed to read {}", dest.display()))?
                .next()
                .is_none(),
            "{} is not empty",
            dest.display()
        );
    } else {
        fs::create_dir_all(dest)
            .with_context(|| format!("failed to create {}", dest.display()))?;
    }
    let dest = dest
        .canonicalize()
        .with_context(|| format!("cannot resolve {}", dest.display()))?;
    tree_checkout(repo, &tree, &dest)
}

/// Write every leaf of `tree` under `dest`, recursing into subtrees.
/// Subdirectories must not already exist.
pub fn tree_checkout(repo: &Repository, tree: &Tree, dest: &Path) -> Result<()> {
    for leaf in &tree.items {
        let object = Object::read(repo, &leaf.sha)?;
        let target = dest.join(&leaf.path);
        match object.kind {
            ObjectKind::Tree => {
                fs::create_dir(&target)
                    .with_context(|| format!("failed to create {}", target.display()))?;
                let subtree = Tree::parse(&object.payload()?)?;
                tree_checkout(repo, &subtree, &target)?;
            }
            ObjectKind::Blob => {
                fs::write(&target, object.payload()?)
                    .with_context(|| format!("failed to write {}", target.display()))?;
            }
            other => bail!(
                "cannot checkout a {} entry at {}",
                other.to_str(),
                target.display()
            ),
        }
    }
    Ok(())
}
