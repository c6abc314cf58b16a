use crate::object_read::{Object, ObjectKind};
use crate::refs::object_find;
use crate::repo::Repository;
use crate::tree::Tree;
use anyhow::{Context, Result};
use std::io::{Write, stdout};

/// List the entries of the tree `name` peels to, one per line:
/// `<mode> <kind> <id>    <name>`, or just the name with `--name-only`.
pub fn git_ls_tree(repo: &Repository, name_only: bool, name: &str) -> Result<()> {
    let sha = object_find(repo, name, Some(ObjectKind::Tree), true)?;
    let object = Object::read(repo, &sha)?;
    let tree = Tree::parse(&object.payload()?)?;
    let mut sout = stdout().lock();
    for leaf in &tree.items {
        let line = if name_only {
            format!("{}\n", leaf.path)
        } else {
            format!(
                "{} {} {}    {}\n",
                leaf.mode.octal(),
                leaf.mode.object_kind().to_str(),
                leaf.sha,
                leaf.path
            )
        };
        sout.write_all(line.as_bytes())
            .context("write to stdout failed")?;
    }
    Ok(())
}
