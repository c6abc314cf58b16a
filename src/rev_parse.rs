use crate::object_read::ObjectKind;
use crate::refs::object_find;
use crate::repo::Repository;
use anyhow::Result;

/// Print the full object id `name` resolves to, peeled to `kind` when
/// one is requested.
pub fn git_rev_parse(repo: &Repository, kind: Option<&str>, name: &str) -> Result<()> {
    let target = kind.map(ObjectKind::from_str).transpose()?;
    let sha = object_find(repo, name, target, true)?;
    println!("{sha}");
    Ok(())
}
