use crate::repo::Repository;
use anyhow::Result;
use std::path::Path;

pub fn git_init(path: &Path) -> Result<()> {
    let repo = Repository::create(path)?;
    println!("Initialized empty repository in {}", repo.gitdir.display());
    Ok(())
}
