use crate::object_read::{Object, ObjectKind};
use crate::refs::object_find;
use crate::repo::Repository;
use anyhow::{Context, Result, ensure};
use std::io::{Read, copy, stdout};

/// Resolve `name` to an object of `kind` and stream its payload to
/// stdout.
pub fn git_cat_file(repo: &Repository, kind: &str, name: &str) -> Result<()> {
    let kind = ObjectKind::from_str(kind)?;
    let sha = object_find(repo, name, Some(kind), true)?;
    let mut object = Object::read(repo, &sha)?;
    let size = object.expected_size;
    let mut sout = stdout().lock();
    // Read at most the framed size.
    // Protect against zipbomb.
    let copied = copy(&mut (&mut object.reader).take(size), &mut sout)
        .context("write to stdout failed")?;
    ensure!(
        copied == size,
        "object size mismatch, expected {}, got {}",
        size,
        copied
    );
    Ok(())
}
