use crate::kvlm::Kvlm;
use crate::object_read::{Object, ObjectKind};
use crate::repo::Repository;
use anyhow::{Context, Result, anyhow, bail, ensure};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

// A symbolic chain longer than this is a loop.
const MAX_SYMREF_DEPTH: usize = 16;

/// Follow `reference` (a path under the git directory, e.g. `HEAD` or
/// `refs/heads/master`) to a direct object id. A missing file resolves
/// to `None`.
pub fn ref_resolve(repo: &Repository, reference: &str) -> Result<Option<String>> {
    let mut name = reference.to_string();
    for _ in 0..MAX_SYMREF_DEPTH {
        let path = repo.gitdir.join(&name);
        if !path.is_file() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed to read ref {name}"))?;
        let data = data.trim_end_matches('\n');
        match data.strip_prefix("ref: ") {
            Some(target) => name = target.to_string(),
            None => return Ok(Some(data.to_string())),
        }
    }
    bail!("symbolic reference loop while resolving {reference}");
}

pub enum RefNode {
    Direct(Option<String>),
    Nested(BTreeMap<String, RefNode>),
}

/// All references under `refs/`, as a sorted tree of resolved ids.
pub fn ref_list(repo: &Repository) -> Result<BTreeMap<String, RefNode>> {
    ref_list_dir(repo, &repo.gitdir.join("refs"), "refs")
}

fn ref_list_dir(repo: &Repository, dir: &Path, prefix: &str) -> Result<BTreeMap<String, RefNode>> {
    let mut out = BTreeMap::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let entry = entry?;
        let name = entry
            .file_name()
            .into_string()
            .map_err(|n| anyhow!("ref name is not valid UTF-8: {n:?}"))?;
        let node = if entry.file_type()?.is_dir() {
            RefNode::Nested(ref_list_dir(repo, &entry.path(), &format!("{prefix}/{name}"))?)
        } else {
            RefNode::Direct(ref_resolve(repo, &format!("{prefix}/{name}"))?)
        };
        out.insert(name, node);
    }
    Ok(out)
}

/// Write a direct reference at `refs/<name>`.
pub fn ref_create(repo: &Repository, name: &str, sha: &str) -> Result<()> {
    let path = repo.gitdir.join("refs").join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    write_ref_file(repo, &path, &format!("{sha}\n"))
}

/// Replace a ref file atomically.
pub(crate) fn write_ref_file(repo: &Repository, path: &Path, content: &str) -> Result<()> {
    let mut tmp_file =
        NamedTempFile::new_in(&repo.gitdir).context("creating temporary ref file")?;
    tmp_file
        .write_all(content.as_bytes())
        .context("writing temporary ref file")?;
    tmp_file
        .persist(path)
        .with_context(|| format!("persisting {}", path.display()))?;
    Ok(())
}

/// Expand a user-supplied name into candidate object ids: the literal
/// `HEAD`, an abbreviated hex id, or a tag, branch or remote name.
pub fn object_resolve(repo: &Repository, name: &str) -> Result<Vec<String>> {
    let mut candidates = Vec::new();
    if name.trim().is_empty() {
        return Ok(candidates);
    }
    if name == "HEAD" {
        if let Some(sha) = ref_resolve(repo, "HEAD")? {
            candidates.push(sha);
        }
        return Ok(candidates);
    }
    if (4..=40).contains(&name.len()) && name.chars().all(|c| c.is_ascii_hexdigit()) {
        let name = name.to_lowercase();
        let prefix = &name[..2];
        let dir = repo.gitdir.join("objects").join(prefix);
        if dir.is_dir() {
            let rest = &name[2..];
            for entry in
                fs::read_dir(&dir).with_context(|| format!("failed to read {}", dir.display()))?
            {
                let entry = entry?;
                let file_name = entry
                    .file_name()
                    .into_string()
                    .map_err(|n| anyhow!("object file name is not valid UTF-8: {n:?}"))?;
                if file_name.starts_with(rest) && entry.file_type()?.is_file() {
                    candidates.push(format!("{prefix}{file_name}"));
                }
            }
        }
    }
    for namespace in ["refs/tags/", "refs/heads/", "refs/remotes/"] {
        if let Some(sha) = ref_resolve(repo, &format!("{namespace}{name}"))? {
            candidates.push(sha);
        }
    }
    Ok(candidates)
}

/// Resolve `name` to exactly one object of `target` kind, following
/// tag → object and commit → tree links when `follow` is set.
pub fn object_find(
    repo: &Repository,
    name: &str,
    target: Option<ObjectKind>,
    follow: bool,
) -> Result<String> {
    let candidates = object_resolve(repo, name)?;
    ensure!(!candidates.is_empty(), "no such reference: {name}");
    if candidates.len() > 1 {
        bail!(
            "ambiguous reference {name}: candidates are:\n - {}",
            candidates.join("\n - ")
        );
    }
    let mut sha = candidates.into_iter().next().unwrap();
    let Some(target) = target else {
        return Ok(sha);
    };
    loop {
        let object = Object::read(repo, &sha)?;
        let kind = object.kind;
        if kind == target {
            return Ok(sha);
        }
        ensure!(
            follow,
            "object {sha} is a {}, not a {}",
            kind.to_str(),
            target.to_str()
        );
        let next = match kind {
            ObjectKind::Tag => kvlm_field(&object.payload()?, b"object")?,
            ObjectKind::Commit if target == ObjectKind::Tree => {
                kvlm_field(&object.payload()?, b"tree")?
            }
            _ => bail!(
                "object {sha} is a {}, not a {}",
                kind.to_str(),
                target.to_str()
            ),
        };
        sha = next;
    }
}

fn kvlm_field(payload: &[u8], key: &[u8]) -> Result<String> {
    let kvlm = Kvlm::parse(payload)?;
    let value = kvlm
        .get(key)
        .with_context(|| format!("record has no {} header", String::from_utf8_lossy(key)))?;
    String::from_utf8(value.to_vec()).context("object id in header is not valid UTF-8")
}
