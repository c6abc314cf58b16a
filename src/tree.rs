use crate::object_read::ObjectKind;
use anyhow::{Context, Result, bail, ensure};

/// A tree entry's mode, kept as a tag rather than the raw octal string.
/// The six-digit form only exists at the codec boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeMode {
    Regular { perms: u32 },
    Symlink,
    Directory,
    Gitlink,
}

impl TreeMode {
    pub fn parse(raw: &[u8]) -> Result<TreeMode> {
        ensure!(
            raw.len() == 5 || raw.len() == 6,
            "tree entry mode must be 5 or 6 octal digits"
        );
        let text = std::str::from_utf8(raw).context("tree entry mode is not ASCII")?;
        let mode = u32::from_str_radix(text, 8).context("tree entry mode is not octal")?;
        match mode {
            0o040000 => Ok(TreeMode::Directory),
            0o120000 => Ok(TreeMode::Symlink),
            0o160000 => Ok(TreeMode::Gitlink),
            m if m & !0o777 == 0o100000 => Ok(TreeMode::Regular { perms: m & 0o777 }),
            other => bail!("unsupported tree entry mode {other:o}"),
        }
    }

    /// Six-digit octal form, the width the records are stored with.
    pub fn octal(self) -> String {
        match self {
            TreeMode::Regular { perms } => format!("10{perms:04o}"),
            TreeMode::Symlink => "120000".to_string(),
            TreeMode::Directory => "040000".to_string(),
            TreeMode::Gitlink => "160000".to_string(),
        }
    }

    /// The object kind a leaf with this mode points at.
    pub fn object_kind(self) -> ObjectKind {
        match self {
            TreeMode::Directory => ObjectKind::Tree,
            TreeMode::Gitlink => ObjectKind::Commit,
            _ => ObjectKind::Blob,
        }
    }
}

pub struct TreeLeaf {
    pub mode: TreeMode,
    pub path: String,
    pub sha: String,
}

impl TreeLeaf {
    // Non-files compare as if their name had a trailing slash, so that
    // "a" (a directory) sorts after "a.txt" but before "b".
    fn sort_key(&self) -> Vec<u8> {
        let mut key = self.path.clone().into_bytes();
        if !matches!(self.mode, TreeMode::Regular { .. }) {
            key.push(b'/');
        }
        key
    }
}

pub struct Tree {
    pub items: Vec<TreeLeaf>,
}

impl Tree {
    /// Decode the concatenated `<mode> <path>\0<20-byte id>` records.
    pub fn parse(raw: &[u8]) -> Result<Tree> {
        let mut items = Vec::new();
        let mut pos = 0;
        while pos < raw.len() {
            let spc = raw[pos..]
                .iter()
                .position(|&b| b == b' ')
                .map(|i| pos + i)
                .context("tree entry has no mode terminator")?;
            let mode = TreeMode::parse(&raw[pos..spc])?;
            let nul = raw[spc..]
                .iter()
                .position(|&b| b == 0)
                .map(|i| spc + i)
                .context("tree entry has no path terminator")?;
            let path = std::str::from_utf8(&raw[spc + 1..nul])
                .context("tree entry path is not valid UTF-8")?
                .to_string();
            ensure!(!path.is_empty(), "tree entry has an empty path");
            ensure!(
                raw.len() >= nul + 21,
                "tree entry is truncated before its object id"
            );
            let sha = hex::encode(&raw[nul + 1..nul + 21]);
            items.push(TreeLeaf { mode, path, sha });
            pos = nul + 21;
        }
        Ok(Tree { items })
    }

    /// Encode the records, applying the canonical order first.
    pub fn serialize(&mut self) -> Result<Vec<u8>> {
        self.items.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        let mut out = Vec::new();
        for leaf in &self.items {
            out.extend_from_slice(leaf.mode.octal().as_bytes());
            out.push(b' ');
            out.extend_from_slice(leaf.path.as_bytes());
            out.push(0);
            let sha = hex::decode(&leaf.sha)
                .with_context(|| format!("tree entry id is not hex: {}", leaf.sha))?;
            ensure!(sha.len() == 20, "tree entry id is not 20 bytes: {}", leaf.sha);
            out.extend_from_slice(&sha);
        }
        Ok(out)
    }
}
