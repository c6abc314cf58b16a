use crate::repo::Repository;
use crate::tree::TreeMode;
use anyhow::{Context, Result, bail, ensure};
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

/// The staging index, version 2 of the `DIRC` ("dircache") format.
///
/// Layout: a 12-byte header (magic, version, entry count), then one
/// record per tracked file. Each record is a fixed 62-byte prefix of
/// big-endian stat fields, the object id and a flags word, followed by
/// the NUL-terminated path and zero padding up to a multiple of eight
/// bytes. The flags word packs the assume-valid bit, the two stage bits
/// and the low twelve bits of the name length; names of 0xFFF bytes or
/// more store 0xFFF and rely on the terminator to find their end.
pub struct Index {
    pub version: u32,
    pub entries: Vec<IndexEntry>,
}

pub struct IndexEntry {
    pub ctime_s: u32,
    pub ctime_ns: u32,
    pub mtime_s: u32,
    pub mtime_ns: u32,
    pub dev: u32,
    pub ino: u32,
    pub mode_type: u16,
    pub mode_perms: u16,
    pub uid: u32,
    pub gid: u32,
    pub fsize: u32,
    pub sha: String,
    pub flag_assume_valid: bool,
    pub flag_stage: u16,
    pub name: String,
}

pub const MODE_TYPE_REGULAR: u16 = 0b1000;
pub const MODE_TYPE_SYMLINK: u16 = 0b1010;
pub const MODE_TYPE_GITLINK: u16 = 0b1110;

impl IndexEntry {
    /// The mode this entry takes when folded into a tree object.
    pub fn tree_mode(&self) -> Result<TreeMode> {
        match self.mode_type {
            MODE_TYPE_REGULAR => Ok(TreeMode::Regular {
                perms: self.mode_perms as u32,
            }),
            MODE_TYPE_SYMLINK => Ok(TreeMode::Symlink),
            MODE_TYPE_GITLINK => Ok(TreeMode::Gitlink),
            other => bail!("index entry {} has bad mode type {other:b}", self.name),
        }
    }
}

impl Index {
    pub fn new() -> Index {
        Index {
            version: 2,
            entries: Vec::new(),
        }
    }

    /// Read the index, or an empty one when the file does not exist yet.
    pub fn read(repo: &Repository) -> Result<Index> {
        let path = repo.gitdir.join("index");
        if !path.exists() {
            return Ok(Index::new());
        }
        let raw = fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        ensure!(raw.len() >= 12, "index file is shorter than its header");
        ensure!(&raw[..4] == b"DIRC", "bad index signature");
        let version = read_u32(&raw, 4);
        ensure!(version == 2, "unsupported index version {version}");
        let count = read_u32(&raw, 8);

        let content = &raw[12..];
        let mut entries = Vec::with_capacity(count as usize);
        let mut idx = 0usize;
        for _ in 0..count {
            ensure!(content.len() >= idx + 62, "truncated index entry");
            let ctime_s = read_u32(content, idx);
            let ctime_ns = read_u32(content, idx + 4);
            let mtime_s = read_u32(content, idx + 8);
            let mtime_ns = read_u32(content, idx + 12);
            let dev = read_u32(content, idx + 16);
            let ino = read_u32(content, idx + 20);
            ensure!(
                read_u16(content, idx + 24) == 0,
                "reserved index entry bytes are not zero"
            );
            let mode = read_u16(content, idx + 26);
            let mode_type = mode >> 12;
            ensure!(
                [MODE_TYPE_REGULAR, MODE_TYPE_SYMLINK, MODE_TYPE_GITLINK].contains(&mode_type),
                "index entry has bad mode type {mode_type:b}"
            );
            let mode_perms = mode & 0o777;
            let uid = read_u32(content, idx + 28);
            let gid = read_u32(content, idx + 32);
            let fsize = read_u32(content, idx + 36);
            let sha = hex::encode(&content[idx + 40..idx + 60]);
            let flags = read_u16(content, idx + 60);
            let flag_assume_valid = flags & 0x8000 != 0;
            ensure!(flags & 0x4000 == 0, "extended index entries are not supported");
            let flag_stage = (flags >> 12) & 0b11;
            let name_length = (flags & 0xFFF) as usize;
            idx += 62;

            let raw_name = if name_length < 0xFFF {
                ensure!(
                    content.get(idx + name_length) == Some(&0),
                    "index entry name is not NUL-terminated"
                );
                let name = &content[idx..idx + name_length];
                idx += name_length + 1;
                name
            } else {
                // the length field is saturated, scan for the terminator
                ensure!(
                    content.len() >= idx + 0xFFF,
                    "truncated index entry name"
                );
                let nul = content[idx + 0xFFF..]
                    .iter()
                    .position(|&b| b == 0)
                    .map(|i| idx + 0xFFF + i)
                    .context("index entry name is not NUL-terminated")?;
                let name = &content[idx..nul];
                idx = nul + 1;
                name
            };
            let name = std::str::from_utf8(raw_name)
                .context("index entry name is not valid UTF-8")?
                .to_string();
            // records are padded to 8-byte multiples
            idx = idx.div_ceil(8) * 8;

            entries.push(IndexEntry {
                ctime_s,
                ctime_ns,
                mtime_s,
                mtime_ns,
                dev,
                ino,
                mode_type,
                mode_perms,
                uid,
                gid,
                fsize,
                sha,
                flag_assume_valid,
                flag_stage,
                name,
            });
        }
        Ok(Index { version, entries })
    }

    /// Serialize and atomically replace the index file.
    pub fn write(&self, repo: &Repository) -> Result<()> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"DIRC");
        buf.extend_from_slice(&self.version.to_be_bytes());
        buf.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        for entry in &self.entries {
            buf.extend_from_slice(&entry.ctime_s.to_be_bytes());
            buf.extend_from_slice(&entry.ctime_ns.to_be_bytes());
            buf.extend_from_slice(&entry.mtime_s.to_be_bytes());
            buf.extend_from_slice(&entry.mtime_ns.to_be_bytes());
            buf.extend_from_slice(&entry.dev.to_be_bytes());
            buf.extend_from_slice(&entry.ino.to_be_bytes());
            let mode = ((entry.mode_type as u32) << 12) | entry.mode_perms as u32;
            buf.extend_from_slice(&mode.to_be_bytes());
            buf.extend_from_slice(&entry.uid.to_be_bytes());
            buf.extend_from_slice(&entry.gid.to_be_bytes());
            buf.extend_from_slice(&entry.fsize.to_be_bytes());
            let sha = hex::decode(&entry.sha)
                .with_context(|| format!("index entry id is not hex: {}", entry.sha))?;
            ensure!(sha.len() == 20, "index entry id is not 20 bytes: {}", entry.sha);
            buf.extend_from_slice(&sha);
            let name_bytes = entry.name.as_bytes();
            let name_length = name_bytes.len().min(0xFFF) as u16;
            let flags = ((entry.flag_assume_valid as u16) << 15)
                | ((entry.flag_stage & 0b11) << 12)
                | name_length;
            buf.extend_from_slice(&flags.to_be_bytes());
            buf.extend_from_slice(name_bytes);
            buf.push(0);
            let written = 62 + name_bytes.len() + 1;
            buf.resize(buf.len() + (8 - written % 8) % 8, 0);
        }
        let mut tmp_file =
            NamedTempFile::new_in(&repo.gitdir).context("creating temporary index file")?;
        tmp_file
            .write_all(&buf)
            .context("writing temporary index file")?;
        tmp_file
            .persist(repo.gitdir.join("index"))
            .context("persisting index")?;
        Ok(())
    }
}

fn read_u32(raw: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]])
}

fn read_u16(raw: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([raw[at], raw[at + 1]])
}
