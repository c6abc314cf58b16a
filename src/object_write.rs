use crate::object_read::{Object, ObjectKind};
use crate::repo::Repository;
use anyhow::{Context, Result, anyhow};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use sha1::{Digest, Sha1};
use std::fs::{File, create_dir_all};
use std::io::{Cursor, Read, Write, copy};
use std::path::Path;
use tempfile::NamedTempFile;

impl Object<()> {
    pub(crate) fn from_blob_file(path: impl AsRef<Path>) -> Result<Object<impl Read>> {
        let reader =
            File::open(path).map_err(|e| anyhow!("error reading provided file path: {e}"))?;
        let metadata = reader.metadata().context("error getting metadata")?;
        let expected_size = metadata.len();
        Ok(Object {
            expected_size,
            kind: ObjectKind::Blob,
            reader,
        })
    }

    pub(crate) fn from_bytes(kind: ObjectKind, payload: Vec<u8>) -> Object<Cursor<Vec<u8>>> {
        Object {
            kind,
            expected_size: payload.len() as u64,
            reader: Cursor::new(payload),
        }
    }
}

impl<R> Object<R>
where
    R: Read,
{
    /// Compress the framed object into `writer`, returning the SHA-1 of
    /// the uncompressed framing.
    pub fn write(&mut self, writer: impl Write) -> Result<[u8; 20]> {
        let encoder = ZlibEncoder::new(writer, Compression::default());
        let mut hash_writer = HashWriter {
            writer: encoder,
            hasher: Sha1::new(),
        };
        write!(
            hash_writer,
            "{} {}\0",
            self.kind.to_str(),
            self.expected_size
        )?;
        copy(&mut self.reader, &mut hash_writer)?;
        let _compressed = hash_writer.writer.finish()?;
        let hash = hash_writer.hasher.finalize();
        Ok(hash.into())
    }

    /// Write the object into the store, returning its hex id. The path is
    /// the hash, so an already-present file means the bytes are already
    /// stored and the write is skipped.
    pub fn write_to_repo(&mut self, repo: &Repository) -> Result<String> {
        let mut tmp_file =
            NamedTempFile::new_in(&repo.gitdir).context("creating temporary object file")?;
        let hash = self.write(&mut tmp_file)?;
        let hash = hex::encode(hash);
        let dir = repo.gitdir.join("objects").join(&hash[..2]);
        create_dir_all(&dir).context("creating git object directory")?;
        let dest = dir.join(&hash[2..]);
        if !dest.exists() {
            tmp_file.persist(&dest).context("persisting object")?;
        }
        Ok(hash)
    }
}

struct HashWriter<W> {
    writer: W,
    hasher: Sha1,
}

impl<W> Write for HashWriter<W>
where
    W: Write,
{
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.writer.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}
