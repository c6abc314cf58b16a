use crate::repo::Repository;
use anyhow::{Context, Result, anyhow, bail, ensure};
use flate2::read::ZlibDecoder;
use std::ffi::CStr;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectKind {
    pub fn from_str(kind: &str) -> Result<Self> {
        match kind {
            "blob" => Ok(ObjectKind::Blob),
            "tree" => Ok(ObjectKind::Tree),
            "commit" => Ok(ObjectKind::Commit),
            "tag" => Ok(ObjectKind::Tag),
            other => Err(anyhow!("unknown object kind: {}", other)),
        }
    }

    pub fn to_str(self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
            ObjectKind::Tag => "tag",
        }
    }
}

pub struct Object<R> {
    pub(crate) reader: R,
    pub(crate) kind: ObjectKind,
    pub(crate) expected_size: u64,
}

impl Object<()> {
    /// Open the object `sha` and parse its framing header. The payload is
    /// left on the reader so callers can stream or collect it.
    pub fn read(repo: &Repository, sha: &str) -> Result<Object<impl BufRead + use<>>> {
        ensure!(
            sha.len() == 40 && sha.chars().all(|c| c.is_ascii_hexdigit()),
            "not a full object id: {sha:?}"
        );
        let path = repo.gitdir.join("objects").join(&sha[..2]).join(&sha[2..]);
        let file =
            File::open(&path).with_context(|| format!("object {sha} not found in the store"))?;
        let decoder = ZlibDecoder::new(file);
        let mut reader = BufReader::new(decoder);
        let mut buf = Vec::new();
        reader
            .read_until(0, &mut buf)
            .context("failed to read header")?;
        let header = CStr::from_bytes_with_nul(&buf).context("header is in invalid format")?;
        let header = header.to_str().context("header is not valid UTF-8")?;
        let Some((kind, size)) = header.split_once(' ') else {
            bail!("header is in invalid format");
        };
        let expected_size = size.parse::<u64>().context("object size isn't a number")?;
        let kind = ObjectKind::from_str(kind)?;
        Ok(Object {
            reader,
            kind,
            expected_size,
        })
    }

    /// Read and fully decode the object `sha`.
    pub fn read_payload(repo: &Repository, sha: &str) -> Result<(ObjectKind, Vec<u8>)> {
        let object = Object::read(repo, sha)?;
        let kind = object.kind;
        Ok((kind, object.payload()?))
    }
}

impl<R> Object<R>
where
    R: BufRead,
{
    /// Collect the payload, enforcing the length declared in the framing.
    pub fn payload(mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.expected_size as usize);
        let n = (&mut self.reader)
            .take(self.expected_size)
            .read_to_end(&mut buf)
            .context("failed to read object payload")? as u64;
        ensure!(
            n == self.expected_size,
            "object size mismatch, expected {}, got {}",
            self.expected_size,
            n
        );
        ensure!(
            self.reader.fill_buf()?.is_empty(),
            "object has data past its declared size"
        );
        Ok(buf)
    }
}
