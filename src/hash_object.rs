use crate::kvlm::Kvlm;
use crate::object_read::{Object, ObjectKind};
use crate::repo::Repository;
use crate::tree::Tree;
use anyhow::{Context, Result};
use std::fs;
use std::io::sink;
use std::path::Path;

/// Hash `file` as an object of `kind`, storing it when a repository is
/// given. Returns the hex id.
///
/// The stored bytes are `"<kind> <size>\0<payload>"`, zlib-compressed,
/// at `objects/<first 2 hex chars>/<remaining 38>`; the id is the SHA-1
/// of the uncompressed form. Non-blob payloads are re-encoded through
/// their codec so what lands in the store is canonical.
pub fn git_hash_object(repo: Option<&Repository>, kind: &str, file: &Path) -> Result<String> {
    let kind = ObjectKind::from_str(kind)?;
    let data =
        fs::read(file).with_context(|| format!("error reading provided file path: {}", file.display()))?;
    let payload = match kind {
        ObjectKind::Blob => data,
        ObjectKind::Tree => Tree::parse(&data)?.serialize()?,
        ObjectKind::Commit | ObjectKind::Tag => Kvlm::parse(&data)?.serialize(),
    };
    let mut object = Object::from_bytes(kind, payload);
    match repo {
        Some(repo) => object.write_to_repo(repo),
        None => Ok(hex::encode(object.write(&mut sink())?)),
    }
}
