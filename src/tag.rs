use crate::commit::{gitconfig_user, local_time_and_offset};
use crate::kvlm::Kvlm;
use crate::object_read::{Object, ObjectKind};
use crate::refs::{RefNode, object_find, ref_create, ref_list};
use crate::repo::Repository;
use anyhow::Result;

/// With a name, create a tag pointing at `object`; without one, list
/// existing tags.
pub fn git_tag(repo: &Repository, name: Option<&str>, object: &str, annotate: bool) -> Result<()> {
    match name {
        Some(name) => {
            if annotate {
                let tagger = gitconfig_user()?;
                let (time, tz) = local_time_and_offset();
                tag_create_object(repo, name, object, &format!("{tagger} {time} {tz}"))?;
            } else {
                tag_create_lightweight(repo, name, object)?;
            }
            Ok(())
        }
        None => {
            let refs = ref_list(repo)?;
            if let Some(RefNode::Nested(tags)) = refs.get("tags") {
                for name in tags.keys() {
                    println!("{name}");
                }
            }
            Ok(())
        }
    }
}

/// A lightweight tag is just a ref file naming the target object.
pub fn tag_create_lightweight(repo: &Repository, name: &str, reference: &str) -> Result<()> {
    let sha = object_find(repo, reference, None, true)?;
    ref_create(repo, &format!("tags/{name}"), &sha)
}

/// An annotated tag stores a tag object and points the ref at it.
pub fn tag_create_object(
    repo: &Repository,
    name: &str,
    reference: &str,
    tagger: &str,
) -> Result<String> {
    let sha = object_find(repo, reference, None, true)?;
    let mut kvlm = Kvlm::new();
    kvlm.push(b"object", sha.into_bytes());
    kvlm.push(b"type", b"commit".to_vec());
    kvlm.push(b"tag", name.as_bytes().to_vec());
    kvlm.push(b"tagger", tagger.as_bytes().to_vec());
    kvlm.body = format!("{name}\n").into_bytes();
    let tag_sha = Object::from_bytes(ObjectKind::Tag, kvlm.serialize()).write_to_repo(repo)?;
    ref_create(repo, &format!("tags/{name}"), &tag_sha)?;
    Ok(tag_sha)
}
