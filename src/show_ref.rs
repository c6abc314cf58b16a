use crate::refs::{RefNode, ref_list};
use crate::repo::Repository;
use anyhow::Result;
use std::collections::BTreeMap;

/// Print every reference as `<id> refs/...`, sorted at each level.
pub fn git_show_ref(repo: &Repository) -> Result<()> {
    let refs = ref_list(repo)?;
    print_refs(&refs, "refs");
    Ok(())
}

fn print_refs(nodes: &BTreeMap<String, RefNode>, prefix: &str) {
    for (name, node) in nodes {
        match node {
            RefNode::Direct(Some(sha)) => println!("{sha} {prefix}/{name}"),
            // a dangling ref has nothing useful to print
            RefNode::Direct(None) => {}
            RefNode::Nested(children) => print_refs(children, &format!("{prefix}/{name}")),
        }
    }
}
