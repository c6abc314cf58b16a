use crate::add::add;
use crate::cat_file::git_cat_file;
use crate::checkout::git_checkout;
use crate::commit::git_commit;
use crate::hash_object::git_hash_object;
use crate::init::git_init;
use crate::log::git_log;
use crate::ls_tree::git_ls_tree;
use crate::repo::Repository;
use crate::rev_parse::git_rev_parse;
use crate::rm::git_rm;
use crate::show_ref::git_show_ref;
use crate::status::git_status;
use crate::tag::git_tag;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod add;
mod cat_file;
mod checkout;
mod commit;
mod hash_object;
mod index;
mod init;
mod kvlm;
mod log;
mod ls_tree;
mod object_read;
mod object_write;
mod refs;
mod repo;
mod rev_parse;
mod rm;
mod show_ref;
mod status;
mod tag;
mod tree;

#[derive(Parser, Debug)]
#[command(name = "grit", about = "a minimal git-compatible version control tool")]
pub struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create an empty repository
    Init {
        #[clap(default_value = ".")]
        path: PathBuf,
    },
    /// Stage files into the index
    Add {
        #[clap(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Remove files from the index and the worktree
    Rm {
        #[clap(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Record the index as a new commit on the current branch
    Commit {
        #[clap(short = 'm')]
        message: String,
    },
    /// Show staged, unstaged and untracked changes
    Status,
    /// Walk a commit's ancestry
    Log {
        #[clap(default_value = "HEAD")]
        commit: String,
    },
    /// Print an object's payload
    CatFile {
        kind: String,
        object: String,
    },
    /// Compute an object id, optionally storing the object
    HashObject {
        #[clap(short = 'w')]
        write: bool,
        #[clap(short = 't', default_value = "blob")]
        kind: String,
        file: PathBuf,
    },
    /// List a tree's entries
    LsTree {
        #[clap(long)]
        name_only: bool,
        tree: String,
    },
    /// List all references
    ShowRef,
    /// Create a tag, or list tags when no name is given
    Tag {
        #[clap(short = 'a')]
        annotate: bool,
        name: Option<String>,
        #[clap(default_value = "HEAD")]
        object: String,
    },
    /// Resolve a name to a full object id
    RevParse {
        #[clap(short = 't')]
        kind: Option<String>,
        name: String,
    },
    /// Materialize a commit's tree into an empty directory
    Checkout {
        commit: String,
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Command::Init { path } => {
            git_init(&path)?;
        }
        Command::Add { paths } => {
            let repo = Repository::find()?;
            add(&repo, &paths)?;
        }
        Command::Rm { paths } => {
            let repo = Repository::find()?;
            git_rm(&repo, &paths)?;
        }
        Command::Commit { message } => {
            let repo = Repository::find()?;
            let sha = git_commit(&repo, &message)?;
            println!("{sha}");
        }
        Command::Status => {
            let repo = Repository::find()?;
            git_status(&repo)?;
        }
        Command::Log { commit } => {
            let repo = Repository::find()?;
            git_log(&repo, &commit)?;
        }
        Command::CatFile { kind, object } => {
            let repo = Repository::find()?;
            git_cat_file(&repo, &kind, &object)?;
        }
        Command::HashObject { write, kind, file } => {
            let sha = if write {
                let repo = Repository::find()?;
                git_hash_object(Some(&repo), &kind, &file)?
            } else {
                git_hash_object(None, &kind, &file)?
            };
            println!("{sha}");
        }
        Command::LsTree { name_only, tree } => {
            let repo = Repository::find()?;
            git_ls_tree(&repo, name_only, &tree)?;
        }
        Command::ShowRef => {
            let repo = Repository::find()?;
            git_show_ref(&repo)?;
        }
        Command::Tag {
            annotate,
            name,
            object,
        } => {
            let repo = Repository::find()?;
            git_tag(&repo, name.as_deref(), &object, annotate)?;
        }
        Command::RevParse { kind, name } => {
            let repo = Repository::find()?;
            git_rev_parse(&repo, kind.as_deref(), &name)?;
        }
        Command::Checkout { commit, path } => {
            let repo = Repository::find()?;
            git_checkout(&repo, &commit, &path)?;
        }
    }
    Ok(())
}
