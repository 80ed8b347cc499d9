use std::path::Path;

use clap::{Parser, Subcommand};
use tlkit::{
    formats::{ani::Ani, cir::Cir},
    utils::fs::write_file_atomic,
};

mod tree;
mod xarc;

/// A command line tool for the asset files of The Longest Journey.
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// The category of command to run.
    #[clap(subcommand)]
    category: Category,
}

impl Cli {
    pub(crate) fn run(&self) -> anyhow::Result<()> {
        self.category.run()
    }
}

/// The category of command to run.
#[derive(Subcommand)]
enum Category {
    #[clap(name = "ani", about = "Commands for working with animations (.ani).")]
    Animation(tree::TreeFormat),
    #[clap(name = "cir", about = "Commands for working with rigged meshes (.cir).")]
    Mesh(tree::TreeFormat),
    #[clap(name = "xarc", about = "Commands for working with archives (.xarc).")]
    Archive(xarc::Archive),
}

impl Category {
    fn run(&self) -> anyhow::Result<()> {
        match self {
            Category::Animation(ani) => ani.run::<Ani>(),
            Category::Mesh(cir) => cir.run::<Cir>(),
            Category::Archive(xarc) => xarc.run(),
        }
    }
}

/// Writes `data` to `path`, or only reports the write when `dry_run` is set.
fn write_output(path: &Path, data: &[u8], dry_run: bool) -> anyhow::Result<()> {
    if dry_run {
        eprintln!(
            "DRY_RUN: Writing {len} bytes to {path}",
            len = data.len(),
            path = path.display()
        );
    } else {
        eprintln!(
            "Writing {len} bytes to {path}",
            len = data.len(),
            path = path.display()
        );
        write_file_atomic(path, data)?;
    }
    Ok(())
}
