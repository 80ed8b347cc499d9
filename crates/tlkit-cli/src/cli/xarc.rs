use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tlkit::archive::Xarc;

use super::write_output;

/// Commands for working with archives.
#[derive(Parser)]
pub(crate) struct Archive {
    #[clap(subcommand)]
    command: ArchiveCommand,
}

impl Archive {
    pub(crate) fn run(&self) -> anyhow::Result<()> {
        match &self.command {
            ArchiveCommand::List(list) => list.run(),
            ArchiveCommand::Extract(extract) => extract.run(),
            ArchiveCommand::Unpack(unpack) => unpack.run(),
            ArchiveCommand::Pack(pack) => pack.run(),
            ArchiveCommand::Add(add) => add.run(),
        }
    }
}

#[derive(Subcommand)]
enum ArchiveCommand {
    /// Lists the entries of an archive with their sizes, in directory order.
    List(List),

    /// Extracts a single entry.
    Extract(Extract),

    /// Extracts every entry into a directory.
    Unpack(Unpack),

    /// Builds an archive from the files below a directory.
    Pack(Pack),

    /// Adds or replaces one entry and rewrites the archive.
    Add(Add),
}

fn open_archive(path: &Path) -> anyhow::Result<Xarc> {
    let mut archive = Xarc::new();
    archive
        .load_from_file(path)
        .with_context(|| format!("Failed to load archive {}", path.display()))?;
    Ok(archive)
}

#[derive(Parser)]
struct List {
    /// The archive to list.
    archive: PathBuf,
}

impl List {
    fn run(&self) -> anyhow::Result<()> {
        let archive = open_archive(&self.archive)?;
        for (name, data) in archive.entries() {
            println!("{:>10}  {name}", data.len());
        }
        Ok(())
    }
}

#[derive(Parser)]
struct Extract {
    /// The archive to read.
    archive: PathBuf,

    /// The name of the entry to extract.
    name: String,

    /// Where to write the entry. Defaults to its name in the current
    /// directory.
    #[clap(short = 'o', long)]
    output: Option<PathBuf>,

    /// If set, prints what would be done without actually writing files.
    #[clap(short = 'n', long, default_value = "false")]
    dry_run: bool,
}

impl Extract {
    fn run(&self) -> anyhow::Result<()> {
        let archive = open_archive(&self.archive)?;
        let data = archive.get_data(&self.name).with_context(|| {
            format!(
                "No entry named {:?} in {}",
                self.name,
                self.archive.display()
            )
        })?;
        let output = match &self.output {
            Some(output) => output.clone(),
            None => {
                let file_name = Path::new(&self.name)
                    .file_name()
                    .with_context(|| format!("Entry name {:?} has no file name", self.name))?;
                PathBuf::from(file_name)
            }
        };
        write_output(&output, data, self.dry_run)
    }
}

#[derive(Parser)]
struct Unpack {
    /// The archive to unpack.
    archive: PathBuf,

    /// The directory to write the entries to.
    output_dir: PathBuf,

    /// If set, prints what would be done without actually writing files.
    #[clap(short = 'n', long, default_value = "false")]
    dry_run: bool,
}

impl Unpack {
    fn run(&self) -> anyhow::Result<()> {
        let archive = open_archive(&self.archive)?;
        archive.check_extractable()?;
        if self.dry_run {
            for (name, data) in archive.entries() {
                eprintln!(
                    "DRY_RUN: Writing {len} bytes to {path}",
                    len = data.len(),
                    path = self.output_dir.join(&name).display()
                );
            }
            return Ok(());
        }
        archive.extract_to_dir(&self.output_dir)?;
        eprintln!(
            "Unpacked {} entries to {}",
            archive.len(),
            self.output_dir.display()
        );
        Ok(())
    }
}

#[derive(Parser)]
struct Pack {
    /// The directory holding the files to pack.
    input_dir: PathBuf,

    /// The archive to write.
    archive: PathBuf,

    /// If set, prints what would be done without actually writing files.
    #[clap(short = 'n', long, default_value = "false")]
    dry_run: bool,
}

impl Pack {
    fn run(&self) -> anyhow::Result<()> {
        let archive = Xarc::from_dir(&self.input_dir)?;
        log::info!(
            "Packing {} files from {}",
            archive.len(),
            self.input_dir.display()
        );
        write_output(&self.archive, &archive.pack()?, self.dry_run)
    }
}

#[derive(Parser)]
struct Add {
    /// The archive to update.
    archive: PathBuf,

    /// The file to add.
    file: PathBuf,

    /// The entry name to store the file under. Defaults to the file's name.
    #[clap(long)]
    name: Option<String>,

    /// If set, prints what would be done without actually writing files.
    #[clap(short = 'n', long, default_value = "false")]
    dry_run: bool,
}

impl Add {
    fn run(&self) -> anyhow::Result<()> {
        let mut archive = open_archive(&self.archive)?;
        let file_name = self.file.file_name().and_then(|name| name.to_str());
        let name = match (&self.name, file_name) {
            (Some(name), _) => name.clone(),
            (None, Some(file_name)) => file_name.to_string(),
            (None, None) => {
                anyhow::bail!("Cannot derive an entry name from {}", self.file.display())
            }
        };
        let data = std::fs::read(&self.file)
            .with_context(|| format!("Failed to read {}", self.file.display()))?;
        if archive.insert_data(&name, data)?.is_some() {
            eprintln!("Replacing entry {name:?}");
        } else {
            eprintln!("Adding entry {name:?}");
        }
        write_output(&self.archive, &archive.pack()?, self.dry_run)
    }
}
