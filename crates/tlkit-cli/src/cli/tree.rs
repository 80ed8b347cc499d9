use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tlkit::DataCodec;

use super::write_output;

/// Commands shared by the formats decoded into a value tree.
#[derive(Parser)]
pub(crate) struct TreeFormat {
    #[clap(subcommand)]
    command: TreeCommand,
}

impl TreeFormat {
    pub(crate) fn run<C: DataCodec + Default>(&self) -> anyhow::Result<()> {
        match &self.command {
            TreeCommand::Decode(decode) => decode.run::<C>(),
            TreeCommand::Encode(encode) => encode.run::<C>(),
            TreeCommand::Check(check) => check.run::<C>(),
        }
    }
}

#[derive(Subcommand)]
enum TreeCommand {
    /// Converts a binary file to its JSON form.
    Decode(Decode),

    /// Converts a JSON file back to binary. Counts and lengths are recomputed
    /// from the data first.
    Encode(Encode),

    /// Checks that a binary file is reproduced exactly when packed again.
    Check(Check),
}

#[derive(Parser)]
struct Decode {
    /// The binary file to decode.
    input: PathBuf,

    /// Where to write the JSON. Defaults to standard output.
    #[clap(short = 'o', long)]
    output: Option<PathBuf>,

    /// If set, prints what would be done without actually writing files.
    #[clap(short = 'n', long, default_value = "false")]
    dry_run: bool,
}

impl Decode {
    fn run<C: DataCodec + Default>(&self) -> anyhow::Result<()> {
        let mut codec = C::default();
        codec.load_from_file(&self.input)?;
        let text = codec.to_text()?;
        match &self.output {
            Some(output) => write_output(output, text.as_bytes(), self.dry_run)?,
            None => println!("{text}"),
        }
        Ok(())
    }
}

#[derive(Parser)]
struct Encode {
    /// The JSON file to encode.
    input: PathBuf,

    /// Where to write the binary file.
    #[clap(short = 'o', long)]
    output: PathBuf,

    /// If set, prints what would be done without actually writing files.
    #[clap(short = 'n', long, default_value = "false")]
    dry_run: bool,
}

impl Encode {
    fn run<C: DataCodec + Default>(&self) -> anyhow::Result<()> {
        let text = std::fs::read_to_string(&self.input)
            .with_context(|| format!("Failed to read {}", self.input.display()))?;
        let mut codec = C::default();
        codec
            .load_text(&text)
            .with_context(|| format!("Failed to load {}", self.input.display()))?;
        let data = codec.pack()?;
        write_output(&self.output, &data, self.dry_run)
    }
}

#[derive(Parser)]
struct Check {
    /// The binary file to check.
    input: PathBuf,
}

impl Check {
    fn run<C: DataCodec + Default>(&self) -> anyhow::Result<()> {
        let original = std::fs::read(&self.input)
            .with_context(|| format!("Failed to read {}", self.input.display()))?;
        let mut codec = C::default();
        codec.load_binary(&original)?;
        let packed = codec.pack()?;
        if let Some(offset) = first_difference(&original, &packed) {
            anyhow::bail!(
                "{}: packed output differs from the input at offset {offset} ({} bytes in, {} bytes out)",
                self.input.display(),
                original.len(),
                packed.len()
            );
        }
        println!("{}: OK ({} bytes)", self.input.display(), original.len());
        Ok(())
    }
}

fn first_difference(a: &[u8], b: &[u8]) -> Option<usize> {
    a.iter()
        .zip(b)
        .position(|(x, y)| x != y)
        .or_else(|| (a.len() != b.len()).then_some(a.len().min(b.len())))
}
