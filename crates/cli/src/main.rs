use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;

#[derive(Debug, Parser)]
#[command(name = "ensgraph")]
#[command(about = "ENS graph operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compute the namehash of a dotted name.
    Namehash(cmd::codec::NameArgs),
    /// Compute the keccak256 hash of a single label.
    Labelhash(cmd::codec::LabelArgs),
    /// Decode a hex DNS wire-format name.
    DecodeName(cmd::codec::DecodeArgs),
    /// Encode a dotted name into hex DNS wire format.
    EncodeName(cmd::codec::NameArgs),
    /// Print deterministic codec vectors as JSON.
    Vectors,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Namehash(args) => cmd::codec::run_namehash(args)?,
        Command::Labelhash(args) => cmd::codec::run_labelhash(args)?,
        Command::DecodeName(args) => cmd::codec::run_decode_name(args)?,
        Command::EncodeName(args) => cmd::codec::run_encode_name(args)?,
        Command::Vectors => cmd::codec::run_vectors()?,
    }

    Ok(())
}
