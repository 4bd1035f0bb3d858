use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sbxbox::block::BlockVersion;
use sbxbox::container::{decode_file, encode_file, DecodeOptions, EncodeOptions};
use sbxbox::driver::DecodeMode;
use sbxbox::recovery::reconstruct::{reconstruct, ReconstructOptions, Selector};
use sbxbox::recovery::scanner::{scan, ScanOptions};
use sbxbox::recovery::RecoveryIndex;
use sbxbox::uid::Uid;

#[derive(Parser)]
#[command(name = "sbx", version = "1.0.0", about = "The .sbx carve-able container format CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed a file into a .sbx container
    Encode {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Block size version: 1 (512B), 2 (128B), or 3 (4096B)
        #[arg(short = 'b', long, default_value = "1")]
        version: u8,
        /// Fixed UID in hex (up to 12 digits). Random if omitted.
        #[arg(long)]
        uid: Option<String>,
        #[arg(short, long)]
        password: Option<String>,
        /// Skip writing block 0 (no filename/size/hash recorded)
        #[arg(long)]
        no_metadata: bool,
        #[arg(long)]
        overwrite: bool,
    },
    /// Extract the original file from a .sbx container
    Decode {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long)]
        password: Option<String>,
        /// Keep going past out-of-order blocks and decode errors
        #[arg(long)]
        r#continue: bool,
        /// Verify integrity without writing an output file
        #[arg(long)]
        test_only: bool,
        /// Alias for --test-only, print the recovered metadata and exit
        #[arg(long)]
        info_only: bool,
        #[arg(long)]
        overwrite: bool,
    },
    /// Probe raw media for SBx blocks and populate a recovery index
    Scan {
        #[arg(required = true, num_args = 1..)]
        sources: Vec<PathBuf>,
        #[arg(short, long)]
        index: PathBuf,
        #[arg(short = 'b', long, default_value = "1")]
        version: u8,
        #[arg(short, long)]
        password: Option<String>,
        /// Scan stride in bytes (defaults to the block size)
        #[arg(long)]
        step: Option<u64>,
    },
    /// Rebuild containers from a populated recovery index
    Recover {
        #[arg(short, long)]
        index: PathBuf,
        #[arg(short, long)]
        destination: PathBuf,
        /// UIDs to recover (hex). Omit together with --name to recover all.
        #[arg(long)]
        uid: Vec<String>,
        /// Original or container filenames to recover
        #[arg(long)]
        name: Vec<String>,
        /// Synthesise all-zero placeholder blocks for detected gaps
        #[arg(long)]
        fill: bool,
        #[arg(short, long)]
        password: Option<String>,
        #[arg(long)]
        overwrite: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Commands::Encode {
            input,
            output,
            version,
            uid,
            password,
            no_metadata,
            overwrite,
        } => {
            let version = parse_version(version)?;
            let uid = uid
                .map(|s| Uid::from_hex(&s).ok_or_else(|| format!("invalid UID '{s}'")))
                .transpose()?;

            let opts = EncodeOptions {
                version,
                uid,
                password,
                include_metadata: !no_metadata,
                overwrite,
            };
            let report = encode_file(&input, &output, opts)?;
            println!("Encoded: {}", output.display());
            println!("  {}", report.summary());
        }

        Commands::Decode {
            input,
            output,
            password,
            r#continue,
            test_only,
            info_only,
            overwrite,
        } => {
            let mode = if r#continue {
                DecodeMode::Continue
            } else {
                DecodeMode::Strict
            };
            let skip_output = test_only || info_only;
            let output = output.unwrap_or_else(|| input.with_extension(""));
            let opts = DecodeOptions {
                password,
                mode,
                overwrite,
                test_only: skip_output,
            };
            let report = decode_file(&input, &output, opts)?;
            if !skip_output {
                println!("Decoded: {}", output.display());
            }
            println!("  {}", report.summary());
        }

        Commands::Scan {
            sources,
            index,
            version,
            password,
            step,
        } => {
            let version = parse_version(version)?;
            let mut idx = if index.exists() {
                RecoveryIndex::open(&index)?
            } else {
                RecoveryIndex::create(&index)?
            };
            let mut opts = ScanOptions::new(version);
            opts.password = password;
            opts.step = step;

            let report = scan(&mut idx, &sources, &opts)?;
            idx.commit()?;
            println!("Scan complete: {}", index.display());
            println!("  {}", report.summary());
        }

        Commands::Recover {
            index,
            destination,
            uid,
            name,
            fill,
            password,
            overwrite,
        } => {
            let idx = RecoveryIndex::open(&index)?;

            let selector = if !uid.is_empty() {
                let uids = uid
                    .iter()
                    .map(|s| Uid::from_hex(s).ok_or_else(|| format!("invalid UID '{s}'")))
                    .collect::<Result<Vec<_>, _>>()?;
                Selector::Uids(uids)
            } else if !name.is_empty() {
                Selector::Names(name)
            } else {
                Selector::All
            };

            let opts = ReconstructOptions {
                destination,
                fill,
                overwrite,
                password,
            };
            let (outcomes, errors) = reconstruct(&idx, &selector, &opts)?;

            for outcome in &outcomes {
                println!("  {}", outcome.summary());
            }
            for (uid, err) in &errors {
                eprintln!("  {uid}: recovery failed: {err}");
            }
            println!(
                "Recovered {} container(s), {} failure(s)",
                outcomes.len(),
                errors.len()
            );
        }
    }

    Ok(())
}

fn parse_version(v: u8) -> Result<BlockVersion, Box<dyn std::error::Error>> {
    BlockVersion::from_u8(v).ok_or_else(|| format!("unsupported block version {v} (expected 1, 2, or 3)").into())
}
