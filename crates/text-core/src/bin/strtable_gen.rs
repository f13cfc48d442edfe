//! strtable-gen: emits a static string table from a list of spellings
//!
//! ```text
//! strtable-gen --name GENERIC_HEADERS --enum generic_headers.txt > generic_headers.rs
//! ```

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rvoip_text_core::codegen;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Rust,
    Json,
}

/// Generate a case-insensitive string table with precomputed lookup keys
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input file with one spelling per line (stdin when omitted)
    input: Option<PathBuf>,

    /// Name of the generated table
    #[arg(short, long, default_value = "TABLE")]
    name: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "rust")]
    format: Format,

    /// Also emit an enum of the ids (Rust output only)
    #[arg(long = "enum")]
    with_enum: bool,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Default log level, overridden by RUST_LOG
    #[arg(long, default_value = "warn")]
    log_level: tracing::Level,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::from_default_env().add_directive(args.log_level.into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let input = match &args.input {
        Some(path) => fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text).context("reading stdin")?;
            text
        }
    };

    let spellings = codegen::parse_spellings(&input)?;
    debug!("read {} spellings", spellings.len());

    let rendered = match args.format {
        Format::Rust => codegen::render_rust(&args.name, &spellings, args.with_enum)?,
        Format::Json => codegen::render_json(&args.name, &spellings)?,
    };

    match &args.output {
        Some(path) => {
            fs::write(path, rendered).with_context(|| format!("writing {}", path.display()))?;
            info!("wrote table {} ({} entries) to {}", args.name, spellings.len(), path.display());
        }
        None => io::stdout().write_all(rendered.as_bytes())?,
    }
    Ok(())
}
