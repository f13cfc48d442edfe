//! Ahead-of-time string table generation
//!
//! Computing discriminating indices is cheap, but doing it at build time
//! lets protocol crates keep their tables as plain `static` data. The
//! `strtable-gen` binary wraps these functions; they are public so build
//! scripts can call them directly.
//!
//! Input is one spelling per line. Blank lines and lines starting with `#`
//! are ignored; surrounding whitespace is trimmed.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::string_table::{check_unique, compute_keys};

/// Reads spellings from the line-oriented input format, rejecting
/// duplicates (ignoring case)
pub fn parse_spellings(input: &str) -> Result<Vec<String>> {
    let spellings: Vec<String> = input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();
    check_unique(&spellings)?;
    Ok(spellings)
}

fn check_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_') && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::Config(format!("'{}' is not a valid Rust identifier", name)))
    }
}

/// `SPEECH-LANGUAGE` / `speech_language` -> `SpeechLanguage`
fn camel_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split(|c: char| !c.is_ascii_alphanumeric()).filter(|w| !w.is_empty()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars.map(|c| c.to_ascii_lowercase()));
        }
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, 'N');
    }
    out
}

/// Renders a `static` [`StringTable`](crate::string_table::StringTable)
/// named `name`, optionally followed by a `#[repr(usize)]` enum of the ids
pub fn render_rust(name: &str, spellings: &[String], with_enum: bool) -> Result<String> {
    check_identifier(name)?;
    check_unique(spellings)?;
    let keys = compute_keys(spellings);

    let mut out = String::new();
    out.push_str("// Generated by strtable-gen. Do not edit.\n\n");
    out.push_str(&format!(
        "pub static {}: rvoip_text_core::string_table::StringTable =\n    rvoip_text_core::string_table::StringTable::from_static(&[\n",
        name
    ));
    for (spelling, key) in spellings.iter().zip(&keys) {
        out.push_str(&format!(
            "        rvoip_text_core::string_table::StringTableEntry::new({:?}, {}),\n",
            spelling, key
        ));
    }
    out.push_str("    ]);\n");

    if with_enum {
        let variants: Vec<String> = spellings.iter().map(|s| camel_case(s)).collect();
        if let Some(empty) = spellings.iter().zip(&variants).find(|(_, v)| v.is_empty()) {
            return Err(Error::Config(format!("'{}' has no characters usable in an identifier", empty.0)));
        }
        check_unique(&variants)?;

        out.push_str("\n#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]\n#[repr(usize)]\n");
        out.push_str(&format!("pub enum {} {{\n", camel_case(name)));
        for (id, (variant, spelling)) in variants.iter().zip(spellings).enumerate() {
            out.push_str(&format!("    /// `{}`\n    {} = {},\n", spelling, variant, id));
        }
        out.push_str("}\n");
    }
    Ok(out)
}

#[derive(Serialize)]
struct JsonTable<'a> {
    name: &'a str,
    entries: Vec<JsonEntry<'a>>,
}

#[derive(Serialize)]
struct JsonEntry<'a> {
    id: usize,
    spelling: &'a str,
    key: usize,
}

/// Renders the table as JSON, for tooling outside Rust
pub fn render_json(name: &str, spellings: &[String]) -> Result<String> {
    check_unique(spellings)?;
    let keys = compute_keys(spellings);
    let table = JsonTable {
        name,
        entries: spellings
            .iter()
            .zip(keys)
            .enumerate()
            .map(|(id, (spelling, key))| JsonEntry { id, spelling, key })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&table)?)
}
