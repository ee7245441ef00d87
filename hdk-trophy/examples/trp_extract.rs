//! Extract the trophy data of one title directory.
//!
//! Usage: `trp_extract <title_dir> <output_root> <trophy_key_hex> [--sorted] [--verify]`

use std::env;
use std::path::PathBuf;

use hdk_trophy::{
    ExtractOptionsBuilder, ExtractOutcome, SortedLister, TrophyCipher, TrophyExtractor,
};

const USAGE: &str = "Usage: trp_extract <title_dir> <output_root> <trophy_key_hex> [--sorted] [--verify]";

fn parse_key(hex: &str) -> Result<[u8; 16], Box<dyn std::error::Error>> {
    if hex.len() != 32 || !hex.is_ascii() {
        return Err("trophy key must be 32 hex digits".into());
    }

    let mut key = [0u8; 16];
    for (i, byte) in key.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)?;
    }
    Ok(key)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init()
            .map_err(std::io::Error::other)?;
    }

    let mut positional = Vec::new();
    let mut sorted = false;
    let mut verify = false;
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--sorted" => sorted = true,
            "--verify" => verify = true,
            _ => positional.push(arg),
        }
    }

    let [title_dir, output_root, key_hex] = positional.as_slice() else {
        return Err(USAGE.into());
    };

    let options = ExtractOptionsBuilder::default()
        .output_root(PathBuf::from(output_root))
        .verify_digest(verify)
        .build()?;
    let cipher = TrophyCipher::new(parse_key(key_hex)?);
    let title_dir = PathBuf::from(title_dir);

    let extractor = TrophyExtractor::new(options, cipher);
    let outcome = if sorted {
        extractor.with_lister(SortedLister).extract(&title_dir)?
    } else {
        extractor.extract(&title_dir)?
    };

    match outcome {
        ExtractOutcome::NothingToExtract => println!("{}: no trophy data", title_dir.display()),
        ExtractOutcome::Extracted(summary) => {
            for container in &summary.containers {
                println!(
                    "{} -> {} ({}, {} icons, {} documents, {} skipped)",
                    container.source.display(),
                    container.output_dir.display(),
                    container.np_comm_id,
                    container.icons.len(),
                    container.documents.len(),
                    container.skipped_encrypted,
                );
            }
            println!(
                "{}: {} icons, {} documents",
                summary.title,
                summary.icon_count(),
                summary.document_count()
            );
        }
    }

    Ok(())
}
