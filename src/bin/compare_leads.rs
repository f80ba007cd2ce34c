// Debug tool: show how two lead files compare by LastModifiedDate
// A missing file is treated as an absent record

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use lead_migration::core::{LastModifiedComparator, Record, Side};

#[derive(Parser)]
#[command(name = "compare-leads")]
#[command(about = "Decide whether lead A should overwrite lead B")]
struct Args {
    /// Lead A (the candidate from the source organization)
    a: PathBuf,

    /// Lead B (the copy in the destination organization)
    b: PathBuf,

    /// Timestamp field to compare on
    #[arg(long, default_value = "LastModifiedDate")]
    field: String,
}

fn read_record(path: &Path) -> Result<Option<Record>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let record = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(record))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let comparator = LastModifiedComparator::with_field(args.field);

    let a = read_record(&args.a)?;
    let b = read_record(&args.b)?;

    println!("=== TIMESTAMPS ({}) ===", comparator.field());
    for (side, path, record) in [(Side::A, &args.a, &a), (Side::B, &args.b, &b)] {
        match record {
            None => println!("  {}: {} [ABSENT]", side, path.display()),
            Some(record) => match comparator.timestamp_of(record, side) {
                Ok(ts) => println!("  {}: {} -> {}", side, path.display(), ts),
                Err(err) => println!("  {}: {} -> {}", side, path.display(), err),
            },
        }
    }
    println!();

    println!("=== DECISION ===");
    match comparator.is_after(a.as_ref(), b.as_ref()) {
        Ok(true) => println!("  update (A is strictly newer)"),
        Ok(false) => println!("  skip (B is as new or newer)"),
        Err(err) => {
            println!("  error [{:?}]: {}", err.kind(), err);
            std::process::exit(2);
        }
    }

    Ok(())
}
