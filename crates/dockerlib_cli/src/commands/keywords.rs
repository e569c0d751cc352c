//! Keywords command - List the keyword surface.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use dockerlib_session::Keyword;

#[derive(Args)]
pub struct KeywordsArgs {
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct KeywordEntry {
    name: &'static str,
    description: &'static str,
}

pub async fn execute(args: KeywordsArgs) -> Result<()> {
    let entries: Vec<KeywordEntry> = Keyword::all()
        .iter()
        .map(|k| KeywordEntry {
            name: k.name(),
            description: k.description(),
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
    println!("📋 Available keywords:\n");
    for entry in &entries {
        println!("  {:width$}  {}", entry.name, entry.description, width = width);
    }

    Ok(())
}
