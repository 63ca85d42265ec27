//! Report movie clips nested at or beyond a depth limit.
//!
//! Usage:
//!   movie_depth input.swf [LIMIT]
//!   movie_depth input.swf 3 --tree
//!
//! Prints one line per offending clip, labelled with the name of a placement that uses
//! it or its character id. Exits with status 1 when any clip reaches the limit.

use anyhow::{Context, Result};
use clap::Parser;
use movieclip::{check_depth, dump, Document};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "movie_depth", version, about = "Movie clip nesting depth audit")]
struct Args {
    /// Movie file (FWS or CWS)
    input: PathBuf,

    /// Depth at which a clip is reported
    #[arg(default_value = "3")]
    limit: usize,

    /// Also print the tag tree
    #[arg(long)]
    tree: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let doc = Document::open(&args.input).with_context(|| format!("loading {}", args.input.display()))?;
    if args.tree {
        println!("{}", dump::tag_tree(&doc));
    }
    let reports = check_depth(&doc, args.limit);
    for r in &reports {
        println!("{}", r);
    }
    if !reports.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}
