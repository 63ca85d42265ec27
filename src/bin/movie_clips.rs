//! Export every named movie clip of a movie into its own file.
//!
//! Each clip is composed into a copy of a template movie, replacing the template's
//! placeholder clip (default name `replace_movie_clip`) and taking over the clip's name.
//! Every written file is then audited for nesting depth.
//!
//! Usage:
//!   movie_clips input.swf out_dir --template blank.swf [--limit 3]

use anyhow::{Context, Result};
use clap::Parser;
use movieclip::{check_depth, Document};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "movie_clips", version, about = "Split a movie into one file per named clip")]
struct Args {
    /// Source movie
    input: PathBuf,

    /// Output directory, created if missing
    out_dir: PathBuf,

    /// Template movie holding the placeholder clip
    #[arg(long, short = 't')]
    template: PathBuf,

    /// Name of the placeholder clip in the template
    #[arg(long, default_value = "replace_movie_clip")]
    placeholder: String,

    /// Depth at which a clip is reported
    #[arg(long, short = 'l', default_value = "3")]
    limit: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let src = Document::open(&args.input).with_context(|| format!("loading {}", args.input.display()))?;
    let template = Document::open(&args.template).with_context(|| format!("loading {}", args.template.display()))?;
    std::fs::create_dir_all(&args.out_dir).with_context(|| format!("creating {}", args.out_dir.display()))?;

    for name in src.clip_names() {
        let clip = match src.locate(&name) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("skipping {}: {}", name, e);
                continue;
            }
        };
        let mut out = template.copy();
        let slot = out.locate(&args.placeholder).with_context(|| format!("placeholder {}", args.placeholder))?;
        let placed = out.replace(&slot, &src, &clip).with_context(|| format!("composing {}", name))?;
        placed.set_name(&mut out, &name)?;

        let path = args.out_dir.join(format!("{}.swf", name));
        log::info!("writing {}", path.display());
        out.save(&path).with_context(|| format!("writing {}", path.display()))?;
        for r in check_depth(&out, args.limit) {
            println!("{}", r);
        }
    }
    Ok(())
}
