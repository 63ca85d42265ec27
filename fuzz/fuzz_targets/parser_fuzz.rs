//! Loader fuzz target: feed arbitrary bytes to the movie parser.
//! Loading must not panic; it returns a document or a MovieError. Emitting a loaded
//! document must not panic either, though it fails on unresolved placements.
//! Build with: cargo fuzz run parser_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let options = movieclip::LoadOptions { require_version: None };
    if let Ok(doc) = movieclip::Document::parse_with(data, &options) {
        let _ = doc.to_bytes();
        let _ = movieclip::check_depth(&doc, 1);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run parser_fuzz");
}
