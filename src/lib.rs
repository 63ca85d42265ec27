//! # movieclip: tag-format movie editor
//!
//! Decodes "movie" files (an `FWS`/`CWS` header, a bit-packed stage rect and a stream
//! of tags) into a mutable tag graph, composes movie clips across documents and
//! re-emits byte-valid files.
//!
//! ## Layers
//!
//! - **Bits**: [`BitCursor`] / [`BitWriter`], MSB-first, byte reads re-align.
//! - **Values**: [`ValueCodec`] unsigned, two's-complement signed and 16.16 fixed point,
//!   always at an explicit width.
//! - **Records**: declarative schemas ([`schema`]) driving [`Record`] decode (one forward
//!   pass) and encode (reverse restriction pass, then forward emission).
//! - **Tags**: [`parser`] dispatches codes to constructors; DefineSprite recursively
//!   parses its nested stream into the [`TagArena`]. Unknown codes stay opaque.
//! - **Graph**: [`CharacterTable`] maps ids to top-level definitions, allocates
//!   `max + 1` and finds equivalent definitions by content hash.
//! - **Composition**: [`Document::locate`], [`Document::replace`],
//!   [`Document::replace_with_vanish`], [`Document::delete`], [`Document::vanish`].
//!
//! ## Container equivalence
//!
//! Two DefineSprites are **never** considered equivalent, even when byte-identical.
//! Deciding it would mean resolving and comparing every subtree they place. Replacing a
//! clip therefore always imports a fresh copy of every sprite it reaches; leaf
//! definitions (shapes, bitmaps, fonts, ...) are deduplicated.
//!
//! ## Example
//!
//! ```no_run
//! use movieclip::Document;
//!
//! # fn main() -> Result<(), movieclip::MovieError> {
//! let mut tank = Document::open("tank.swf")?;
//! let fish = Document::open("fish_red.swf")?;
//! let slot = tank.locate("fish1")?;
//! let red = fish.locate("red")?;
//! tank.replace(&slot, &fish, &red)?;
//! tank.save("out.swf")?;
//! # Ok(())
//! # }
//! ```

pub mod arena;
pub mod bits;
pub mod codec;
pub mod compose;
pub mod depth;
pub mod document;
pub mod dump;
pub mod error;
pub mod geometry;
pub mod image;
pub mod params;
pub mod parser;
pub mod schema;
pub mod snapshot;
pub mod table;
pub mod tag;
pub mod value;

pub use arena::{TagArena, TagId};
pub use bits::{BitCursor, BitWriter};
pub use codec::{EncodedRecord, Record};
pub use compose::MovieClip;
pub use depth::{check_depth, DepthChecker, DepthReport};
pub use document::{Document, Header, LoadOptions};
pub use error::MovieError;
pub use geometry::{pixel2twip, twip2pixel, Matrix, Rect};
pub use image::{ImageHeader, ImageReplacement};
pub use schema::RecordKind;
pub use snapshot::Snapshot;
pub use table::CharacterTable;
pub use tag::{ContentHash, PlaceObject2, Tag, TagKind};
pub use value::{Bits, ValueCodec};
