//! A single-file image database engine.
//!
//! Each database is one file holding a fixed-size header, a fixed-size
//! metadata table, and an append-only blob region. Pictures are stored
//! keyed by a caller-supplied identifier, deduplicated by content hash,
//! and two smaller variants (`thumb`, `small`) are derived lazily from
//! the original on first read.
//!
//! # Quick start
//!
//! ```no_run
//! use picdb::{Database, CreateConfig, Variant};
//!
//! let mut db = Database::create("pictures.db", CreateConfig::default())?;
//! db.insert("cover", &std::fs::read("cover.jpg")?)?;
//! let thumb = db.read("cover", Variant::Thumb)?;
//! # Ok::<(), picdb::Error>(())
//! ```
//!
//! The on-disk layout is not portable across architectures: header and
//! row fields are packed in the platform's native endianness.

mod db;
mod dedup;
mod error;
mod file;
mod hash;
mod layout;
mod list;
mod table;
mod variant;

pub use db::{CreateConfig, Database};
pub use error::{Error, Result};
pub use file::OpenMode;
pub use hash::digest;
pub use layout::{
    DB_NAME, HEADER_BYTES, Header, MAX_DB_NAME, MAX_MAX_FILES, MAX_PIC_ID, MAX_SMALL, MAX_THUMB,
    ResizeConfig, ROW_BYTES, Row, Validity, Variant,
};
pub use list::{Listing, PictureEntry};
pub use variant::{DefaultImageProvider, ImageProvider};
