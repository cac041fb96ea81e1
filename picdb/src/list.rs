//! Listing formatters: a human-readable text dump and a structured
//! document suitable for `serde_json::to_string`.

use serde::Serialize;

use crate::db::Database;
use crate::layout::{Header, Row, Variant};

/// One row's worth of listing detail.
#[derive(Debug, Clone, Serialize)]
pub struct PictureEntry {
    /// The picture's identifier.
    pub pict_id: String,
    /// Hex-encoded SHA-256 digest of the original blob.
    pub sha: String,
    /// Original pixel dimensions `(width, height)`.
    pub resolution: (u16, u16),
    /// Byte sizes for `{thumb, small, orig}`, `0` if not yet materialized.
    pub size: [u32; 3],
}

/// The full listing: header summary plus every occupied row.
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    /// Database name as stamped at creation.
    pub db_name: String,
    /// Current mutation counter.
    pub db_version: u32,
    /// Count of occupied rows.
    pub num_files: u32,
    /// Row capacity.
    pub max_files: u32,
    /// The occupied rows, in index order.
    pub pictures: Vec<PictureEntry>,
}

impl Listing {
    /// Builds a listing snapshot from an open database.
    #[must_use]
    pub fn from_database(db: &Database) -> Self {
        Self::build(db.header(), db.rows())
    }

    fn build(header: &Header, rows: &[Row]) -> Self {
        let pictures = rows
            .iter()
            .filter(|r| r.is_occupied())
            .map(|r| PictureEntry {
                pict_id: r.pict_id.clone(),
                sha: hex::encode(r.sha),
                resolution: r.res_orig,
                size: r.size,
            })
            .collect();
        Self {
            db_name: header.db_name.clone(),
            db_version: header.db_version,
            num_files: header.num_files,
            max_files: header.max_files,
            pictures,
        }
    }

    /// Renders the listing the way a terminal reader expects: one line per
    /// picture, or the `<< empty database >>` sentinel if there are none.
    #[must_use]
    pub fn to_text(&self) -> String {
        if self.pictures.is_empty() {
            return "<< empty database >>".to_owned();
        }
        let mut out = format!(
            "{} ({}/{} files, version {})\n",
            self.db_name, self.num_files, self.max_files, self.db_version
        );
        for p in &self.pictures {
            let (w, h) = p.resolution;
            out.push_str(&format!(
                "{:<16} {}x{:<5} sha={} thumb={} small={} orig={}\n",
                p.pict_id,
                w,
                h,
                &p.sha[..16],
                variant_size(p, Variant::Thumb),
                variant_size(p, Variant::Small),
                variant_size(p, Variant::Orig),
            ));
        }
        out
    }

    /// Renders the listing as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error only if `serde_json` itself fails to serialize,
    /// which does not happen for this type's shape.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn variant_size(entry: &PictureEntry, v: Variant) -> String {
    let size = entry.size[v.index()];
    if size == 0 {
        "-".to_owned()
    } else {
        size.to_string()
    }
}
