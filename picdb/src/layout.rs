//! Fixed-size binary layout for the header and metadata rows.
//!
//! Integers are packed with the platform's native endianness — the
//! on-disk format is not portable across architectures, matching the
//! original C struct layout this format was distilled from. ASCII string
//! fields are fixed-size, NUL-padded byte buffers.

use crate::error::{Error, Result};

/// Literal database name stamped into every header at creation.
pub const DB_NAME: &str = "EPFL PictDB binary";

/// Maximum length of `db_name`, not counting the NUL terminator.
pub const MAX_DB_NAME: usize = 31;
/// Maximum length of `pict_id`, not counting the NUL terminator.
pub const MAX_PIC_ID: usize = 127;
/// Hard ceiling on `max_files`.
pub const MAX_MAX_FILES: u32 = 100_000;
/// Hard ceiling on the thumbnail bounding box (either dimension).
pub const MAX_THUMB: u16 = 128;
/// Hard ceiling on the small bounding box (either dimension).
pub const MAX_SMALL: u16 = 512;

/// Serialized size of [`Header`], in bytes.
pub const HEADER_BYTES: usize = 64;
/// Serialized size of [`Row`], in bytes.
pub const ROW_BYTES: usize = 204;

/// Absolute file offset of row `index` in the metadata table:
/// `HEADER_BYTES + index * ROW_BYTES`.
#[must_use]
pub const fn row_offset(index: usize) -> u64 {
    (HEADER_BYTES + index * ROW_BYTES) as u64
}

/// One of the three stored resolutions of a picture.
///
/// Numeric values match the original format's `RES_THUMB`/`RES_SMALL`/
/// `RES_ORIG` constants so files are index-compatible across
/// implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Variant {
    /// Smallest derived variant.
    Thumb = 0,
    /// Larger derived variant.
    Small = 1,
    /// The original, as inserted by the caller.
    Orig = 2,
}

impl Variant {
    /// Index of this variant into the `size`/`offset` row arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// All three variants, in storage order.
    pub const ALL: [Self; 3] = [Self::Thumb, Self::Small, Self::Orig];
}

impl std::str::FromStr for Variant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "thumb" | "thumbnail" => Ok(Self::Thumb),
            "small" => Ok(Self::Small),
            "orig" | "original" => Ok(Self::Orig),
            other => Err(Error::InvalidResolution(other.to_owned())),
        }
    }
}

/// Whether a metadata row is occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Validity {
    /// Free slot, available to a future insert.
    Empty = 0,
    /// Occupied by a live picture.
    NonEmpty = 1,
}

/// Bounding boxes for the two derived variants, `{thumb, small}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeConfig {
    /// Thumbnail bounding box.
    pub thumb: (u16, u16),
    /// Small bounding box.
    pub small: (u16, u16),
}

impl ResizeConfig {
    /// Default bounding boxes (64x64 thumb, 256x256 small), matching the
    /// original format's `DEFAULT_THUMB`/`DEFAULT_SMALL`.
    pub const DEFAULT: Self = Self {
        thumb: (64, 64),
        small: (256, 256),
    };

    /// Validates the bounds: `thumb <= 128`, `small <= 512`, `small >=
    /// thumb` on each axis.
    pub fn validate(self) -> Result<Self> {
        let (tx, ty) = self.thumb;
        let (sx, sy) = self.small;
        if tx == 0 || ty == 0 || sx == 0 || sy == 0 {
            return Err(Error::InvalidArgument(
                "resize dimensions must be non-zero".to_owned(),
            ));
        }
        if tx > MAX_THUMB || ty > MAX_THUMB {
            return Err(Error::InvalidArgument(format!(
                "thumb resolution {tx}x{ty} exceeds {MAX_THUMB}"
            )));
        }
        if sx > MAX_SMALL || sy > MAX_SMALL {
            return Err(Error::InvalidArgument(format!(
                "small resolution {sx}x{sy} exceeds {MAX_SMALL}"
            )));
        }
        if sx < tx || sy < ty {
            return Err(Error::InvalidArgument(
                "small resolution must be at least as large as thumb on each axis".to_owned(),
            ));
        }
        Ok(self)
    }

    /// Returns the bounding box for a derived variant. Panics if asked for
    /// [`Variant::Orig`], which has no fixed target box.
    #[must_use]
    pub const fn target(self, v: Variant) -> (u16, u16) {
        match v {
            Variant::Thumb => self.thumb,
            Variant::Small => self.small,
            Variant::Orig => (0, 0),
        }
    }
}

/// In-memory mirror of the on-disk header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Fixed database name, always [`DB_NAME`] for files created by this
    /// crate, but not re-validated against that constant on open (only
    /// its length is bounded).
    pub db_name: String,
    /// Incremented on every mutation (insert, delete).
    pub db_version: u32,
    /// Count of `NON_EMPTY` rows.
    pub num_files: u32,
    /// Row capacity, fixed at creation.
    pub max_files: u32,
    /// Bounding boxes for the two derived variants.
    pub res_resized: ResizeConfig,
}

impl Header {
    /// Builds a fresh header for `create`, validating `max_files` and the
    /// resize bounds.
    pub fn new(max_files: u32, res_resized: ResizeConfig) -> Result<Self> {
        if max_files == 0 || max_files > MAX_MAX_FILES {
            return Err(Error::InvalidArgument(format!(
                "max_files {max_files} out of range 1..={MAX_MAX_FILES}"
            )));
        }
        Ok(Self {
            db_name: DB_NAME.to_owned(),
            db_version: 0,
            num_files: 0,
            max_files,
            res_resized: res_resized.validate()?,
        })
    }

    /// Serializes the header into its fixed on-disk representation.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_BYTES] {
        let mut buf = [0u8; HEADER_BYTES];
        write_str(&mut buf[0..32], &self.db_name);
        buf[32..36].copy_from_slice(&self.db_version.to_ne_bytes());
        buf[36..40].copy_from_slice(&self.num_files.to_ne_bytes());
        buf[40..44].copy_from_slice(&self.max_files.to_ne_bytes());
        buf[44..46].copy_from_slice(&self.res_resized.thumb.0.to_ne_bytes());
        buf[46..48].copy_from_slice(&self.res_resized.thumb.1.to_ne_bytes());
        buf[48..50].copy_from_slice(&self.res_resized.small.0.to_ne_bytes());
        buf[50..52].copy_from_slice(&self.res_resized.small.1.to_ne_bytes());
        // bytes 52..56 (reserved u32) and 56..64 (reserved u64) stay zeroed.
        buf
    }

    /// Parses a header from its fixed on-disk representation.
    pub fn from_bytes(buf: &[u8; HEADER_BYTES]) -> Result<Self> {
        let db_name = read_str(&buf[0..32])?;
        let db_version = u32::from_ne_bytes(arr4(&buf[32..36]));
        let num_files = u32::from_ne_bytes(arr4(&buf[36..40]));
        let max_files = u32::from_ne_bytes(arr4(&buf[40..44]));
        let thumb = (
            u16::from_ne_bytes(arr2(&buf[44..46])),
            u16::from_ne_bytes(arr2(&buf[46..48])),
        );
        let small = (
            u16::from_ne_bytes(arr2(&buf[48..50])),
            u16::from_ne_bytes(arr2(&buf[50..52])),
        );
        Ok(Self {
            db_name,
            db_version,
            num_files,
            max_files,
            res_resized: ResizeConfig { thumb, small },
        })
    }
}

/// In-memory mirror of one on-disk metadata row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Caller-supplied identifier, unique among `NON_EMPTY` rows.
    pub pict_id: String,
    /// SHA-256 content digest of the original blob.
    pub sha: [u8; 32],
    /// Original pixel dimensions `(x, y)`.
    pub res_orig: (u16, u16),
    /// Byte sizes for `{thumb, small, orig}`; `0` until materialized.
    pub size: [u32; 3],
    /// Blob offsets for `{thumb, small, orig}`; `0` iff the matching size
    /// is `0`.
    pub offset: [u64; 3],
    /// Occupancy flag.
    pub is_valid: Validity,
}

impl Row {
    /// An empty row, as allocated by `create`.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            pict_id: String::new(),
            sha: [0u8; 32],
            res_orig: (0, 0),
            size: [0; 3],
            offset: [0; 3],
            is_valid: Validity::Empty,
        }
    }

    /// `true` if this row is occupied.
    #[must_use]
    pub const fn is_occupied(&self) -> bool {
        matches!(self.is_valid, Validity::NonEmpty)
    }

    /// Serializes the row into its fixed on-disk representation.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; ROW_BYTES] {
        let mut buf = [0u8; ROW_BYTES];
        write_str(&mut buf[0..128], &self.pict_id);
        buf[128..160].copy_from_slice(&self.sha);
        buf[160..162].copy_from_slice(&self.res_orig.0.to_ne_bytes());
        buf[162..164].copy_from_slice(&self.res_orig.1.to_ne_bytes());
        for (i, s) in self.size.iter().enumerate() {
            let at = 164 + i * 4;
            buf[at..at + 4].copy_from_slice(&s.to_ne_bytes());
        }
        for (i, o) in self.offset.iter().enumerate() {
            let at = 176 + i * 8;
            buf[at..at + 8].copy_from_slice(&o.to_ne_bytes());
        }
        let valid: u16 = match self.is_valid {
            Validity::Empty => 0,
            Validity::NonEmpty => 1,
        };
        buf[200..202].copy_from_slice(&valid.to_ne_bytes());
        // bytes 202..204 (reserved u16) stay zeroed.
        buf
    }

    /// Parses a row from its fixed on-disk representation.
    pub fn from_bytes(buf: &[u8; ROW_BYTES]) -> Result<Self> {
        let pict_id = read_str(&buf[0..128])?;
        let mut sha = [0u8; 32];
        sha.copy_from_slice(&buf[128..160]);
        let res_orig = (
            u16::from_ne_bytes(arr2(&buf[160..162])),
            u16::from_ne_bytes(arr2(&buf[162..164])),
        );
        let mut size = [0u32; 3];
        for (i, s) in size.iter_mut().enumerate() {
            let at = 164 + i * 4;
            *s = u32::from_ne_bytes(arr4(&buf[at..at + 4]));
        }
        let mut offset = [0u64; 3];
        for (i, o) in offset.iter_mut().enumerate() {
            let at = 176 + i * 8;
            *o = u64::from_ne_bytes(arr8(&buf[at..at + 8]));
        }
        let is_valid = match u16::from_ne_bytes(arr2(&buf[200..202])) {
            0 => Validity::Empty,
            _ => Validity::NonEmpty,
        };
        Ok(Self {
            pict_id,
            sha,
            res_orig,
            size,
            offset,
            is_valid,
        })
    }
}

/// Writes `s` into `dst` as ASCII bytes, NUL-padding the remainder.
/// Longer inputs are truncated to `dst.len() - 1` bytes, leaving room for
/// the terminator — mirroring `strncpy` + explicit NUL in the original.
fn write_str(dst: &mut [u8], s: &str) {
    let max = dst.len() - 1;
    let bytes = s.as_bytes();
    let n = bytes.len().min(max);
    dst[..n].copy_from_slice(&bytes[..n]);
    dst[n..].fill(0);
}

/// Reads a NUL-terminated ASCII string out of a fixed buffer.
fn read_str(src: &[u8]) -> Result<String> {
    let end = src.iter().position(|&b| b == 0).unwrap_or(src.len());
    String::from_utf8(src[..end].to_vec())
        .map_err(|e| Error::InvalidArgument(format!("non-UTF8 string field: {e}")))
}

fn arr2(s: &[u8]) -> [u8; 2] {
    [s[0], s[1]]
}

fn arr4(s: &[u8]) -> [u8; 4] {
    [s[0], s[1], s[2], s[3]]
}

fn arr8(s: &[u8]) -> [u8; 8] {
    let mut a = [0u8; 8];
    a.copy_from_slice(&s[..8]);
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let h = Header::new(10, ResizeConfig::DEFAULT).expect("valid header");
        let bytes = h.to_bytes();
        let back = Header::from_bytes(&bytes).expect("decodes");
        assert_eq!(h, back);
        assert_eq!(back.db_name, DB_NAME);
    }

    #[test]
    fn row_round_trips() {
        let mut row = Row::empty();
        row.pict_id = "pic1".to_owned();
        row.sha = [7u8; 32];
        row.res_orig = (640, 480);
        row.size = [10, 20, 30];
        row.offset = [100, 200, 300];
        row.is_valid = Validity::NonEmpty;

        let bytes = row.to_bytes();
        let back = Row::from_bytes(&bytes).expect("decodes");
        assert_eq!(row, back);
    }

    #[test]
    fn long_pict_id_is_truncated_not_panicking() {
        let mut row = Row::empty();
        row.pict_id = "x".repeat(500);
        let bytes = row.to_bytes();
        let back = Row::from_bytes(&bytes).expect("decodes");
        assert_eq!(back.pict_id.len(), MAX_PIC_ID);
    }

    #[test]
    fn resize_config_rejects_oversized_thumb() {
        let cfg = ResizeConfig {
            thumb: (200, 64),
            small: (256, 256),
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn resize_config_rejects_small_smaller_than_thumb() {
        let cfg = ResizeConfig {
            thumb: (100, 100),
            small: (50, 50),
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn variant_from_str_maps_aliases() {
        assert_eq!("thumbnail".parse::<Variant>().unwrap(), Variant::Thumb);
        assert_eq!("original".parse::<Variant>().unwrap(), Variant::Orig);
        assert!("huge".parse::<Variant>().is_err());
    }

    #[test]
    fn header_rejects_max_files_out_of_range() {
        assert!(Header::new(0, ResizeConfig::DEFAULT).is_err());
        assert!(Header::new(MAX_MAX_FILES + 1, ResizeConfig::DEFAULT).is_err());
    }
}
